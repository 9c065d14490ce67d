//! Crossed price range and per-pass scratch state
//!
//! A matching pass works on copies of the crossing orders. Each copy carries
//! `nxt_trade`, the amount the pass plans to execute for that order; nothing
//! here writes back to the book.

use types::ids::OrderId;
use types::numeric::{Price, Quantity};

use crate::book::{OrderPart, PriceLevel};

/// Per-pass copy of a crossing order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScratchOrder {
    pub id: OrderId,
    pub time: i64,
    pub qty: Quantity,
    pub cum_qty: Quantity,
    pub nxt_trade: Quantity,
}

impl ScratchOrder {
    pub fn leaves_qty(&self) -> Quantity {
        if self.cum_qty >= self.qty {
            Quantity::ZERO
        } else {
            self.qty - self.cum_qty
        }
    }
}

impl From<&OrderPart> for ScratchOrder {
    fn from(part: &OrderPart) -> Self {
        Self {
            id: part.id.clone(),
            time: part.time,
            qty: part.qty,
            cum_qty: part.cum_qty,
            nxt_trade: Quantity::ZERO,
        }
    }
}

/// One price inside the crossed range, with both sides' orders at it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlappedLevel {
    pub price: Price,
    pub buy_orders: Vec<ScratchOrder>,
    pub sell_orders: Vec<ScratchOrder>,
    pub buy_total: Quantity,
    pub sell_total: Quantity,
    pub accumulated_buy: Quantity,
    pub accumulated_sell: Quantity,
    pub accumulated_execution: Quantity,
    /// `accumulated_buy - accumulated_sell`
    pub surplus: i64,
}

impl OverlappedLevel {
    pub fn new(price: Price, buy_orders: Vec<ScratchOrder>, sell_orders: Vec<ScratchOrder>) -> Self {
        Self {
            price,
            buy_orders,
            sell_orders,
            buy_total: Quantity::ZERO,
            sell_total: Quantity::ZERO,
            accumulated_buy: Quantity::ZERO,
            accumulated_sell: Quantity::ZERO,
            accumulated_execution: Quantity::ZERO,
            surplus: 0,
        }
    }
}

fn copy_orders(level: &PriceLevel) -> Vec<ScratchOrder> {
    level.orders.iter().map(ScratchOrder::from).collect()
}

/// Merge buy levels (best first, descending) with sell levels (best first,
/// ascending) into one list ordered from the highest price to the lowest
pub fn merge_levels(buys: &[&PriceLevel], sells: &[&PriceLevel]) -> Vec<OverlappedLevel> {
    let mut merged = Vec::with_capacity(buys.len() + sells.len());
    let mut i = 0;
    let mut j = sells.len();
    while i < buys.len() && j > 0 {
        let (b, s) = (buys[i], sells[j - 1]);
        match b.price.cmp(&s.price) {
            std::cmp::Ordering::Equal => {
                merged.push(OverlappedLevel::new(b.price, copy_orders(b), copy_orders(s)));
                i += 1;
                j -= 1;
            }
            std::cmp::Ordering::Greater => {
                merged.push(OverlappedLevel::new(b.price, copy_orders(b), Vec::new()));
                i += 1;
            }
            std::cmp::Ordering::Less => {
                merged.push(OverlappedLevel::new(s.price, Vec::new(), copy_orders(s)));
                j -= 1;
            }
        }
    }
    for b in &buys[i..] {
        merged.push(OverlappedLevel::new(b.price, copy_orders(b), Vec::new()));
    }
    for s in sells[..j].iter().rev() {
        merged.push(OverlappedLevel::new(s.price, Vec::new(), copy_orders(s)));
    }
    merged
}

/// Sum of planned executions
pub fn sum_nxt_trade(orders: &[ScratchOrder]) -> Quantity {
    orders
        .iter()
        .fold(Quantity::ZERO, |acc, o| acc.saturating_add(o.nxt_trade))
}

/// Reset every `nxt_trade` to the order's leaves and return the sum
pub fn reset_nxt_trade(orders: &mut [ScratchOrder]) -> Quantity {
    for o in orders.iter_mut() {
        o.nxt_trade = o.leaves_qty();
    }
    sum_nxt_trade(orders)
}

/// Fill in level totals, accumulated quantities and surplus
///
/// Sells accumulate from the lowest price upwards, buys from the highest
/// downwards. Accumulation saturates at `i64::MAX`.
pub fn prepare_match(levels: &mut [OverlappedLevel]) {
    let mut accum = Quantity::ZERO;
    for level in levels.iter_mut().rev() {
        level.sell_total = reset_nxt_trade(&mut level.sell_orders);
        accum = accum.saturating_add(level.sell_total);
        level.accumulated_sell = accum;
    }
    let mut accum = Quantity::ZERO;
    for level in levels.iter_mut() {
        level.buy_total = reset_nxt_trade(&mut level.buy_orders);
        accum = accum.saturating_add(level.buy_total);
        level.accumulated_buy = accum;
        level.accumulated_execution = level.accumulated_buy.min(level.accumulated_sell);
        level.surplus = level.accumulated_buy.raw() - level.accumulated_sell.raw();
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn order(id: &str, time: i64, qty: i64) -> ScratchOrder {
        ScratchOrder {
            id: OrderId::new(id),
            time,
            qty: Quantity::from_raw(qty),
            cum_qty: Quantity::ZERO,
            nxt_trade: Quantity::from_raw(qty),
        }
    }

    /// Level with (id, qty) orders all at time 0
    pub fn level(price: i64, buys: &[(&str, i64)], sells: &[(&str, i64)]) -> OverlappedLevel {
        OverlappedLevel::new(
            Price::from_raw(price),
            buys.iter().map(|(id, q)| order(id, 0, *q)).collect(),
            sells.iter().map(|(id, q)| order(id, 0, *q)).collect(),
        )
    }

    pub fn nxt(orders: &[ScratchOrder]) -> Vec<i64> {
        orders.iter().map(|o| o.nxt_trade.raw()).collect()
    }
}
