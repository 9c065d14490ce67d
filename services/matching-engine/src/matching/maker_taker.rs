//! Maker/taker allocation
//!
//! Orders that entered the book before the current height are makers and keep
//! their own limit price; orders entered at this height are takers and trade
//! at the makers' prices. Taker orders of one side are pooled into a single
//! level at the clearing price. Only one side may hold makers in a pass.

use std::cmp::Reverse;

use types::numeric::{Price, Quantity};
use types::order::Side;
use types::trade::{TickType, Trade};

use super::allocation::{self, calc_fill_qty};
use super::overlap::{OverlappedLevel, ScratchOrder};
use crate::error::MatchError;

/// Position of a scratch order inside the overlapped levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct OrderRef {
    level: usize,
    pos: usize,
}

/// A maker price level, or the pooled takers at the clearing price
#[derive(Debug, Clone)]
struct MergedLevel {
    price: Price,
    orders: Vec<OrderRef>,
    total: i64,
}

impl MergedLevel {
    fn new(price: Price) -> Self {
        Self {
            price,
            orders: Vec::new(),
            total: 0,
        }
    }

    fn extend(&mut self, levels: &[OverlappedLevel], side: Side, refs: Vec<OrderRef>) {
        for r in refs {
            self.total = self.total.saturating_add(scratch(levels, side, r).nxt_trade.raw());
            self.orders.push(r);
        }
    }
}

fn side_orders(level: &OverlappedLevel, side: Side) -> &[ScratchOrder] {
    match side {
        Side::BUY => &level.buy_orders,
        Side::SELL => &level.sell_orders,
    }
}

fn scratch(levels: &[OverlappedLevel], side: Side, r: OrderRef) -> &ScratchOrder {
    &side_orders(&levels[r.level], side)[r.pos]
}

fn scratch_mut(levels: &mut [OverlappedLevel], side: Side, r: OrderRef) -> &mut ScratchOrder {
    let level = &mut levels[r.level];
    match side {
        Side::BUY => &mut level.buy_orders[r.pos],
        Side::SELL => &mut level.sell_orders[r.pos],
    }
}

/// Trim the over-supplied side down to the clearing level's execution
///
/// The excess is taken from the level nearest the clearing index that still
/// has orders on that side.
pub fn drop_redundant_qty(levels: &mut [OverlappedLevel], index: usize, lot_size: Quantity) -> Result<(), MatchError> {
    let Some(level) = levels.get(index) else {
        return Ok(());
    };
    let q_buy = level.accumulated_buy.raw();
    let q_sell = level.accumulated_sell.raw();
    let exec = level.accumulated_execution.raw();
    if q_buy == q_sell {
        return Ok(());
    }

    if q_buy > exec {
        let to_drop = q_buy - exec;
        let found = (0..=index).rev().find(|&i| !levels[i].buy_total.is_zero());
        let i = found.ok_or(MatchError::NoOrdersToDrop { to_drop })?;
        allocation::drop_redundant_qty(&mut levels[i].buy_orders, to_drop, lot_size.raw())?;
    } else if q_sell > exec {
        let to_drop = q_sell - exec;
        let found = (index..levels.len()).find(|&i| !levels[i].sell_total.is_zero());
        let i = found.ok_or(MatchError::NoOrdersToDrop { to_drop })?;
        allocation::drop_redundant_qty(&mut levels[i].sell_orders, to_drop, lot_size.raw())?;
    }
    Ok(())
}

/// Maker levels of one side plus its pooled takers
///
/// Returns whether the side has makers. Without makers the result is the
/// taker pool alone.
fn merge_side_levels(
    side: Side,
    height: i64,
    price: Price,
    index: usize,
    levels: &[OverlappedLevel],
) -> (bool, Vec<MergedLevel>) {
    // buys cross from the top of the range down, sells from the bottom up
    let walk: Box<dyn Iterator<Item = usize>> = match side {
        Side::BUY => Box::new(0..=index),
        Side::SELL => Box::new((index..levels.len()).rev()),
    };

    let mut makers: Vec<MergedLevel> = Vec::new();
    let mut concluded = MergedLevel::new(price);
    let larger_first = |r: &OrderRef| Reverse(scratch(levels, side, *r).nxt_trade);

    for li in walk {
        let mut maker_refs = Vec::new();
        let mut taker_refs = Vec::new();
        for (pos, o) in side_orders(&levels[li], side).iter().enumerate() {
            if !o.nxt_trade.is_positive() {
                continue;
            }
            let r = OrderRef { level: li, pos };
            if o.time < height {
                maker_refs.push(r);
            } else {
                taker_refs.push(r);
            }
        }
        maker_refs.sort_by_key(larger_first);
        taker_refs.sort_by_key(larger_first);

        if !maker_refs.is_empty() {
            let mut level = MergedLevel::new(levels[li].price);
            level.extend(levels, side, maker_refs);
            makers.push(level);
        }
        concluded.extend(levels, side, taker_refs);
    }

    if makers.is_empty() {
        return (false, vec![concluded]);
    }
    if concluded.total != 0 {
        match makers.last_mut() {
            Some(last) if last.price == concluded.price => {
                last.total = last.total.saturating_add(concluded.total);
                last.orders.append(&mut concluded.orders);
            }
            _ => makers.push(concluded),
        }
    }
    (true, makers)
}

/// Fill the pooled takers against each maker level in turn
fn fill_orders(
    levels: &mut [OverlappedLevel],
    maker_side: Side,
    makers: &[MergedLevel],
    takers: &MergedLevel,
    tick_type: TickType,
    lot_size: i64,
) -> Vec<Trade> {
    let taker_side = maker_side.opposite();
    let proportion: Vec<i64> = takers
        .orders
        .iter()
        .map(|r| scratch(levels, taker_side, *r).nxt_trade.raw())
        .collect();
    let mut trades = Vec::new();

    for maker_level in makers {
        let taker_nxt: Vec<i64> = takers
            .orders
            .iter()
            .map(|r| scratch(levels, taker_side, *r).nxt_trade.raw())
            .collect();
        let mut to_fill = calc_fill_qty(maker_level.total, &taker_nxt, &proportion, takers.total, lot_size);

        let (mut m, mut t) = (0, 0);
        while m < maker_level.orders.len() && t < takers.orders.len() {
            let maker_ref = maker_level.orders[m];
            let maker_nxt = scratch(levels, maker_side, maker_ref).nxt_trade.raw();
            if maker_nxt == 0 {
                m += 1;
                continue;
            }
            if to_fill[t] == 0 {
                t += 1;
                continue;
            }
            let filled = maker_nxt.min(to_fill[t]);
            to_fill[t] -= filled;
            let qty = Quantity::from_raw(filled);

            let maker = scratch_mut(levels, maker_side, maker_ref);
            maker.nxt_trade -= qty;
            maker.cum_qty += qty;
            let (maker_id, maker_cum) = (maker.id.clone(), maker.cum_qty);

            let taker = scratch_mut(levels, taker_side, takers.orders[t]);
            taker.nxt_trade -= qty;
            taker.cum_qty += qty;
            let (taker_id, taker_cum) = (taker.id.clone(), taker.cum_qty);

            let trade = match maker_side {
                Side::BUY => Trade {
                    bid: maker_id,
                    sid: taker_id,
                    price: maker_level.price,
                    qty,
                    buy_cum_qty: maker_cum,
                    sell_cum_qty: taker_cum,
                    tick_type,
                },
                Side::SELL => Trade {
                    bid: taker_id,
                    sid: maker_id,
                    price: maker_level.price,
                    qty,
                    buy_cum_qty: taker_cum,
                    sell_cum_qty: maker_cum,
                    tick_type,
                },
            };
            trades.push(trade);
        }
    }
    trades
}

/// Run the maker/taker regime over prepared `levels`
///
/// `height` is the block being matched; orders with an entry height below it
/// are makers.
pub fn match_levels(
    levels: &mut [OverlappedLevel],
    index: usize,
    price: Price,
    height: i64,
    lot_size: Quantity,
) -> Result<Vec<Trade>, MatchError> {
    if levels.is_empty() || index >= levels.len() {
        return Ok(Vec::new());
    }
    drop_redundant_qty(levels, index, lot_size)?;

    let (buy_makers, mut buys) = merge_side_levels(Side::BUY, height, price, index, levels);
    let (sell_makers, mut sells) = merge_side_levels(Side::SELL, height, price, index, levels);

    let (maker_side, makers, takers, tick_type) = match (buy_makers, sell_makers) {
        (true, true) => return Err(MatchError::MakersOnBothSides),
        (true, false) => (Side::BUY, buys, sells.swap_remove(0), TickType::SellTaker),
        (false, true) => (Side::SELL, sells, buys.swap_remove(0), TickType::BuyTaker),
        (false, false) => (Side::SELL, sells, buys.swap_remove(0), TickType::Neutral),
    };
    Ok(fill_orders(levels, maker_side, &makers, &takers, tick_type, lot_size.raw()))
}
