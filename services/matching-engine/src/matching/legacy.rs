//! Price-level sequential allocation
//!
//! Walks the crossed range from both ends towards the clearing level. At each
//! step the side with the smaller level total is filled completely; when the
//! larger side holds more than the execution still owed, that quantity is
//! reserved across its orders first. Every trade prints at the clearing price.

use types::numeric::{Price, Quantity};
use types::trade::{TickType, Trade};

use super::allocation::reserve_qty;
use super::overlap::{sum_nxt_trade, OverlappedLevel, ScratchOrder};
use crate::error::MatchError;

/// Buy orders of level `i` and sell orders of level `j`, borrowed together
fn sides_mut(
    levels: &mut [OverlappedLevel],
    i: usize,
    j: usize,
) -> (&mut Vec<ScratchOrder>, &mut Vec<ScratchOrder>) {
    use std::cmp::Ordering;
    match i.cmp(&j) {
        Ordering::Equal => {
            let level = &mut levels[i];
            (&mut level.buy_orders, &mut level.sell_orders)
        }
        Ordering::Less => {
            let (head, tail) = levels.split_at_mut(j);
            (&mut head[i].buy_orders, &mut tail[0].sell_orders)
        }
        Ordering::Greater => {
            let (head, tail) = levels.split_at_mut(i);
            (&mut tail[0].buy_orders, &mut head[j].sell_orders)
        }
    }
}

/// Trade the planned quantities of buys at level `i` against sells at `j`
fn fill_orders(levels: &mut [OverlappedLevel], i: usize, j: usize, price: Price, trades: &mut Vec<Trade>) {
    let (buys, sells) = sides_mut(levels, i, j);
    // ids are unique, so an unstable sort still gives one order on every node
    buys.sort_unstable_by(|a, b| a.id.cmp(&b.id));
    sells.sort_unstable_by(|a, b| a.id.cmp(&b.id));

    let (mut k, mut h) = (0, 0);
    while k < buys.len() && h < sells.len() {
        if buys[k].nxt_trade.is_zero() {
            k += 1;
            continue;
        }
        if sells[h].nxt_trade.is_zero() {
            h += 1;
            continue;
        }
        let qty = buys[k].nxt_trade.min(sells[h].nxt_trade);
        let (buy, sell) = (&mut buys[k], &mut sells[h]);
        buy.nxt_trade -= qty;
        sell.nxt_trade -= qty;
        buy.cum_qty += qty;
        sell.cum_qty += qty;
        trades.push(Trade {
            bid: buy.id.clone(),
            sid: sell.id.clone(),
            price,
            qty,
            buy_cum_qty: buy.cum_qty,
            sell_cum_qty: sell.cum_qty,
            tick_type: TickType::Unknown,
        });
        if buy.nxt_trade.is_zero() {
            k += 1;
        }
        if sell.nxt_trade.is_zero() {
            h += 1;
        }
    }

    let buy_total = sum_nxt_trade(buys);
    let sell_total = sum_nxt_trade(sells);
    levels[i].buy_total = buy_total;
    levels[j].sell_total = sell_total;
}

/// Run the sequential regime over prepared `levels`
pub fn match_levels(
    levels: &mut [OverlappedLevel],
    index: usize,
    price: Price,
    lot_size: Quantity,
) -> Result<Vec<Trade>, MatchError> {
    let mut trades = Vec::new();
    if levels.is_empty() || index >= levels.len() {
        return Ok(trades);
    }
    let lot = lot_size.raw();
    let mut total_exec = levels[index].accumulated_execution.raw();
    let (mut i, mut j) = (0usize, levels.len() - 1);

    // sells below the clearing level and buys above it cannot fill
    while i <= index && j >= index && total_exec > 0 {
        let buy_total = levels[i].buy_total.raw();
        let sell_total = levels[j].sell_total.raw();
        if buy_total > sell_total {
            if total_exec < buy_total {
                reserve_qty(total_exec, &mut levels[i].buy_orders, lot)?;
            }
            fill_orders(levels, i, j, price, &mut trades);
            total_exec -= sell_total;
            if j == 0 {
                break;
            }
            j -= 1;
        } else if buy_total < sell_total {
            if total_exec < sell_total {
                reserve_qty(total_exec, &mut levels[j].sell_orders, lot)?;
            }
            fill_orders(levels, i, j, price, &mut trades);
            total_exec -= buy_total;
            i += 1;
        } else {
            fill_orders(levels, i, j, price, &mut trades);
            total_exec -= buy_total;
            i += 1;
            if j == 0 {
                break;
            }
            j -= 1;
        }
    }
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::book::OrderBook;
    use crate::matching::clearing::get_trade_price;
    use crate::matching::overlap::prepare_match;
    use types::ids::OrderId;
    use types::order::Side;

    fn run(orders: &[(&str, Side, i64, i64, i64)]) -> (i64, Vec<(String, String, i64, i64, i64)>) {
        let mut book = OrderBook::with_capacity(4, 2);
        for (id, side, time, price, qty) in orders {
            book.insert_order(
                OrderId::new(*id),
                *side,
                *time,
                Price::from_raw(*price),
                Quantity::from_raw(*qty),
            )
            .unwrap();
        }
        let mut levels = book.overlapped_range();
        prepare_match(&mut levels);
        let (price, index) = get_trade_price(&levels, Price::from_raw(100), 500).unwrap();
        let trades = match_levels(&mut levels, index, price, Quantity::from_raw(1)).unwrap();
        let summary = trades
            .iter()
            .map(|t| {
                assert_eq!(t.price, price);
                assert_eq!(t.tick_type, TickType::Unknown);
                (
                    t.sid.to_string(),
                    t.bid.to_string(),
                    t.qty.raw(),
                    t.sell_cum_qty.raw(),
                    t.buy_cum_qty.raw(),
                )
            })
            .collect();
        (price.raw(), summary)
    }

    fn t(sid: &str, bid: &str, qty: i64, sell_cum: i64, buy_cum: i64) -> (String, String, i64, i64, i64) {
        (sid.to_string(), bid.to_string(), qty, sell_cum, buy_cum)
    }

    #[test]
    fn test_sequential_fill_with_reserve() {
        let (price, trades) = run(&[
            ("3", Side::SELL, 100, 98, 100),
            ("5", Side::SELL, 101, 98, 100),
            ("1", Side::BUY, 102, 100, 50),
            ("8", Side::BUY, 103, 98, 150),
            ("2", Side::BUY, 103, 100, 80),
            ("4", Side::BUY, 104, 100, 20),
            ("6", Side::BUY, 105, 100, 50),
            ("9", Side::SELL, 106, 98, 50),
            ("91", Side::BUY, 107, 100, 50),
            ("92", Side::SELL, 108, 97, 50),
        ]);
        assert_eq!(price, 98);
        assert_eq!(
            trades,
            vec![
                t("92", "1", 50, 50, 50),
                t("3", "2", 80, 80, 80),
                t("3", "4", 20, 100, 20),
                t("5", "6", 50, 50, 50),
                t("5", "91", 50, 100, 50),
                t("9", "8", 50, 50, 50),
            ]
        );
    }

    #[test]
    fn test_sequential_fill_both_ends() {
        let (price, trades) = run(&[
            ("3", Side::SELL, 100, 98, 100),
            ("5", Side::SELL, 101, 99, 100),
            ("1", Side::BUY, 102, 100, 100),
            ("8", Side::BUY, 103, 99, 100),
        ]);
        assert_eq!(price, 99);
        assert_eq!(trades, vec![t("3", "1", 100, 100, 100), t("5", "8", 100, 100, 100)]);
    }

    #[test]
    fn test_conservation_per_order() {
        let mut book = OrderBook::new();
        let orders = [
            ("3", Side::SELL, 96, 300),
            ("5", Side::SELL, 98, 100),
            ("1", Side::BUY, 100, 150),
            ("8", Side::SELL, 99, 200),
            ("31", Side::BUY, 100, 50),
            ("2", Side::BUY, 102, 250),
            ("4", Side::BUY, 101, 250),
            ("6", Side::BUY, 100, 350),
            ("9", Side::SELL, 100, 200),
            ("91", Side::BUY, 100, 300),
            ("92", Side::SELL, 100, 100),
            ("93", Side::BUY, 100, 300),
        ];
        for (id, side, price, qty) in orders {
            book.insert_order(OrderId::new(id), side, 100, Price::from_raw(price), Quantity::from_raw(qty))
                .unwrap();
        }
        let mut levels = book.overlapped_range();
        prepare_match(&mut levels);
        let (price, index) = get_trade_price(&levels, Price::from_raw(100), 500).unwrap();
        assert_eq!(price.raw(), 100);
        let exec = levels[index].accumulated_execution;
        let trades = match_levels(&mut levels, index, price, Quantity::from_raw(1)).unwrap();

        let bought: Quantity = trades.iter().map(|t| t.qty).sum();
        assert_eq!(bought, exec);
        for level in &levels {
            for o in level.buy_orders.iter().chain(&level.sell_orders) {
                assert!(o.cum_qty <= o.qty);
            }
        }
    }
}
