//! Proportional, lot-rounded allocation of a residual quantity
//!
//! Orders sharing an entry height share priority. Within such a window the
//! residual is split in proportion to each order's planned quantity, floored
//! to whole lots, and the leftover handed out one lot at a time in order-id
//! order. Windows are served oldest first.

use types::numeric::Quantity;

use super::overlap::{sum_nxt_trade, ScratchOrder};
use crate::error::MatchError;

/// `total_lot * part / total`, computed without overflow
pub fn num_of_lot(total_lot: i64, part: i64, total: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    let wide = i128::from(total_lot) * i128::from(part) / i128::from(total);
    i64::try_from(wide).unwrap_or(i64::MAX)
}

/// Shrink the planned quantities of `orders` so that they sum to
/// `min(to_alloc, current sum)`, subtracting what was placed from `to_alloc`
///
/// Sorts `orders` by id when there is more than one.
pub fn allocate_residual(to_alloc: &mut i64, orders: &mut [ScratchOrder], lot_size: i64) -> Result<(), MatchError> {
    match orders.len() {
        0 => return Ok(()),
        1 => {
            let qty = (*to_alloc).min(orders[0].nxt_trade.raw());
            orders[0].nxt_trade = Quantity::from_raw(qty);
            *to_alloc -= qty;
            return Ok(());
        }
        _ => {}
    }

    let total = sum_nxt_trade(orders).raw();
    orders.sort_by(|a, b| a.id.cmp(&b.id));

    if total <= *to_alloc {
        *to_alloc -= total;
        return Ok(());
    }

    let lot = lot_size.max(1);
    let mut residual = *to_alloc;
    let n_lot = residual / lot;
    let caps: Vec<i64> = orders.iter().map(|o| o.nxt_trade.raw()).collect();
    let k = orders.len();

    let mut i = 0;
    while i < k {
        let a = lot.saturating_mul(num_of_lot(n_lot, caps[i], total));
        if a >= residual {
            orders[i].nxt_trade = Quantity::from_raw(residual);
            residual = 0;
            for o in &mut orders[i + 1..] {
                o.nxt_trade = Quantity::ZERO;
            }
            break;
        }
        orders[i].nxt_trade = Quantity::from_raw(a);
        residual -= a;
        i += 1;
    }

    // leftover lots, one at a time, wrapping around
    let mut j = i % k;
    let mut idle = 0;
    while residual > 0 && idle < k {
        let room = caps[j] - orders[j].nxt_trade.raw();
        let add = room.min(residual.min(lot));
        if add > 0 {
            orders[j].nxt_trade += Quantity::from_raw(add);
            residual -= add;
            idle = 0;
        } else {
            idle += 1;
        }
        j = (j + 1) % k;
    }

    *to_alloc = residual;
    if residual != 0 {
        return Err(MatchError::AllocationFailed { residual });
    }
    Ok(())
}

/// Allocate `residual` over consecutive same-height windows, oldest first
///
/// Orders reached after the residual is used up plan nothing.
fn allocate_by_windows(residual: &mut i64, orders: &mut [ScratchOrder], lot_size: i64) -> Result<(), MatchError> {
    let mut start = 0;
    while start < orders.len() {
        if *residual <= 0 {
            for o in &mut orders[start..] {
                o.nxt_trade = Quantity::ZERO;
            }
            break;
        }
        let time = orders[start].time;
        let width = orders[start..].iter().take_while(|o| o.time == time).count();
        allocate_residual(residual, &mut orders[start..start + width], lot_size)?;
        start += width;
    }
    Ok(())
}

/// Reserve exactly `residual` out of `orders`, which are in entry order
pub fn reserve_qty(residual: i64, orders: &mut [ScratchOrder], lot_size: i64) -> Result<(), MatchError> {
    if let [only] = orders {
        only.nxt_trade = Quantity::from_raw(residual);
        return Ok(());
    }
    let mut to_alloc = residual;
    allocate_by_windows(&mut to_alloc, orders, lot_size)
}

/// Cut `to_drop` from the planned quantities of `orders`, newest window last
pub fn drop_redundant_qty(orders: &mut [ScratchOrder], to_drop: i64, lot_size: i64) -> Result<(), MatchError> {
    if to_drop <= 0 {
        return Err(MatchError::InvalidDropQty { to_drop });
    }
    if orders.is_empty() {
        return Err(MatchError::NoOrdersToDrop { to_drop });
    }
    let total = sum_nxt_trade(orders).raw();
    if total < to_drop {
        return Err(MatchError::NotEnoughToDrop { to_drop, total });
    }
    let mut residual = total - to_drop;
    allocate_by_windows(&mut residual, orders, lot_size)
}

/// Split `maker_qty` across takers in proportion to their original shares
///
/// Each share is floored to whole lots and capped at what the taker still
/// plans (`taker_nxt`); the remainder is handed out lot by lot, round robin.
pub fn calc_fill_qty(
    maker_qty: i64,
    taker_nxt: &[i64],
    proportion: &[i64],
    total_taker_qty: i64,
    lot_size: i64,
) -> Vec<i64> {
    let lot = lot_size.max(1);
    let mut residual = maker_qty;
    let n_lot = residual / lot;
    let mut fill: Vec<i64> = taker_nxt
        .iter()
        .zip(proportion)
        .map(|(&nxt, &share)| {
            lot.saturating_mul(num_of_lot(n_lot, share, total_taker_qty))
                .min(nxt)
        })
        .collect();
    residual -= fill.iter().sum::<i64>();

    let n = fill.len();
    let mut i = 0;
    let mut idle = 0;
    while residual > 0 && n > 0 && idle < n {
        let add = (taker_nxt[i] - fill[i]).min(residual.min(lot));
        if add > 0 {
            fill[i] += add;
            residual -= add;
            idle = 0;
        } else {
            idle += 1;
        }
        i = (i + 1) % n;
    }
    fill
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::overlap::test_support::{nxt, order};
    use proptest::prelude::*;

    fn orders(shares: &[(&str, i64, i64)]) -> Vec<ScratchOrder> {
        shares.iter().map(|(id, time, q)| order(id, *time, *q)).collect()
    }

    fn allocate(shares: &[(&str, i64)], to_alloc: i64, lot: i64) -> Vec<i64> {
        let mut os: Vec<ScratchOrder> = shares.iter().map(|(id, q)| order(id, 0, *q)).collect();
        let mut residual = to_alloc;
        allocate_residual(&mut residual, &mut os, lot).unwrap();
        assert_eq!(residual, 0);
        nxt(&os)
    }

    #[test]
    fn test_allocate_residual_proportional() {
        let shares = [("1", 900), ("2", 300), ("3", 600)];
        assert_eq!(allocate(&shares, 600, 5), vec![300, 100, 200]);
        assert_eq!(allocate(&shares, 500, 5), vec![255, 80, 165]);
        assert_eq!(allocate(&shares, 25, 5), vec![15, 5, 5]);
        assert_eq!(allocate(&shares, 35, 5), vec![20, 5, 10]);
        assert_eq!(allocate(&[("1", 900), ("2", 900), ("3", 900)], 700, 5), vec![235, 235, 230]);
    }

    #[test]
    fn test_allocate_residual_odd_lot() {
        let shares = [("1", 300), ("2", 900), ("3", 600)];
        assert_eq!(allocate(&shares, 605, 10), vec![105, 300, 200]);
        assert_eq!(allocate(&shares, 5, 10), vec![5, 0, 0]);
        assert_eq!(allocate(&[("1", 25), ("2", 25), ("3", 25)], 15, 10), vec![10, 5, 0]);
    }

    #[test]
    fn test_allocate_residual_sorts_by_id() {
        let mut os = orders(&[("3", 0, 600), ("1", 0, 900), ("2", 0, 300)]);
        let mut residual = 600;
        allocate_residual(&mut residual, &mut os, 5).unwrap();
        let ids: Vec<&str> = os.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        assert_eq!(nxt(&os), vec![300, 100, 200]);
    }

    #[test]
    fn test_allocate_residual_enough_to_cover() {
        let mut os = orders(&[("1", 0, 10), ("2", 0, 20)]);
        let mut residual = 50;
        allocate_residual(&mut residual, &mut os, 5).unwrap();
        assert_eq!(residual, 20);
        assert_eq!(nxt(&os), vec![10, 20]);

        let mut single = orders(&[("1", 0, 10)]);
        let mut residual = 4;
        allocate_residual(&mut residual, &mut single, 5).unwrap();
        assert_eq!((residual, nxt(&single)), (0, vec![4]));
    }

    #[test]
    fn test_reserve_qty_windows() {
        let mut os = orders(&[("1", 100, 90), ("2", 100, 90), ("3", 101, 90)]);
        reserve_qty(70, &mut os, 5).unwrap();
        assert_eq!(nxt(&os), vec![35, 35, 0]);

        let mut os = orders(&[
            ("1", 100, 900),
            ("2", 100, 900),
            ("3", 101, 900),
            ("6", 101, 900),
            ("4", 102, 900),
            ("5", 102, 900),
            ("7", 102, 900),
        ]);
        reserve_qty(4300, &mut os, 5).unwrap();
        assert_eq!(nxt(&os), vec![900, 900, 900, 900, 235, 235, 230]);

        let mut single = orders(&[("1", 100, 90)]);
        reserve_qty(40, &mut single, 5).unwrap();
        assert_eq!(nxt(&single), vec![40]);
    }

    #[test]
    fn test_drop_redundant_qty() {
        let mut os = orders(&[("1", 100, 300), ("2", 100, 400)]);
        drop_redundant_qty(&mut os, 600, 5).unwrap();
        assert_eq!(nxt(&os), vec![45, 55]);

        let mut os = orders(&[
            ("1", 100, 200),
            ("2", 100, 300),
            ("3", 101, 400),
            ("4", 101, 500),
            ("5", 102, 600),
        ]);
        drop_redundant_qty(&mut os, 700, 5).unwrap();
        assert_eq!(nxt(&os), vec![200, 300, 360, 440, 0]);
    }

    #[test]
    fn test_drop_redundant_qty_errors() {
        let mut os = orders(&[("1", 100, 10)]);
        assert_eq!(
            drop_redundant_qty(&mut os, 0, 5),
            Err(MatchError::InvalidDropQty { to_drop: 0 })
        );
        assert_eq!(
            drop_redundant_qty(&mut [], 5, 5),
            Err(MatchError::NoOrdersToDrop { to_drop: 5 })
        );
        let err = drop_redundant_qty(&mut os, 20, 5).unwrap_err();
        assert_eq!(err, MatchError::NotEnoughToDrop { to_drop: 20, total: 10 });
        assert_eq!(err.to_string(), "Not enough quantity to drop: to_drop=20, total=10");
    }

    #[test]
    fn test_calc_fill_qty() {
        assert_eq!(calc_fill_qty(15, &[1, 10, 6], &[1, 10, 6], 17, 5), vec![1, 9, 5]);
        assert_eq!(calc_fill_qty(35, &[10, 5, 50], &[10, 5, 50], 65, 5), vec![10, 0, 25]);
        assert_eq!(calc_fill_qty(600, &[900, 300, 600], &[900, 300, 600], 1800, 5), vec![300, 100, 200]);
        assert_eq!(calc_fill_qty(500, &[900, 300, 600], &[900, 300, 600], 1800, 5), vec![255, 80, 165]);
    }

    #[test]
    fn test_calc_fill_qty_capped_by_remaining() {
        // second taker already mostly filled by an earlier maker level
        let fill = calc_fill_qty(40, &[30, 5], &[30, 30], 60, 5);
        assert_eq!(fill, vec![30, 5]);
        // more maker quantity than takers want: stops instead of looping
        let fill = calc_fill_qty(100, &[10, 10], &[10, 10], 20, 5);
        assert_eq!(fill, vec![10, 10]);
    }

    proptest! {
        #[test]
        fn prop_allocation_is_exact(
            leaves in proptest::collection::vec(1i64..200, 2..8),
            lot in 1i64..20,
            frac in 0.0f64..1.0,
        ) {
            let lots: Vec<i64> = leaves.iter().map(|l| l * lot).collect();
            let total: i64 = lots.iter().sum();
            let to_alloc = ((total as f64 * frac) as i64 / lot) * lot;
            let mut os: Vec<ScratchOrder> = lots
                .iter()
                .enumerate()
                .map(|(i, q)| order(&format!("{:03}", i), 0, *q))
                .collect();
            let caps: Vec<i64> = os.iter().map(|o| o.nxt_trade.raw()).collect();
            let mut residual = to_alloc;
            allocate_residual(&mut residual, &mut os, lot).unwrap();

            prop_assert_eq!(residual, 0);
            prop_assert_eq!(nxt(&os).iter().sum::<i64>(), to_alloc);
            for (o, cap) in os.iter().zip(&caps) {
                prop_assert!(o.nxt_trade.raw() <= *cap);
                prop_assert_eq!(o.nxt_trade.raw() % lot, 0);
            }
        }
    }
}
