//! Clearing price selection for a call auction
//!
//! Candidates are narrowed in three steps: maximum accumulated execution,
//! then least absolute surplus, then market pressure or proximity to the
//! reference (last trade) price. All arithmetic is on integer prices.

use types::numeric::Price;

use super::overlap::OverlappedLevel;

/// Denominator for the price-limit band in basis points
pub const BPS_DENOM: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pressure {
    Buy,
    Sell,
}

/// Indices of the levels with the largest accumulated execution
fn max_execution(levels: &[OverlappedLevel]) -> Vec<usize> {
    let mut best = 0i64;
    let mut index = Vec::new();
    for (i, level) in levels.iter().enumerate() {
        let exec = level.accumulated_execution.raw();
        if exec > best {
            best = exec;
            index.clear();
            index.push(i);
        } else if exec == best {
            index.push(i);
        }
    }
    index
}

/// Subset of `candidates` with the least absolute surplus
fn least_surplus(levels: &[OverlappedLevel], candidates: &[usize]) -> Vec<usize> {
    let mut best = u64::MAX;
    let mut index = Vec::new();
    for &i in candidates {
        let abs = levels[i].surplus.unsigned_abs();
        if abs < best {
            best = abs;
            index.clear();
            index.push(i);
        } else if abs == best {
            index.push(i);
        }
    }
    index
}

/// Candidate price closest to `ref_price`
///
/// Candidates are scanned from the highest price down. When the reference
/// sits strictly between two candidates the reference itself is used, paired
/// with the candidate just above it. Equal distances favour the higher price.
pub fn price_close_to_ref(levels: &[OverlappedLevel], candidates: &[usize], ref_price: Price) -> (Price, usize) {
    let mut j = candidates.first().copied().unwrap_or(0);
    let mut diff = i128::MAX;
    let mut ref_is_smaller = false;
    for &i in candidates {
        let mut d = i128::from(levels[i].price.raw()) - i128::from(ref_price.raw());
        if d == 0 {
            return (ref_price, i);
        }
        if d > 0 {
            ref_is_smaller = true;
        } else {
            if ref_is_smaller {
                return (ref_price, j);
            }
            d = -d;
        }
        if diff > d {
            diff = d;
            j = i;
        }
    }
    (levels[j].price, j)
}

fn clamp_i64(v: i128) -> i64 {
    i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX })
}

/// `[floor(ref * (1 - limit)), ceil(ref * (1 + limit))]`
pub fn price_band(ref_price: Price, price_limit_bps: i64) -> (Price, Price) {
    let r = i128::from(ref_price.raw());
    let denom = i128::from(BPS_DENOM);
    let lower = (r * (denom - i128::from(price_limit_bps))).div_euclid(denom);
    let upper_num = r * (denom + i128::from(price_limit_bps));
    let upper = upper_num.div_euclid(denom) + i128::from(upper_num.rem_euclid(denom) != 0);
    (Price::from_raw(clamp_i64(lower)), Price::from_raw(clamp_i64(upper)))
}

fn price_for_market_pressure(
    pressure: Pressure,
    levels: &[OverlappedLevel],
    candidates: &[usize],
    ref_price: Price,
    price_limit_bps: i64,
) -> (Price, usize) {
    let (lower, upper) = price_band(ref_price, price_limit_bps);
    // candidates run from highest to lowest price
    let i = candidates[0];
    let j = candidates[candidates.len() - 1];
    if lower > levels[i].price {
        return (levels[i].price, i);
    }
    if levels[j].price > upper {
        return (levels[j].price, j);
    }
    match pressure {
        Pressure::Buy if upper > levels[i].price => (levels[i].price, i),
        Pressure::Buy => price_close_to_ref(levels, candidates, upper),
        Pressure::Sell if lower < levels[j].price => (levels[j].price, j),
        Pressure::Sell => price_close_to_ref(levels, candidates, lower),
    }
}

/// Pick the clearing price and the index of its level
///
/// `levels` must already be prepared (accumulations and surplus filled in).
/// Returns `None` only when there are no levels.
pub fn get_trade_price(levels: &[OverlappedLevel], ref_price: Price, price_limit_bps: i64) -> Option<(Price, usize)> {
    let max_exec = max_execution(levels);
    match max_exec.as_slice() {
        [] => return None,
        [i] => return Some((levels[*i].price, *i)),
        _ => {}
    }

    let least = least_surplus(levels, &max_exec);
    if let [i] = least.as_slice() {
        return Some((levels[*i].price, *i));
    }
    if least.is_empty() {
        return None;
    }

    let buy_surplus = least.iter().any(|&i| levels[i].surplus > 0);
    let sell_surplus = least.iter().any(|&i| levels[i].surplus < 0);
    let result = match (buy_surplus, sell_surplus) {
        (true, false) => price_for_market_pressure(Pressure::Buy, levels, &least, ref_price, price_limit_bps),
        (false, true) => price_for_market_pressure(Pressure::Sell, levels, &least, ref_price, price_limit_bps),
        _ => price_close_to_ref(levels, &least, ref_price),
    };
    Some(result)
}
