//! Matching engine core
//!
//! Owns one symbol's order book and runs the per-block auction over it.

use serde::{Deserialize, Serialize};
use types::ids::OrderId;
use types::numeric::{Price, Quantity};
use types::order::Side;
use types::trade::Trade;

use crate::book::{BookDepth, OrderBook};
use crate::error::MatchError;
use crate::matching::overlap::{prepare_match, OverlappedLevel};
use crate::matching::{get_trade_price, legacy, maker_taker};

/// Default price-limit band, 5%
pub const DEFAULT_PRICE_LIMIT_BPS: i64 = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub lot_size: Quantity,
    /// Band around the reference price, in basis points
    pub price_limit_bps: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lot_size: Quantity::from_raw(1),
            price_limit_bps: DEFAULT_PRICE_LIMIT_BPS,
        }
    }
}

/// Fill allocation strategy, fixed per block by its height
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AllocationRegime {
    /// Price-level sequential fills at the clearing price
    Sequential,
    /// Makers trade at their own price, takers are pooled
    MakerTaker,
}

impl AllocationRegime {
    /// Regime active at `height`; `upgrade_height <= 0` means never upgraded
    pub fn for_height(height: i64, upgrade_height: i64) -> Self {
        if upgrade_height > 0 && height >= upgrade_height {
            AllocationRegime::MakerTaker
        } else {
            AllocationRegime::Sequential
        }
    }
}

/// Per-symbol matching engine
#[derive(Debug, Clone)]
pub struct MatchEngine {
    book: OrderBook,
    config: EngineConfig,
    last_trade_price: Price,
    last_match_height: i64,
    trades: Vec<Trade>,
    /// Crossed range of the last successful pass, kept for `drop_filled_orders`
    overlapped: Vec<OverlappedLevel>,
    /// What the last successful pass overwrote
    undo: Option<Undo>,
}

#[derive(Debug, Clone)]
struct Undo {
    last_trade_price: Price,
    last_match_height: i64,
    fills: Vec<PriorFill>,
}

/// Cumulative fill an order had before the pass
type PriorFill = (Side, Price, OrderId, Quantity);

impl MatchEngine {
    pub fn new(config: EngineConfig, last_trade_price: Price) -> Self {
        Self::with_book(config, last_trade_price, OrderBook::new())
    }

    pub fn with_book(config: EngineConfig, last_trade_price: Price, book: OrderBook) -> Self {
        Self {
            book,
            config,
            last_trade_price,
            last_match_height: 0,
            trades: Vec::new(),
            overlapped: Vec::new(),
            undo: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn book(&self) -> &OrderBook {
        &self.book
    }

    pub fn book_mut(&mut self) -> &mut OrderBook {
        &mut self.book
    }

    pub fn last_trade_price(&self) -> Price {
        self.last_trade_price
    }

    pub fn set_last_trade_price(&mut self, price: Price) {
        self.last_trade_price = price;
    }

    pub fn last_match_height(&self) -> i64 {
        self.last_match_height
    }

    /// Trades of the last successful pass
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn depth(&self, max_levels: usize) -> BookDepth {
        self.book.show_depth(max_levels)
    }

    /// Run one auction pass at `height`
    ///
    /// On success the fills are written to the book, the trades are kept and
    /// the reference price moves to the clearing price. On error neither the
    /// book nor the reference price changes. An uncrossed book yields no
    /// trades.
    pub fn match_orders(&mut self, height: i64, regime: AllocationRegime) -> Result<&[Trade], MatchError> {
        self.trades.clear();
        self.overlapped.clear();
        self.undo = None;
        let undo_price = self.last_trade_price;
        let undo_height = self.last_match_height;

        let mut levels = self.book.overlapped_range();
        if levels.is_empty() {
            self.undo = Some(Undo {
                last_trade_price: undo_price,
                last_match_height: undo_height,
                fills: Vec::new(),
            });
            self.last_match_height = height;
            return Ok(&self.trades);
        }
        prepare_match(&mut levels);
        let (price, index) = get_trade_price(&levels, self.last_trade_price, self.config.price_limit_bps)
            .ok_or(MatchError::NoClearingLevel { levels: levels.len() })?;

        let trades = match regime {
            AllocationRegime::Sequential => legacy::match_levels(&mut levels, index, price, self.config.lot_size)?,
            AllocationRegime::MakerTaker => {
                maker_taker::match_levels(&mut levels, index, price, height, self.config.lot_size)?
            }
        };

        let fills = self.commit_fills(&levels)?;
        self.undo = Some(Undo {
            last_trade_price: undo_price,
            last_match_height: undo_height,
            fills,
        });
        if !trades.is_empty() {
            self.last_trade_price = price;
        }
        self.last_match_height = height;
        self.trades = trades;
        self.overlapped = levels;
        Ok(&self.trades)
    }

    /// Write cumulative fills from the pass back to the book
    ///
    /// Every target is resolved before any write. Returns the overwritten
    /// values.
    fn commit_fills(&mut self, levels: &[OverlappedLevel]) -> Result<Vec<PriorFill>, MatchError> {
        let mut updates = Vec::new();
        for level in levels {
            for (side, orders) in [(Side::BUY, &level.buy_orders), (Side::SELL, &level.sell_orders)] {
                for o in orders {
                    let part = self.book.get_order(&o.id, side, level.price)?;
                    if part.cum_qty != o.cum_qty {
                        if o.cum_qty > part.qty {
                            return Err(MatchError::Overflow(format!(
                                "order {} filled {} of {}",
                                o.id, o.cum_qty, part.qty
                            )));
                        }
                        updates.push((side, level.price, &o.id, o.cum_qty, part.cum_qty));
                    }
                }
            }
        }
        let mut prior = Vec::with_capacity(updates.len());
        for (side, price, id, cum_qty, before) in updates {
            self.book.get_order_mut(id, side, price)?.cum_qty = cum_qty;
            prior.push((side, price, id.clone(), before));
        }
        Ok(prior)
    }

    /// Undo the last successful pass
    ///
    /// Restores the fills, reference price and match height the pass
    /// overwrote and forgets its trades. Must run before
    /// `drop_filled_orders`; a second call is a no-op.
    pub fn revert_last_match(&mut self) -> Result<(), MatchError> {
        let Some(undo) = self.undo.take() else {
            return Ok(());
        };
        for (side, price, id, cum_qty) in undo.fills {
            self.book.get_order_mut(&id, side, price)?.cum_qty = cum_qty;
        }
        self.last_trade_price = undo.last_trade_price;
        self.last_match_height = undo.last_match_height;
        self.trades.clear();
        self.overlapped.clear();
        Ok(())
    }

    /// Remove orders the last pass filled completely
    ///
    /// Levels left empty go with them. Returns the removed ids, buys first.
    pub fn drop_filled_orders(&mut self) -> Vec<OrderId> {
        self.undo = None;
        let mut dropped = Vec::new();
        for level in std::mem::take(&mut self.overlapped) {
            for (side, orders) in [(Side::BUY, level.buy_orders), (Side::SELL, level.sell_orders)] {
                for o in orders {
                    if o.leaves_qty().is_zero() && self.book.remove_order(&o.id, side, level.price).is_ok() {
                        dropped.push(o.id);
                    }
                }
            }
        }
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn engine(orders: &[(&str, Side, i64, i64, i64)], lot: i64, ref_price: i64) -> MatchEngine {
        let config = EngineConfig {
            lot_size: Quantity::from_raw(lot),
            price_limit_bps: 500,
        };
        let mut engine = MatchEngine::new(config, Price::from_raw(ref_price));
        for (id, side, time, price, qty) in orders {
            engine
                .book_mut()
                .insert_order(
                    OrderId::new(*id),
                    *side,
                    *time,
                    Price::from_raw(*price),
                    Quantity::from_raw(*qty),
                )
                .unwrap();
        }
        engine
    }

    #[test]
    fn test_regime_for_height() {
        assert_eq!(AllocationRegime::for_height(10, 0), AllocationRegime::Sequential);
        assert_eq!(AllocationRegime::for_height(9, 10), AllocationRegime::Sequential);
        assert_eq!(AllocationRegime::for_height(10, 10), AllocationRegime::MakerTaker);
    }

    #[test]
    fn test_no_overlap_no_trades() {
        let mut e = engine(
            &[
                ("1", Side::SELL, 100, 101, 10),
                ("2", Side::SELL, 100, 102, 10),
                ("3", Side::BUY, 100, 100, 10),
                ("4", Side::BUY, 100, 99, 10),
            ],
            1,
            100,
        );
        assert!(e.match_orders(100, AllocationRegime::Sequential).unwrap().is_empty());
        assert_eq!(e.last_trade_price().raw(), 100);
        assert_eq!(e.last_match_height(), 100);
        assert!(e.drop_filled_orders().is_empty());
    }

    #[test]
    fn test_match_commits_fills_and_price() {
        let mut e = engine(
            &[("1", Side::BUY, 100, 102, 150), ("2", Side::SELL, 100, 98, 100)],
            1,
            100,
        );
        let trades = e.match_orders(101, AllocationRegime::Sequential).unwrap().to_vec();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].qty.raw(), 100);
        assert_eq!(e.last_trade_price(), trades[0].price);

        let buy = e.book().get_order(&OrderId::new("1"), Side::BUY, Price::from_raw(102)).unwrap();
        assert_eq!(buy.cum_qty.raw(), 100);

        assert_eq!(e.drop_filled_orders(), vec![OrderId::new("2")]);
        assert_eq!(e.book().level_count(Side::SELL), 0);
        assert_eq!(e.book().level_count(Side::BUY), 1);
    }

    #[test]
    fn test_failed_match_leaves_book_untouched() {
        let mut e = engine(
            &[("1", Side::BUY, 10, 102, 30), ("2", Side::SELL, 20, 99, 30)],
            1,
            100,
        );
        let before = e.book().all_levels();
        assert_eq!(
            e.match_orders(100, AllocationRegime::MakerTaker),
            Err(MatchError::MakersOnBothSides)
        );
        assert_eq!(e.book().all_levels(), before);
        assert_eq!(e.last_trade_price().raw(), 100);
        assert!(e.trades().is_empty());
    }

    #[test]
    fn test_revert_restores_book_and_price() {
        let mut e = engine(
            &[("1", Side::BUY, 100, 102, 150), ("2", Side::SELL, 100, 98, 100)],
            1,
            100,
        );
        let before = e.book().all_levels();
        let trades = e.match_orders(101, AllocationRegime::Sequential).unwrap().to_vec();
        assert_eq!(trades.len(), 1);
        assert_ne!(e.book().all_levels(), before);

        e.revert_last_match().unwrap();
        assert_eq!(e.book().all_levels(), before);
        assert_eq!(e.last_trade_price().raw(), 100);
        assert_eq!(e.last_match_height(), 0);
        assert!(e.trades().is_empty());
        assert!(e.drop_filled_orders().is_empty());

        // nothing left to undo
        e.revert_last_match().unwrap();
        assert_eq!(e.book().all_levels(), before);
    }

    #[test]
    fn test_repeated_runs_identical() {
        let orders = [
            ("1", Side::BUY, 100, 102, 37),
            ("2", Side::BUY, 100, 101, 41),
            ("3", Side::SELL, 100, 99, 29),
            ("4", Side::SELL, 100, 100, 53),
            ("5", Side::BUY, 100, 100, 11),
        ];
        let run = || {
            let mut e = engine(&orders, 1, 100);
            let trades = e.match_orders(100, AllocationRegime::Sequential).unwrap().to_vec();
            e.drop_filled_orders();
            (trades, e.book().all_levels())
        };
        assert_eq!(run(), run());
    }
}
