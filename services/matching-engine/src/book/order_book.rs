//! Two-sided order book for one symbol
//!
//! Buys are kept best (highest) first, sells best (lowest) first, each in its
//! own [`ULList`].

use serde::{Deserialize, Serialize};
use types::ids::OrderId;
use types::numeric::{Price, Quantity};
use types::order::Side;

use super::price_level::{OrderPart, PriceLevel};
use super::ulist::{ULList, DEFAULT_BUCKET_SIZE, DEFAULT_CAPACITY};
use crate::error::BookError;
use crate::matching::overlap::{merge_levels, OverlappedLevel};

/// Aggregated quantity at one price, for depth snapshots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthLevel {
    pub price: Price,
    pub qty: Quantity,
}

/// Best `n` levels per side
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookDepth {
    pub buys: Vec<DepthLevel>,
    pub sells: Vec<DepthLevel>,
}

#[derive(Debug, Clone)]
pub struct OrderBook {
    buys: ULList,
    sells: ULList,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, DEFAULT_BUCKET_SIZE)
    }

    pub fn with_capacity(capacity: usize, bucket_size: usize) -> Self {
        Self {
            buys: ULList::new(capacity, bucket_size, Side::BUY),
            sells: ULList::new(capacity, bucket_size, Side::SELL),
        }
    }

    fn queue(&self, side: Side) -> &ULList {
        match side {
            Side::BUY => &self.buys,
            Side::SELL => &self.sells,
        }
    }

    fn queue_mut(&mut self, side: Side) -> &mut ULList {
        match side {
            Side::BUY => &mut self.buys,
            Side::SELL => &mut self.sells,
        }
    }

    /// Insert an order, creating its price level when absent
    pub fn insert_order(
        &mut self,
        id: OrderId,
        side: Side,
        time: i64,
        price: Price,
        qty: Quantity,
    ) -> Result<(), BookError> {
        let queue = self.queue_mut(side);
        if let Some(level) = queue.get_price_level_mut(price) {
            level.add_order(OrderPart::new(id, time, qty))?;
            return Ok(());
        }
        let level = PriceLevel::with_orders(price, vec![OrderPart::new(id, time, qty)]);
        if queue.add_price_level(level) {
            Ok(())
        } else {
            Err(BookError::InsertFailed { side, price })
        }
    }

    /// Insert a whole level, used when restoring a snapshot
    pub fn insert_price_level(&mut self, level: PriceLevel, side: Side) -> Result<(), BookError> {
        let price = level.price;
        if self.queue_mut(side).add_price_level(level) {
            Ok(())
        } else {
            Err(BookError::InsertFailed { side, price })
        }
    }

    pub fn get_order(&self, id: &OrderId, side: Side, price: Price) -> Result<&OrderPart, BookError> {
        self.queue(side)
            .get_price_level(price)
            .ok_or(BookError::LevelNotFound { side, price })?
            .get_order(id)
            .ok_or_else(|| BookError::OrderNotFound {
                order_id: id.clone(),
                side,
                price,
            })
    }

    pub(crate) fn get_order_mut(
        &mut self,
        id: &OrderId,
        side: Side,
        price: Price,
    ) -> Result<&mut OrderPart, BookError> {
        self.queue_mut(side)
            .get_price_level_mut(price)
            .ok_or(BookError::LevelNotFound { side, price })?
            .get_order_mut(id)
            .ok_or_else(|| BookError::OrderNotFound {
                order_id: id.clone(),
                side,
                price,
            })
    }

    /// Remove an order; its level goes too once empty
    pub fn remove_order(&mut self, id: &OrderId, side: Side, price: Price) -> Result<OrderPart, BookError> {
        let queue = self.queue_mut(side);
        let level = queue
            .get_price_level_mut(price)
            .ok_or(BookError::LevelNotFound { side, price })?;
        let order = level.remove_order(id).ok_or_else(|| BookError::OrderNotFound {
            order_id: id.clone(),
            side,
            price,
        })?;
        if level.is_empty() {
            queue.delete_price_level(price);
        }
        Ok(order)
    }

    pub fn remove_price_level(&mut self, price: Price, side: Side) -> Option<PriceLevel> {
        self.queue_mut(side).delete_price_level(price)
    }

    pub fn best_price(&self, side: Side) -> Option<Price> {
        self.queue(side).get_top().map(|l| l.price)
    }

    pub fn get_level(&self, side: Side, price: Price) -> Option<&PriceLevel> {
        self.queue(side).get_price_level(price)
    }

    /// Levels that cross, merged by price from highest to lowest
    ///
    /// Empty when either side is empty or the best buy is below the best sell.
    pub fn overlapped_range(&self) -> Vec<OverlappedLevel> {
        let (Some(best_buy), Some(best_sell)) = (self.best_price(Side::BUY), self.best_price(Side::SELL)) else {
            return Vec::new();
        };
        if best_buy < best_sell {
            return Vec::new();
        }
        let buy_levels = self.buys.get_price_range(best_buy, best_sell);
        let sell_levels = self.sells.get_price_range(best_sell, best_buy);
        merge_levels(&buy_levels, &sell_levels)
    }

    /// Aggregated leaves quantity for the best `max_levels` on each side
    pub fn show_depth(&self, max_levels: usize) -> BookDepth {
        let collect = |queue: &ULList| -> Vec<DepthLevel> {
            queue
                .iter()
                .take(max_levels)
                .map(|l| DepthLevel {
                    price: l.price,
                    qty: l.total_leaves(),
                })
                .collect()
        };
        BookDepth {
            buys: collect(&self.buys),
            sells: collect(&self.sells),
        }
    }

    /// Copies of every level, buys then sells, each best first
    pub fn all_levels(&self) -> (Vec<PriceLevel>, Vec<PriceLevel>) {
        (
            self.buys.iter().cloned().collect(),
            self.sells.iter().cloned().collect(),
        )
    }

    /// Remove every order on `side` that entered before `before_time`
    ///
    /// `callback` receives each removed order with its level price. Levels
    /// left empty are deleted.
    pub fn remove_orders_before<F>(&mut self, before_time: i64, side: Side, mut callback: F) -> usize
    where
        F: FnMut(Price, OrderPart),
    {
        let queue = self.queue_mut(side);
        let mut removed = 0;
        for price in queue.prices() {
            let emptied = match queue.get_price_level_mut(price) {
                Some(level) => {
                    removed += level.remove_orders_before(before_time, |o| callback(price, o));
                    level.is_empty()
                }
                None => false,
            };
            if emptied {
                queue.delete_price_level(price);
            }
        }
        removed
    }

    pub fn level_count(&self, side: Side) -> usize {
        self.queue(side).len()
    }

    pub fn is_empty(&self) -> bool {
        self.buys.is_empty() && self.sells.is_empty()
    }

    pub fn clear(&mut self) {
        self.buys.clear();
        self.sells.clear();
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}
