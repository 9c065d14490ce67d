//! Price level implementation with FIFO queue
//!
//! A price level contains all orders at a specific price point. Orders keep
//! their arrival order, which is also ascending entry height, so expiry can
//! cut a prefix with a binary search.

use serde::{Deserialize, Serialize};
use types::ids::OrderId;
use types::numeric::{Price, Quantity};

use crate::error::BookError;

/// The engine's view of a resting order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPart {
    pub id: OrderId,
    /// Height the order entered the book
    pub time: i64,
    pub qty: Quantity,
    pub cum_qty: Quantity,
}

impl OrderPart {
    pub fn new(id: OrderId, time: i64, qty: Quantity) -> Self {
        Self {
            id,
            time,
            qty,
            cum_qty: Quantity::ZERO,
        }
    }

    /// Unfilled quantity, never negative
    pub fn leaves_qty(&self) -> Quantity {
        if self.cum_qty >= self.qty {
            Quantity::ZERO
        } else {
            self.qty - self.cum_qty
        }
    }
}

/// A price level containing orders at a specific price
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Price,
    pub orders: Vec<OrderPart>,
}

impl PriceLevel {
    /// Create a new empty price level
    pub fn new(price: Price) -> Self {
        Self {
            price,
            orders: Vec::new(),
        }
    }

    pub fn with_orders(price: Price, orders: Vec<OrderPart>) -> Self {
        Self { price, orders }
    }

    /// Append an order at the back of the queue
    ///
    /// Returns the new number of orders at this level.
    pub fn add_order(&mut self, order: OrderPart) -> Result<usize, BookError> {
        if self.orders.iter().any(|o| o.id == order.id) {
            return Err(BookError::DuplicateOrder {
                order_id: order.id,
                price: self.price,
            });
        }
        self.orders.push(order);
        Ok(self.orders.len())
    }

    /// Remove an order by id, keeping the order of the rest
    pub fn remove_order(&mut self, id: &OrderId) -> Option<OrderPart> {
        let position = self.orders.iter().position(|o| &o.id == id)?;
        Some(self.orders.remove(position))
    }

    pub fn get_order(&self, id: &OrderId) -> Option<&OrderPart> {
        self.orders.iter().find(|o| &o.id == id)
    }

    pub fn get_order_mut(&mut self, id: &OrderId) -> Option<&mut OrderPart> {
        self.orders.iter_mut().find(|o| &o.id == id)
    }

    /// Drop every order that entered before `before_time`
    ///
    /// Each removed order is handed to `callback` in queue order. Returns the
    /// number of orders removed.
    pub fn remove_orders_before<F>(&mut self, before_time: i64, mut callback: F) -> usize
    where
        F: FnMut(OrderPart),
    {
        let cut = self.orders.partition_point(|o| o.time < before_time);
        for order in self.orders.drain(..cut) {
            callback(order);
        }
        cut
    }

    /// Sum of unfilled quantity at this level
    pub fn total_leaves(&self) -> Quantity {
        self.orders
            .iter()
            .fold(Quantity::ZERO, |acc, o| acc.saturating_add(o.leaves_qty()))
    }

    /// Check if the price level is empty
    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Get the number of orders at this level
    pub fn order_count(&self) -> usize {
        self.orders.len()
    }
}
