//! Error types for the book and the matching pass

use thiserror::Error;
use types::ids::OrderId;
use types::numeric::Price;
use types::order::Side;

/// Structural errors raised by the order book
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookError {
    #[error("Order {order_id} already exists at price {price}")]
    DuplicateOrder { order_id: OrderId, price: Price },

    #[error("Order {order_id} not found at {side:?} price {price}")]
    OrderNotFound {
        order_id: OrderId,
        side: Side,
        price: Price,
    },

    #[error("Price level {price} not found on {side:?} side")]
    LevelNotFound { side: Side, price: Price },

    #[error("Failed to insert {side:?} price level {price}")]
    InsertFailed { side: Side, price: Price },
}

/// Internal failures of one matching pass
///
/// Any of these makes the pass unusable; the caller discards its scratch
/// state and the book is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MatchError {
    #[error("No clearing level among {levels} overlapped levels")]
    NoClearingLevel { levels: usize },

    #[error("Invalid quantity to drop: {to_drop}")]
    InvalidDropQty { to_drop: i64 },

    #[error("No orders found, to_drop={to_drop}")]
    NoOrdersToDrop { to_drop: i64 },

    #[error("Not enough quantity to drop: to_drop={to_drop}, total={total}")]
    NotEnoughToDrop { to_drop: i64, total: i64 },

    #[error("Allocate residual failed, residual={residual}")]
    AllocationFailed { residual: i64 },

    #[error("Reserve failed at price {price}")]
    ReserveFailed { price: Price },

    #[error("Both buy side and sell side have maker orders")]
    MakersOnBothSides,

    #[error("Quantity overflow: {0}")]
    Overflow(String),

    #[error(transparent)]
    Book(#[from] BookError),
}
