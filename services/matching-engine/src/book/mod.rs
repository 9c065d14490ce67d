//! Order book infrastructure module
//!
//! Contains price levels, the per-side unrolled linked list and the
//! two-sided book built on top of it.

pub mod price_level;
pub mod ulist;
pub mod order_book;

pub use order_book::{BookDepth, DepthLevel, OrderBook};
pub use price_level::{OrderPart, PriceLevel};
pub use ulist::ULList;
