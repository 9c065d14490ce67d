//! Matching Engine Service
//!
//! Per-symbol call-auction matching. Orders rest in a two-sided book; once
//! per block the crossed range is cleared at a single price and fills are
//! allocated with lot-size-exact proportional rules.
//!
//! **Key Invariants:**
//! - Integer fixed-point arithmetic only
//! - Deterministic matching (same book, same trades)
//! - `0 <= cum_qty <= qty` for every order
//! - A failed pass leaves the book untouched

pub mod book;
pub mod matching;
pub mod engine;
pub mod error;

pub use book::{BookDepth, DepthLevel, OrderBook, OrderPart, PriceLevel};
pub use engine::{AllocationRegime, EngineConfig, MatchEngine};
pub use error::{BookError, MatchError};
