//! Matching logic module
//!
//! One call-auction pass: build the crossed range, pick the clearing level,
//! then allocate fills under one of two regimes.

pub mod overlap;
pub mod clearing;
pub mod allocation;
pub mod legacy;
pub mod maker_taker;

pub use clearing::get_trade_price;
pub use overlap::{prepare_match, OverlappedLevel, ScratchOrder};
