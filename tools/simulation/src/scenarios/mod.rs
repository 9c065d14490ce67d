//! Scenario simulation modules
//!
//! Each scenario drives a fresh chain through one stress pattern and checks
//! the property that pattern is meant to exercise.

pub mod expiry_sweep;
pub mod order_flood;
pub mod volatility_spike;

use serde::{Deserialize, Serialize};
use types::ids::Symbol;
use types::numeric::{Price, Quantity};
use types::pair::TradingPair;

/// Result of a scenario run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub name: String,
    pub blocks_run: u64,
    pub orders_submitted: u64,
    pub trades_executed: u64,
    pub rejected: u64,
    pub passed: bool,
    pub details: String,
}

pub(crate) const UNIT: i64 = 100_000_000;

/// Pair on a 0.00001 tick and 0.001 lot grid, listed at 1.0
pub(crate) fn standard_pair(symbol: &str) -> TradingPair {
    TradingPair::new(
        Symbol::new(symbol),
        Price::from_raw(1_000),
        Quantity::from_raw(100_000),
        Price::from_raw(UNIT),
    )
}
