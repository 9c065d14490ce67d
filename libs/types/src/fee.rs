//! Fee calculation types
//!
//! Rates are integers in parts-per-million; fixed fees are raw 1e8 amounts
//! of the native asset.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Denominator for `fee_rate`
pub const FEE_RATE_DENOM: i64 = 1_000_000;

/// Coins charged, keyed by asset
///
/// Backed by a `BTreeMap` so iteration and serialization order are canonical
/// and merging is order-independent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub tokens: BTreeMap<String, i64>,
}

impl Fee {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(asset: impl Into<String>, amount: i64) -> Self {
        let mut fee = Self::new();
        fee.add_asset(asset, amount);
        fee
    }

    /// Add `amount` of `asset`; zero amounts are not recorded
    pub fn add_asset(&mut self, asset: impl Into<String>, amount: i64) {
        if amount == 0 {
            return;
        }
        let entry = self.tokens.entry(asset.into()).or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    /// Commutative merge of another fee into this one
    pub fn add_fee(&mut self, other: &Fee) {
        for (asset, amount) in &other.tokens {
            self.add_asset(asset.clone(), *amount);
        }
    }

    pub fn amount_of(&self, asset: &str) -> i64 {
        self.tokens.get(asset).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

/// Fee parameters in force for a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Trade fee in parts-per-million of the received amount
    pub fee_rate: i64,
    /// Fixed fee for a GTC order expiring without any fill
    pub expire_fee: i64,
    /// Fixed fee for an IOC order removed without any fill
    pub ioc_expire_fee: i64,
    /// Fixed fee for a cancel of an order without any fill
    pub cancel_fee: i64,
    /// Asset the fixed fees are denominated in
    pub native_asset: String,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            fee_rate: 1_000,       // 0.1%
            expire_fee: 20_000,    // 0.0002 native
            ioc_expire_fee: 10_000, // 0.0001 native
            cancel_fee: 20_000,
            native_asset: "BNB".to_string(),
        }
    }
}

impl FeeSchedule {
    /// Proportional trade fee on `amount`, rounded down
    pub fn trade_fee(&self, amount: i64) -> i64 {
        let wide = i128::from(amount) * i128::from(self.fee_rate) / i128::from(FEE_RATE_DENOM);
        i64::try_from(wide).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fee_merge_is_commutative() {
        let mut a = Fee::single("BNB", 10);
        a.add_asset("XYZ", 5);
        let b = Fee::single("XYZ", 7);

        let mut ab = a.clone();
        ab.add_fee(&b);
        let mut ba = b.clone();
        ba.add_fee(&a);

        assert_eq!(ab, ba);
        assert_eq!(ab.amount_of("XYZ"), 12);
        assert_eq!(ab.amount_of("BNB"), 10);
    }

    #[test]
    fn test_zero_amounts_not_recorded() {
        let mut fee = Fee::new();
        fee.add_asset("BNB", 0);
        assert!(fee.is_empty());
    }

    #[test]
    fn test_trade_fee() {
        let schedule = FeeSchedule::default();
        assert_eq!(schedule.trade_fee(1_000_000), 1_000);
        assert_eq!(schedule.trade_fee(999), 0);
    }
}
