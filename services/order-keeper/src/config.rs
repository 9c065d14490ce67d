//! Keeper configuration
//!
//! Every value here is chain-wide: validators must agree on all of them,
//! including `pool_size`, which fixes the number of settlement shards.

use matching_engine::AllocationRegime;
use serde::{Deserialize, Serialize};
use types::fee::FeeSchedule;

use crate::error::KeeperError;

/// `pool_size` above this would spawn an unreasonable number of threads
pub const MAX_POOL_SIZE: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Worker pools and settlement shards are `2^pool_size` wide
    pub pool_size: u32,
    /// First height using maker/taker allocation; 0 keeps the sequential regime
    pub maker_taker_upgrade_height: i64,
    /// Heights between breathe blocks
    pub breathe_block_interval: i64,
    /// Orders older than this many blocks expire at a breathe block
    pub order_retention_blocks: i64,
    /// Price-limit band for the market-pressure tie-break, in basis points
    pub price_limit_bps: i64,
    /// Levels per side published with each round
    pub depth_levels: usize,
    /// Market-data events buffered before new ones are dropped
    pub publish_buffer: usize,
    pub fees: FeeSchedule,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            pool_size: 2,
            maker_taker_upgrade_height: 0,
            breathe_block_interval: 10_000,
            order_retention_blocks: 30_000,
            price_limit_bps: matching_engine::engine::DEFAULT_PRICE_LIMIT_BPS,
            depth_levels: 20,
            publish_buffer: 1_024,
            fees: FeeSchedule::default(),
        }
    }
}

impl KeeperConfig {
    pub fn from_json_str(json: &str) -> Result<Self, KeeperError> {
        let config: Self = serde_json::from_str(json).map_err(|e| KeeperError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), KeeperError> {
        if self.pool_size > MAX_POOL_SIZE {
            return Err(KeeperError::Config(format!(
                "pool_size {} exceeds {}",
                self.pool_size, MAX_POOL_SIZE
            )));
        }
        if self.breathe_block_interval < 0 || self.order_retention_blocks < 0 {
            return Err(KeeperError::Config("block intervals must not be negative".into()));
        }
        if !(0..10_000).contains(&self.price_limit_bps) {
            return Err(KeeperError::Config(format!(
                "price_limit_bps {} outside [0, 10000)",
                self.price_limit_bps
            )));
        }
        if self.fees.fee_rate < 0 || self.fees.expire_fee < 0 || self.fees.ioc_expire_fee < 0 || self.fees.cancel_fee < 0 {
            return Err(KeeperError::Config("fees must not be negative".into()));
        }
        Ok(())
    }

    pub fn shard_count(&self) -> usize {
        1usize << self.pool_size.min(MAX_POOL_SIZE)
    }

    pub fn regime_at(&self, height: i64) -> AllocationRegime {
        AllocationRegime::for_height(height, self.maker_taker_upgrade_height)
    }

    pub fn is_breathe_block(&self, height: i64) -> bool {
        self.breathe_block_interval > 0 && height > 0 && height % self.breathe_block_interval == 0
    }

    /// Orders entered below this height expire at `height`
    pub fn expire_before(&self, height: i64) -> i64 {
        height - self.order_retention_blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_json_partial_uses_defaults() {
        let config = KeeperConfig::from_json_str(r#"{"pool_size": 3, "maker_taker_upgrade_height": 500}"#).unwrap();
        assert_eq!(config.shard_count(), 8);
        assert_eq!(config.regime_at(499), AllocationRegime::Sequential);
        assert_eq!(config.regime_at(500), AllocationRegime::MakerTaker);
        assert_eq!(config.fees, FeeSchedule::default());
        assert_eq!(config.price_limit_bps, 500);
    }

    #[test]
    fn test_from_json_rejects_bad_values() {
        assert!(KeeperConfig::from_json_str(r#"{"pool_size": 40}"#).is_err());
        assert!(KeeperConfig::from_json_str(r#"{"price_limit_bps": -1}"#).is_err());
        assert!(KeeperConfig::from_json_str("not json").is_err());
    }

    #[test]
    fn test_breathe_blocks() {
        let config = KeeperConfig {
            breathe_block_interval: 100,
            order_retention_blocks: 250,
            ..KeeperConfig::default()
        };
        assert!(!config.is_breathe_block(0));
        assert!(!config.is_breathe_block(99));
        assert!(config.is_breathe_block(300));
        assert_eq!(config.expire_before(300), 50);
    }
}
