//! Volatility spike scenario
//!
//! Bots quote around an external reference that holds still, then moves by
//! `move_bps` over `move_blocks` blocks. The clearing price has to follow the
//! move without any matching pass failing.

use std::collections::BTreeMap;

use types::numeric::Price;

use crate::chain::{ChainConfig, ChainError, MiniChain};
use crate::flow::{FlowConfig, OrderFlow};
use crate::scenarios::{standard_pair, ScenarioResult, UNIT};

#[derive(Debug, Clone)]
pub struct VolatilitySpikeConfig {
    pub seed: u64,
    pub calm_blocks: i64,
    pub move_blocks: i64,
    /// Total move in basis points
    pub move_bps: i64,
    pub is_drop: bool,
    /// Height from which the maker/taker regime applies; 0 never
    pub maker_taker_upgrade_height: i64,
}

impl Default for VolatilitySpikeConfig {
    fn default() -> Self {
        Self {
            seed: 7,
            calm_blocks: 5,
            move_blocks: 10,
            move_bps: 1_000,
            is_drop: true,
            maker_taker_upgrade_height: 0,
        }
    }
}

fn reference_at(config: &VolatilitySpikeConfig, list: Price, block: i64) -> Price {
    let progress = (block - config.calm_blocks).clamp(0, config.move_blocks.max(1));
    let bps = config.move_bps * progress / config.move_blocks.max(1);
    let bps = if config.is_drop { -bps } else { bps };
    let raw = i128::from(list.raw()) * i128::from(10_000 + bps) / 10_000;
    Price::from_raw(i64::try_from(raw).unwrap_or(i64::MAX))
}

/// Run a volatility spike scenario.
pub fn run(config: &VolatilitySpikeConfig) -> Result<ScenarioResult, ChainError> {
    let pair = standard_pair("VOL-000_BNB");
    let mut chain_config = ChainConfig {
        pairs: vec![pair.clone()],
        ..ChainConfig::default()
    };
    chain_config.keeper.maker_taker_upgrade_height = config.maker_taker_upgrade_height;
    let mut chain = MiniChain::new(chain_config)?;

    let flow_config = FlowConfig {
        seed: config.seed,
        ..FlowConfig::default()
    };
    let mut flow = OrderFlow::new(flow_config, vec![pair.clone()]);
    chain.fund_all(&flow.accounts(), 1_000_000 * UNIT)?;

    let mut orders = 0u64;
    let mut failed = 0usize;
    let total_blocks = config.calm_blocks + config.move_blocks;
    for block in 0..total_blocks {
        let reference = reference_at(config, pair.list_price, block + 1);
        let references = BTreeMap::from([(pair.symbol.clone(), reference)]);
        let txs = flow.next_block(&references);
        orders += txs.len() as u64;
        let outcome = chain.produce_block(txs)?;
        failed += outcome.round.failed_symbols().len();
        flow.observe(&outcome);
    }

    let target = reference_at(config, pair.list_price, total_blocks);
    let last = chain.keeper().last_trade_price(&pair.symbol)?;
    let followed = if config.is_drop {
        last < pair.list_price
    } else {
        last > pair.list_price
    };

    let metrics = chain.metrics();
    Ok(ScenarioResult {
        name: "volatility_spike".to_string(),
        blocks_run: total_blocks as u64,
        orders_submitted: orders,
        trades_executed: metrics.total_trades,
        rejected: metrics.txs_rejected,
        passed: followed && failed == 0,
        details: format!(
            "Reference {} -> {}, last trade {}, {} failed passes",
            pair.list_price, target, last, failed
        ),
    })
}
