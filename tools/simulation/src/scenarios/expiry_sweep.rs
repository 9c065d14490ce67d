//! Expiry sweep scenario
//!
//! Rests a batch of orders early, a second batch inside the retention
//! window, then runs to the next breathe block. Only the early batch may
//! expire, each expiry pays the expire fee and releases its locked funds.

use order_keeper::Ledger;
use types::ids::{AccountId, OrderId};
use types::msg::{NewOrderMsg, Tx};
use types::numeric::{Price, Quantity};
use types::order::{Side, TimeInForce};
use types::pair::TradingPair;

use crate::chain::{ChainConfig, ChainError, MiniChain};
use crate::scenarios::{standard_pair, ScenarioResult, UNIT};

#[derive(Debug, Clone)]
pub struct ExpirySweepConfig {
    pub stale_orders: usize,
    pub fresh_orders: usize,
    pub breathe_block_interval: i64,
    pub order_retention_blocks: i64,
    pub pool_size: u32,
}

impl Default for ExpirySweepConfig {
    fn default() -> Self {
        Self {
            stale_orders: 40,
            fresh_orders: 20,
            breathe_block_interval: 10,
            order_retention_blocks: 4,
            pool_size: 2,
        }
    }
}

fn resting_orders(pair: &TradingPair, prefix: &str, count: usize) -> (Vec<AccountId>, Vec<Tx>) {
    let accounts: Vec<AccountId> = (0..count).map(|i| AccountId::new(format!("{prefix}-{i:03}"))).collect();
    let txs = accounts
        .iter()
        .enumerate()
        .map(|(i, sender)| {
            // buys at 0.9, sells at 1.1
            let (side, price) = if i % 2 == 0 {
                (Side::BUY, pair.list_price.raw() / 10 * 9)
            } else {
                (Side::SELL, pair.list_price.raw() / 10 * 11)
            };
            Tx::NewOrder(NewOrderMsg {
                id: OrderId::generate(sender, 1),
                sender: sender.clone(),
                symbol: pair.symbol.clone(),
                side,
                price: Price::from_raw(price),
                quantity: Quantity::from_raw(pair.lot_size.raw() * 10),
                time_in_force: TimeInForce::GTC,
            })
        })
        .collect();
    (accounts, txs)
}

/// Run the expiry sweep scenario.
pub fn run(config: &ExpirySweepConfig) -> Result<ScenarioResult, ChainError> {
    let pair = standard_pair("EXP-000_BNB");
    let mut chain_config = ChainConfig {
        pairs: vec![pair.clone()],
        ..ChainConfig::default()
    };
    chain_config.keeper.pool_size = config.pool_size;
    chain_config.keeper.breathe_block_interval = config.breathe_block_interval;
    chain_config.keeper.order_retention_blocks = config.order_retention_blocks;
    let expire_fee = chain_config.keeper.fees.expire_fee;
    let native = chain_config.keeper.fees.native_asset.clone();
    let mut chain = MiniChain::new(chain_config)?;

    let (stale_accounts, stale_txs) = resting_orders(&pair, "stale", config.stale_orders);
    let (fresh_accounts, fresh_txs) = resting_orders(&pair, "fresh", config.fresh_orders);
    chain.fund_all(&stale_accounts, 1_000 * UNIT)?;
    chain.fund_all(&fresh_accounts, 1_000 * UNIT)?;

    // fresh orders land on the first height inside the retention window
    let sweep_height = config.breathe_block_interval;
    let fresh_height = (sweep_height - config.order_retention_blocks).max(2);

    let mut submitted = 0u64;
    let mut expired = 0usize;
    let mut pooled_before_sweep = 0i64;
    while chain.next_height() <= sweep_height {
        let height = chain.next_height();
        let txs = if height == 1 {
            stale_txs.clone()
        } else if height == fresh_height {
            fresh_txs.clone()
        } else {
            Vec::new()
        };
        submitted += txs.len() as u64;
        if height == sweep_height {
            pooled_before_sweep = chain.keeper().fee_pool().total().amount_of(&native);
        }
        let outcome = chain.produce_block(txs)?;
        expired += outcome.round.expired.values().map(Vec::len).sum::<usize>();
    }

    let swept_fee = chain.keeper().fee_pool().total().amount_of(&native) - pooled_before_sweep;
    let fee_ok = swept_fee == expire_fee * config.stale_orders as i64;

    let ledger = chain.keeper().ledger();
    let stale_released = stale_accounts.iter().all(|account| {
        [pair.base_asset(), pair.quote_asset()]
            .iter()
            .all(|asset| ledger.balance(account, asset).locked == 0)
    });
    let fresh_open = fresh_accounts
        .iter()
        .map(|account| chain.keeper().open_orders(&pair.symbol, account).map(|o| o.len()))
        .sum::<Result<usize, _>>()?;

    let metrics = chain.metrics();
    Ok(ScenarioResult {
        name: "expiry_sweep".to_string(),
        blocks_run: sweep_height as u64,
        orders_submitted: submitted,
        trades_executed: metrics.total_trades,
        rejected: metrics.txs_rejected,
        passed: expired == config.stale_orders && fee_ok && stale_released && fresh_open == config.fresh_orders,
        details: format!(
            "Sweep at {}: {} expired, {} fresh still open, {} {} swept",
            sweep_height, expired, fresh_open, swept_fee, native
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expiry_sweep() {
        let result = run(&ExpirySweepConfig::default()).unwrap();
        assert!(result.passed, "{}", result.details);
        assert_eq!(result.orders_submitted, 60);
        assert_eq!(result.trades_executed, 0);
    }

    #[test]
    fn test_sweep_single_worker() {
        let config = ExpirySweepConfig {
            pool_size: 0,
            ..Default::default()
        };
        let result = run(&config).unwrap();
        assert!(result.passed, "{}", result.details);
    }

    #[test]
    fn test_nothing_stale() {
        let config = ExpirySweepConfig {
            stale_orders: 0,
            ..Default::default()
        };
        let result = run(&config).unwrap();
        assert!(result.passed, "{}", result.details);
    }
}
