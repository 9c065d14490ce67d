//! Order flood scenario
//!
//! Bursts N orders into a single block across several markets to verify the
//! parallel round accounts for every transaction and leaves no market
//! crossed.

use types::ids::{AccountId, OrderId};
use types::msg::{NewOrderMsg, Tx};
use types::numeric::{Price, Quantity};
use types::order::{Side, TimeInForce};

use crate::chain::{ChainConfig, ChainError, MiniChain};
use crate::scenarios::{standard_pair, ScenarioResult, UNIT};

#[derive(Debug, Clone)]
pub struct OrderFloodConfig {
    pub burst_size: usize,
    pub markets: usize,
    pub accounts: usize,
    /// Price offsets cycle through `0..spread_ticks` ticks around 1.0
    pub spread_ticks: i64,
    pub order_lots: i64,
    pub pool_size: u32,
}

impl Default for OrderFloodConfig {
    fn default() -> Self {
        Self {
            burst_size: 1_000,
            markets: 4,
            accounts: 10,
            spread_ticks: 200,
            order_lots: 100,
            pool_size: 2,
        }
    }
}

/// Run the order flood scenario.
///
/// Each market sees alternating buys and sells; buys are staggered below
/// 1.0 and sells above, so `spread_ticks: 0` makes everything cross.
pub fn run(config: &OrderFloodConfig) -> Result<ScenarioResult, ChainError> {
    let pairs: Vec<_> = (0..config.markets.max(1))
        .map(|i| standard_pair(&format!("FLD-{i:03}_BNB")))
        .collect();
    let mut chain_config = ChainConfig {
        pairs: pairs.clone(),
        ..ChainConfig::default()
    };
    chain_config.keeper.pool_size = config.pool_size;
    let mut chain = MiniChain::new(chain_config)?;

    let accounts: Vec<AccountId> = (0..config.accounts.max(1))
        .map(|i| AccountId::new(format!("flood-{i:03}")))
        .collect();
    chain.fund_all(&accounts, 1_000_000 * UNIT)?;

    let txs: Vec<Tx> = (0..config.burst_size)
        .map(|i| {
            let sender = accounts[i % accounts.len()].clone();
            let pair = &pairs[i % pairs.len()];
            let round = i / pairs.len();
            let side = if round % 2 == 0 { Side::BUY } else { Side::SELL };
            let offset = pair.tick_size.raw() * (round as i64 % config.spread_ticks.max(1));
            let price = match side {
                Side::BUY => pair.list_price.raw() - offset,
                Side::SELL => pair.list_price.raw() + offset,
            };
            Tx::NewOrder(NewOrderMsg {
                id: OrderId::generate(&sender, i as u64),
                sender,
                symbol: pair.symbol.clone(),
                side,
                price: Price::from_raw(price),
                quantity: Quantity::from_raw(pair.lot_size.raw() * config.order_lots),
                time_in_force: TimeInForce::GTC,
            })
        })
        .collect();

    let outcome = chain.produce_block(txs)?;
    let accounted = outcome.accepted.txs.len() + outcome.rejected.len() == config.burst_size;

    let mut crossed = Vec::new();
    for pair in &pairs {
        let depth = chain.keeper().depth(&pair.symbol, 1)?;
        if let (Some(bid), Some(ask)) = (depth.buys.first(), depth.sells.first()) {
            if bid.price >= ask.price {
                crossed.push(pair.symbol.to_string());
            }
        }
    }

    let trades = outcome.round.trade_count() as u64;
    Ok(ScenarioResult {
        name: "order_flood".to_string(),
        blocks_run: 1,
        orders_submitted: config.burst_size as u64,
        trades_executed: trades,
        rejected: outcome.rejected.len() as u64,
        passed: accounted && crossed.is_empty() && outcome.round.failed_symbols().is_empty(),
        details: format!(
            "Burst of {} orders over {} markets: {} accepted, {} trades, crossed books: {:?}",
            config.burst_size,
            pairs.len(),
            outcome.accepted.txs.len(),
            trades,
            crossed,
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_flood() {
        let config = OrderFloodConfig {
            burst_size: 100,
            ..Default::default()
        };
        let result = run(&config).unwrap();
        assert!(result.passed, "{}", result.details);
        assert_eq!(result.orders_submitted, 100);
        assert_eq!(result.rejected, 0);
    }

    #[test]
    fn test_large_flood() {
        let config = OrderFloodConfig {
            burst_size: 5_000,
            pool_size: 4,
            ..Default::default()
        };
        let result = run(&config).unwrap();
        assert!(result.passed, "{}", result.details);
    }

    #[test]
    fn test_flood_trades() {
        // every order at 1.0
        let config = OrderFloodConfig {
            burst_size: 200,
            spread_ticks: 0,
            ..Default::default()
        };
        let result = run(&config).unwrap();
        assert!(result.passed, "{}", result.details);
        assert!(result.trades_executed > 0);
    }
}
