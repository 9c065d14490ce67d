//! Seeded order flow across several markets
//!
//! One market maker per market plus a crowd of retail traders. The same seed
//! and the same block outcomes always produce the same transactions.

use std::collections::BTreeMap;

use order_keeper::BlockOutcome;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use types::ids::{AccountId, Symbol};
use types::msg::Tx;
use types::numeric::Price;
use types::pair::TradingPair;

use crate::bots::market_maker::{MarketMaker, MarketMakerConfig};
use crate::bots::retail_trader::{RetailTrader, RetailTraderConfig};
use crate::bots::MarketView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowConfig {
    pub seed: u64,
    pub retail_traders: usize,
    /// Retail transactions per block, spread over all markets
    pub retail_txs_per_block: usize,
    /// Blocks between market maker requotes
    pub requote_every: i64,
    pub maker: MarketMakerConfig,
    pub retail: RetailTraderConfig,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            retail_traders: 10,
            retail_txs_per_block: 40,
            requote_every: 1,
            maker: MarketMakerConfig::default(),
            retail: RetailTraderConfig::default(),
        }
    }
}

pub struct OrderFlow {
    config: FlowConfig,
    markets: Vec<TradingPair>,
    makers: Vec<MarketMaker>,
    traders: Vec<RetailTrader>,
    rng: ChaCha8Rng,
    blocks: i64,
}

impl OrderFlow {
    pub fn new(config: FlowConfig, markets: Vec<TradingPair>) -> Self {
        let makers = markets
            .iter()
            .enumerate()
            .map(|(i, pair)| {
                let account = AccountId::new(format!("mm-{}", pair.base_asset().to_lowercase()));
                MarketMaker::new(account, config.maker.clone(), config.seed.wrapping_add(1_000 + i as u64))
            })
            .collect();
        let traders = (0..config.retail_traders)
            .map(|i| {
                RetailTrader::new(
                    AccountId::new(format!("retail-{i:03}")),
                    config.retail.clone(),
                    config.seed.wrapping_add(i as u64),
                )
            })
            .collect();
        Self {
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            config,
            markets,
            makers,
            traders,
            blocks: 0,
        }
    }

    /// Every account the flow trades from, for funding
    pub fn accounts(&self) -> Vec<AccountId> {
        self.makers
            .iter()
            .map(|m| m.account.clone())
            .chain(self.traders.iter().map(|t| t.account.clone()))
            .collect()
    }

    pub fn markets(&self) -> &[TradingPair] {
        &self.markets
    }

    /// Transactions for the next block
    ///
    /// `references` holds the last trade price per symbol; markets missing
    /// from it quote around their list price.
    pub fn next_block(&mut self, references: &BTreeMap<Symbol, Price>) -> Vec<Tx> {
        let mut txs = Vec::new();
        let requote = self.config.requote_every <= 1 || self.blocks % self.config.requote_every == 0;
        self.blocks += 1;

        if requote {
            for (maker, pair) in self.makers.iter_mut().zip(&self.markets) {
                let reference = references.get(&pair.symbol).copied().unwrap_or(pair.list_price);
                txs.extend(maker.quote(&MarketView::new(pair, reference)));
            }
        }

        if self.traders.is_empty() || self.markets.is_empty() {
            return txs;
        }
        for _ in 0..self.config.retail_txs_per_block {
            let pair = &self.markets[self.rng.gen_range(0..self.markets.len())];
            let trader = self.rng.gen_range(0..self.traders.len());
            let reference = references.get(&pair.symbol).copied().unwrap_or(pair.list_price);
            txs.push(self.traders[trader].next_tx(&MarketView::new(pair, reference)));
        }
        txs
    }

    /// Feed settled fills back to the market makers
    pub fn observe(&mut self, outcome: &BlockOutcome) {
        for (maker, pair) in self.makers.iter_mut().zip(&self.markets) {
            maker.observe(pair.base_asset(), &outcome.round.settlement.transfers);
        }
    }

    pub fn makers(&self) -> &[MarketMaker] {
        &self.makers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::Quantity;

    fn markets() -> Vec<TradingPair> {
        ["AAA-111_BNB", "BBB-222_BNB"]
            .into_iter()
            .map(|s| {
                TradingPair::new(
                    Symbol::new(s),
                    Price::from_raw(1_000),
                    Quantity::from_raw(100_000),
                    Price::from_raw(100_000_000),
                )
            })
            .collect()
    }

    #[test]
    fn test_same_seed_same_blocks() {
        let mut a = OrderFlow::new(FlowConfig::default(), markets());
        let mut b = OrderFlow::new(FlowConfig::default(), markets());
        let refs = BTreeMap::new();
        for _ in 0..5 {
            assert_eq!(a.next_block(&refs), b.next_block(&refs));
        }
    }

    #[test]
    fn test_block_size_and_accounts() {
        let config = FlowConfig {
            retail_traders: 3,
            retail_txs_per_block: 7,
            ..FlowConfig::default()
        };
        let mut flow = OrderFlow::new(config, markets());
        // two makers, three levels a side, nothing to cancel yet
        assert_eq!(flow.next_block(&BTreeMap::new()).len(), 2 * 6 + 7);
        assert_eq!(flow.accounts().len(), 5);
        assert_eq!(flow.accounts()[0], AccountId::new("mm-aaa-111"));
    }

    #[test]
    fn test_requote_interval() {
        let config = FlowConfig {
            retail_txs_per_block: 0,
            requote_every: 3,
            ..FlowConfig::default()
        };
        let mut flow = OrderFlow::new(config, markets());
        let sizes: Vec<usize> = (0..4).map(|_| flow.next_block(&BTreeMap::new()).len()).collect();
        // the second ladder also cancels the first
        assert_eq!(sizes, vec![12, 0, 0, 24]);
    }
}
