//! Retail random trader bot
//!
//! Generates random limit orders with a deterministic seeded RNG. A share of
//! orders cross the reference aggressively, some are IOC, and the trader now
//! and then cancels one of its own earlier orders, which may already be gone.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use types::ids::{AccountId, OrderId, Symbol};
use types::msg::{CancelOrderMsg, NewOrderMsg, Tx};
use types::order::{Side, TimeInForce};

use super::MarketView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetailTraderConfig {
    pub min_lots: i64,
    pub max_lots: i64,
    /// Probability of pricing through the reference
    pub aggressive_ratio: f64,
    pub ioc_ratio: f64,
    pub cancel_ratio: f64,
    /// Maximum distance from the reference for passive orders
    pub max_limit_distance_bps: i64,
}

impl Default for RetailTraderConfig {
    fn default() -> Self {
        Self {
            min_lots: 1,
            max_lots: 50,
            aggressive_ratio: 0.3,
            ioc_ratio: 0.1,
            cancel_ratio: 0.1,
            max_limit_distance_bps: 50,
        }
    }
}

pub struct RetailTrader {
    pub account: AccountId,
    pub config: RetailTraderConfig,
    pub orders_submitted: u64,
    pub cancels_submitted: u64,
    resting: Vec<(OrderId, Symbol)>,
    sequence: u64,
    rng: ChaCha8Rng,
}

impl RetailTrader {
    pub fn new(account: AccountId, config: RetailTraderConfig, seed: u64) -> Self {
        Self {
            account,
            config,
            orders_submitted: 0,
            cancels_submitted: 0,
            resting: Vec::new(),
            sequence: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Next transaction for `view`'s market
    pub fn next_tx(&mut self, view: &MarketView<'_>) -> Tx {
        if !self.resting.is_empty() && self.rng.gen_bool(self.config.cancel_ratio) {
            let index = self.rng.gen_range(0..self.resting.len());
            let (ref_id, symbol) = self.resting.swap_remove(index);
            self.cancels_submitted += 1;
            return Tx::CancelOrder(CancelOrderMsg {
                sender: self.account.clone(),
                symbol,
                ref_id,
            });
        }

        let side = if self.rng.gen_bool(0.5) { Side::BUY } else { Side::SELL };
        let distance = if self.rng.gen_bool(self.config.aggressive_ratio) {
            // through the reference
            -self.rng.gen_range(1..=self.config.max_limit_distance_bps.max(1))
        } else {
            self.rng.gen_range(0..=self.config.max_limit_distance_bps.max(0))
        };
        let bps = match side {
            Side::BUY => -distance,
            Side::SELL => distance,
        };
        let lots = self.rng.gen_range(self.config.min_lots.max(1)..=self.config.max_lots.max(1));
        let time_in_force = if self.rng.gen_bool(self.config.ioc_ratio) {
            TimeInForce::IOC
        } else {
            TimeInForce::GTC
        };

        self.sequence += 1;
        self.orders_submitted += 1;
        let id = OrderId::generate(&self.account, self.sequence);
        if time_in_force == TimeInForce::GTC {
            self.resting.push((id.clone(), view.pair.symbol.clone()));
        }
        Tx::NewOrder(NewOrderMsg {
            sender: self.account.clone(),
            id,
            symbol: view.pair.symbol.clone(),
            side,
            price: view.price_at_bps(bps),
            quantity: view.lots(lots),
            time_in_force,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::numeric::{Price, Quantity};
    use types::pair::TradingPair;

    fn pair() -> TradingPair {
        TradingPair::new(
            Symbol::new("XYZ-000_BNB"),
            Price::from_raw(1_000),
            Quantity::from_raw(100_000),
            Price::from_raw(100_000_000),
        )
    }

    fn trader(seed: u64) -> RetailTrader {
        RetailTrader::new(AccountId::new("retail"), RetailTraderConfig::default(), seed)
    }

    #[test]
    fn test_deterministic_output() {
        let pair = pair();
        let view = MarketView::new(&pair, pair.list_price);
        let mut t1 = trader(42);
        let mut t2 = trader(42);
        for _ in 0..50 {
            assert_eq!(t1.next_tx(&view), t2.next_tx(&view));
        }
    }

    #[test]
    fn test_orders_on_grid() {
        let pair = pair();
        let view = MarketView::new(&pair, pair.list_price);
        let mut trader = trader(123);
        for _ in 0..200 {
            if let Tx::NewOrder(msg) = trader.next_tx(&view) {
                assert!(msg.price.is_positive());
                assert!(msg.price.is_multiple_of(pair.tick_size));
                assert!(msg.quantity.is_multiple_of(pair.lot_size));
            }
        }
        assert_eq!(trader.orders_submitted + trader.cancels_submitted, 200);
    }

    #[test]
    fn test_cancels_only_own_resting_orders() {
        let pair = pair();
        let view = MarketView::new(&pair, pair.list_price);
        let config = RetailTraderConfig {
            cancel_ratio: 0.5,
            ioc_ratio: 0.0,
            ..RetailTraderConfig::default()
        };
        let mut trader = RetailTrader::new(AccountId::new("retail"), config, 9);
        let mut placed = Vec::new();
        for _ in 0..100 {
            match trader.next_tx(&view) {
                Tx::NewOrder(msg) => placed.push(msg.id),
                Tx::CancelOrder(msg) => {
                    assert_eq!(msg.sender, trader.account);
                    assert!(placed.contains(&msg.ref_id));
                }
            }
        }
        assert!(trader.cancels_submitted > 0);
    }

    #[test]
    fn test_different_seeds_different_output() {
        let pair = pair();
        let view = MarketView::new(&pair, pair.list_price);
        let mut t1 = trader(1);
        let mut t2 = trader(2);
        let same = (0..10).filter(|_| t1.next_tx(&view) == t2.next_tx(&view)).count();
        assert!(same < 10);
    }
}
