//! Market maker bot: ladder quoting with inventory skew
//!
//! Every block the maker cancels its previous ladder and posts a fresh one
//! around the reference price. Fills are learned from the settlement report,
//! and a long position shifts both sides of the ladder down (short: up).

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use types::ids::{AccountId, OrderId};
use types::msg::{CancelOrderMsg, NewOrderMsg, Tx};
use types::numeric::Price;
use types::order::{Side, TimeInForce};
use types::transfer::{Transfer, TransferEvent};

use super::MarketView;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketMakerConfig {
    /// Distance of the innermost quotes from the reference, in basis points
    pub spread_bps: i64,
    /// Extra distance per ladder step
    pub step_bps: i64,
    /// Quotes per side
    pub levels: usize,
    /// Lots per quote; each quote varies by up to this much again
    pub order_lots: i64,
    /// Net base position, in lots, at which skew reaches a full spread
    pub max_inventory_lots: i64,
}

impl Default for MarketMakerConfig {
    fn default() -> Self {
        Self {
            spread_bps: 10,
            step_bps: 5,
            levels: 3,
            order_lots: 10,
            max_inventory_lots: 200,
        }
    }
}

pub struct MarketMaker {
    pub account: AccountId,
    pub config: MarketMakerConfig,
    /// Net base received minus base delivered, raw units
    pub net_inventory: i64,
    pub orders_placed: u64,
    live: Vec<OrderId>,
    sequence: u64,
    rng: ChaCha8Rng,
}

impl MarketMaker {
    pub fn new(account: AccountId, config: MarketMakerConfig, seed: u64) -> Self {
        Self {
            account,
            config,
            net_inventory: 0,
            orders_placed: 0,
            live: Vec::new(),
            sequence: 0,
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }

    /// Skew in basis points, positive when long
    fn inventory_skew_bps(&self, view: &MarketView<'_>) -> i64 {
        let max = i128::from(view.lots(self.config.max_inventory_lots).raw());
        let skew = i128::from(self.net_inventory) * i128::from(self.config.spread_bps) / max;
        let bound = i128::from(self.config.spread_bps);
        skew.clamp(-bound, bound) as i64
    }

    /// Cancel the previous ladder and quote a new one
    pub fn quote(&mut self, view: &MarketView<'_>) -> Vec<Tx> {
        let mut txs: Vec<Tx> = self
            .live
            .drain(..)
            .map(|ref_id| {
                Tx::CancelOrder(CancelOrderMsg {
                    sender: self.account.clone(),
                    symbol: view.pair.symbol.clone(),
                    ref_id,
                })
            })
            .collect();

        let skew = self.inventory_skew_bps(view);
        for level in 0..self.config.levels {
            let distance = self.config.spread_bps + self.config.step_bps * level as i64;
            for (side, bps) in [(Side::BUY, -distance - skew), (Side::SELL, distance - skew)] {
                let lots = self.config.order_lots + self.rng.gen_range(0..=self.config.order_lots);
                let tx = self.new_order(view, side, view.price_at_bps(bps), lots);
                txs.push(tx);
            }
        }
        txs
    }

    fn new_order(&mut self, view: &MarketView<'_>, side: Side, price: Price, lots: i64) -> Tx {
        self.sequence += 1;
        self.orders_placed += 1;
        let id = OrderId::generate(&self.account, self.sequence);
        self.live.push(id.clone());
        Tx::NewOrder(NewOrderMsg {
            sender: self.account.clone(),
            id,
            symbol: view.pair.symbol.clone(),
            side,
            price,
            quantity: view.lots(lots),
            time_in_force: TimeInForce::GTC,
        })
    }

    /// Update inventory from settled fills of this maker's orders
    pub fn observe(&mut self, base_asset: &str, transfers: &[Transfer]) {
        for t in transfers {
            if t.account != self.account || t.event != TransferEvent::Filled {
                continue;
            }
            if t.in_asset == base_asset {
                self.net_inventory += t.in_qty;
            } else if t.out_asset == base_asset {
                self.net_inventory -= t.out_qty;
            }
        }
    }

    pub fn live_orders(&self) -> &[OrderId] {
        &self.live
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::fee::Fee;
    use types::ids::Symbol;
    use types::numeric::Quantity;
    use types::pair::TradingPair;

    fn pair() -> TradingPair {
        TradingPair::new(
            Symbol::new("XYZ-000_BNB"),
            Price::from_raw(1_000),
            Quantity::from_raw(100_000),
            Price::from_raw(100_000_000),
        )
    }

    fn orders(txs: &[Tx]) -> Vec<&NewOrderMsg> {
        txs.iter()
            .filter_map(|tx| match tx {
                Tx::NewOrder(msg) => Some(msg),
                Tx::CancelOrder(_) => None,
            })
            .collect()
    }

    #[test]
    fn test_ladder_brackets_reference() {
        let pair = pair();
        let view = MarketView::new(&pair, Price::from_raw(100_000_000));
        let mut mm = MarketMaker::new(AccountId::new("mm"), MarketMakerConfig::default(), 7);
        let txs = mm.quote(&view);
        let placed = orders(&txs);
        assert_eq!(placed.len(), 6);
        for msg in placed {
            match msg.side {
                Side::BUY => assert!(msg.price < view.reference),
                Side::SELL => assert!(msg.price > view.reference),
            }
            assert!(msg.quantity.raw() % pair.lot_size.raw() == 0);
        }
    }

    #[test]
    fn test_requote_cancels_previous_ladder() {
        let pair = pair();
        let view = MarketView::new(&pair, Price::from_raw(100_000_000));
        let mut mm = MarketMaker::new(AccountId::new("mm"), MarketMakerConfig::default(), 7);
        let first: Vec<OrderId> = orders(&mm.quote(&view)).iter().map(|m| m.id.clone()).collect();

        let second = mm.quote(&view);
        let canceled: Vec<OrderId> = second
            .iter()
            .filter_map(|tx| match tx {
                Tx::CancelOrder(msg) => Some(msg.ref_id.clone()),
                Tx::NewOrder(_) => None,
            })
            .collect();
        assert_eq!(canceled, first);
        assert_eq!(mm.live_orders().len(), 6);
    }

    #[test]
    fn test_long_inventory_skews_quotes_down() {
        let pair = pair();
        let view = MarketView::new(&pair, Price::from_raw(100_000_000));
        let config = MarketMakerConfig {
            levels: 1,
            ..MarketMakerConfig::default()
        };
        let mut flat = MarketMaker::new(AccountId::new("mm"), config.clone(), 1);
        let mut long = MarketMaker::new(AccountId::new("mm"), config, 1);
        long.observe(
            "XYZ-000",
            &[Transfer {
                order_id: OrderId::new("mm-1"),
                event: TransferEvent::Filled,
                account: AccountId::new("mm"),
                symbol: pair.symbol.clone(),
                in_asset: "XYZ-000".into(),
                in_qty: 100_000_000,
                out_asset: "BNB".into(),
                out_qty: 100_000_000,
                unlock_qty: 100_000_000,
                fee: Fee::new(),
            }],
        );
        assert_eq!(long.net_inventory, 100_000_000);

        let flat_bid = orders(&flat.quote(&view))[0].price;
        let long_bid = orders(&long.quote(&view))[0].price;
        assert!(long_bid < flat_bid);
    }
}
