//! Trading bots
//!
//! Bots never see the book directly. They quote around a reference price
//! (the last trade price the chain reports) on the pair's tick/lot grid and
//! emit transactions for the next block.

pub mod market_maker;
pub mod retail_trader;

use types::numeric::{Price, Quantity};
use types::pair::TradingPair;

/// What a bot knows about one market when building a block
#[derive(Debug, Clone, Copy)]
pub struct MarketView<'a> {
    pub pair: &'a TradingPair,
    pub reference: Price,
}

impl<'a> MarketView<'a> {
    pub fn new(pair: &'a TradingPair, reference: Price) -> Self {
        Self { pair, reference }
    }

    /// Reference moved by `bps` basis points, snapped down to the tick grid
    ///
    /// Never returns less than one tick.
    pub fn price_at_bps(&self, bps: i64) -> Price {
        let tick = self.pair.tick_size.raw().max(1);
        let reference = i128::from(self.reference.raw());
        let moved = reference + reference * i128::from(bps) / 10_000;
        let moved = i64::try_from(moved).unwrap_or(i64::MAX);
        Price::from_raw((moved - moved % tick).max(tick))
    }

    pub fn lots(&self, n: i64) -> Quantity {
        Quantity::from_raw(self.pair.lot_size.raw().saturating_mul(n.max(1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use types::ids::Symbol;

    fn pair() -> TradingPair {
        TradingPair::new(
            Symbol::new("XYZ-000_BNB"),
            Price::from_raw(1_000),
            Quantity::from_raw(100_000),
            Price::from_raw(100_000_000),
        )
    }

    #[test]
    fn test_price_at_bps_snaps_to_tick() {
        let pair = pair();
        let view = MarketView::new(&pair, Price::from_raw(100_000_000));
        assert_eq!(view.price_at_bps(0), Price::from_raw(100_000_000));
        assert_eq!(view.price_at_bps(25), Price::from_raw(100_250_000));
        assert_eq!(view.price_at_bps(-100), Price::from_raw(99_000_000));

        let odd = MarketView::new(&pair, Price::from_raw(100_000_777));
        assert_eq!(odd.price_at_bps(0), Price::from_raw(100_000_000));
    }

    #[test]
    fn test_price_floor_is_one_tick() {
        let pair = pair();
        let view = MarketView::new(&pair, Price::from_raw(1_500));
        assert_eq!(view.price_at_bps(-9_000), Price::from_raw(1_000));
    }

    #[test]
    fn test_lots() {
        let pair = pair();
        let view = MarketView::new(&pair, Price::from_raw(1));
        assert_eq!(view.lots(3), Quantity::from_raw(300_000));
        assert_eq!(view.lots(0), Quantity::from_raw(100_000));
    }

    proptest! {
        #[test]
        fn prop_quotes_stay_on_grid(reference in 1i64..10_000_000_000, bps in -9_999i64..10_000) {
            let pair = pair();
            let price = MarketView::new(&pair, Price::from_raw(reference)).price_at_bps(bps);
            prop_assert!(price.is_multiple_of(pair.tick_size));
            prop_assert!(price.raw() >= pair.tick_size.raw());
        }
    }
}
