//! Trade execution types

use crate::ids::OrderId;
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Which side consumed liquidity in a trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TickType {
    /// Produced by the sequential regime, which does not classify
    #[default]
    Unknown,
    /// Sell side rested, buy side took
    BuyTaker,
    /// Buy side rested, sell side took
    SellTaker,
    /// Neither side had resting orders in the crossed range
    Neutral,
}

/// One execution between a buy and a sell order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Buy order id
    pub bid: OrderId,
    /// Sell order id
    pub sid: OrderId,
    pub price: Price,
    pub qty: Quantity,
    /// Buy order cumulative filled quantity after this trade
    pub buy_cum_qty: Quantity,
    /// Sell order cumulative filled quantity after this trade
    pub sell_cum_qty: Quantity,
    pub tick_type: TickType,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trade_serialization() {
        let trade = Trade {
            bid: OrderId::new("b-1"),
            sid: OrderId::new("s-1"),
            price: Price::from_raw(104),
            qty: Quantity::from_raw(10),
            buy_cum_qty: Quantity::from_raw(10),
            sell_cum_qty: Quantity::from_raw(30),
            tick_type: TickType::BuyTaker,
        };
        let json = serde_json::to_string(&trade).unwrap();
        assert!(json.contains("BUY_TAKER"));
        let back: Trade = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, back);
    }
}
