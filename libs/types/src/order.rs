//! Order records
//!
//! `OrderInfo` is the keeper's full view of a resting order. The matching
//! engine only sees the slimmer `OrderPart` (id, entry height, quantities).

use crate::ids::{AccountId, OrderId, Symbol};
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// Order side (buyer or seller)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    /// Buy order (bid)
    BUY,
    /// Sell order (ask)
    SELL,
}

impl Side {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            Side::BUY => Side::SELL,
            Side::SELL => Side::BUY,
        }
    }
}

/// Time-in-force policy for orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good-Till-Cancel: rests until filled, canceled or expired by height
    GTC,
    /// Immediate-Or-Cancel: unfilled remainder is removed after the round
    IOC,
}

/// Order state changes reported alongside trades
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Ack,
    Canceled,
    Expired,
    IocNoFill,
    IocExpire,
    PartiallyFilled,
    FullyFilled,
    FailedBlocking,
    FailedMatching,
}

/// One entry in a round's order change list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderChange {
    pub id: OrderId,
    pub kind: ChangeKind,
}

impl OrderChange {
    pub fn new(id: OrderId, kind: ChangeKind) -> Self {
        Self { id, kind }
    }
}

/// Complete order record kept by the order registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInfo {
    pub id: OrderId,
    pub sender: AccountId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub cum_qty: Quantity,
    pub time_in_force: TimeInForce,
    pub created_height: i64,
    pub created_timestamp: i64,
    pub last_updated_height: i64,
    pub last_updated_timestamp: i64,
}

impl OrderInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: OrderId,
        sender: AccountId,
        symbol: Symbol,
        side: Side,
        price: Price,
        quantity: Quantity,
        time_in_force: TimeInForce,
        height: i64,
        timestamp: i64,
    ) -> Self {
        Self {
            id,
            sender,
            symbol,
            side,
            price,
            quantity,
            cum_qty: Quantity::ZERO,
            time_in_force,
            created_height: height,
            created_timestamp: timestamp,
            last_updated_height: height,
            last_updated_timestamp: timestamp,
        }
    }

    /// Unfilled quantity, never negative
    pub fn leaves_qty(&self) -> Quantity {
        if self.cum_qty >= self.quantity {
            Quantity::ZERO
        } else {
            self.quantity - self.cum_qty
        }
    }

    pub fn is_filled(&self) -> bool {
        self.leaves_qty().is_zero()
    }

    pub fn has_fills(&self) -> bool {
        self.cum_qty.is_positive()
    }

    pub fn is_ioc(&self) -> bool {
        self.time_in_force == TimeInForce::IOC
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(side: Side) -> OrderInfo {
        OrderInfo::new(
            OrderId::new("bnb1a-1"),
            AccountId::new("bnb1a"),
            Symbol::new("XYZ-000_BNB"),
            side,
            Price::from_raw(100),
            Quantity::from_raw(50),
            TimeInForce::GTC,
            10,
            1_000,
        )
    }

    #[test]
    fn test_side_opposite() {
        assert_eq!(Side::BUY.opposite(), Side::SELL);
        assert_eq!(Side::SELL.opposite(), Side::BUY);
    }

    #[test]
    fn test_leaves_qty() {
        let mut order = sample(Side::BUY);
        assert_eq!(order.leaves_qty(), Quantity::from_raw(50));
        assert!(!order.has_fills());

        order.cum_qty = Quantity::from_raw(20);
        assert_eq!(order.leaves_qty(), Quantity::from_raw(30));
        assert!(order.has_fills());

        order.cum_qty = Quantity::from_raw(60);
        assert_eq!(order.leaves_qty(), Quantity::ZERO);
        assert!(order.is_filled());
    }

    #[test]
    fn test_order_serialization() {
        let order = sample(Side::SELL);
        let json = serde_json::to_string(&order).unwrap();
        assert!(json.contains("\"SELL\""));
        assert!(json.contains("\"GTC\""));
        let back: OrderInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(order, back);
    }
}
