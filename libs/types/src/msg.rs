//! Transaction and block messages
//!
//! A block is the unit the keeper executes and the write-ahead log records.
//! Transactions are applied strictly in block order.

use crate::ids::{AccountId, OrderId, Symbol};
use crate::numeric::{Price, Quantity};
use crate::order::{Side, TimeInForce};
use serde::{Deserialize, Serialize};

/// Request to place a limit order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewOrderMsg {
    pub sender: AccountId,
    pub id: OrderId,
    pub symbol: Symbol,
    pub side: Side,
    pub price: Price,
    pub quantity: Quantity,
    pub time_in_force: TimeInForce,
}

/// Request to cancel a resting order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelOrderMsg {
    pub sender: AccountId,
    pub symbol: Symbol,
    pub ref_id: OrderId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tx {
    NewOrder(NewOrderMsg),
    CancelOrder(CancelOrderMsg),
}

/// All transactions committed at one height
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: i64,
    pub timestamp: i64,
    pub txs: Vec<Tx>,
}

impl Block {
    pub fn new(height: i64, timestamp: i64, txs: Vec<Tx>) -> Self {
        Self {
            height,
            timestamp,
            txs,
        }
    }
}
