//! Error types shared across the exchange
//!
//! Validation and ledger failures are recoverable per order and surface to the
//! submitter. Structural failures live in the crates that detect them.

use crate::numeric::NumericError;
use thiserror::Error;

/// Order validation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Price {price} is not a multiple of tick size {tick_size}")]
    TickSizeMismatch { price: String, tick_size: String },

    #[error("Quantity {qty} is not a multiple of lot size {lot_size}")]
    LotSizeMismatch { qty: String, lot_size: String },

    #[error("Notional overflow: {0}")]
    Overflow(#[from] NumericError),

    #[error("Duplicate order id: {order_id}")]
    DuplicateId { order_id: String },

    #[error("Order {order_id} does not belong to {sender}")]
    NotOwner { order_id: String, sender: String },

    #[error("Insufficient funds: {0}")]
    InsufficientFunds(#[from] LedgerError),
}

/// Account balance errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Insufficient balance for {account} in {asset}: required {required}, available {available}")]
    InsufficientBalance {
        account: String,
        asset: String,
        required: i64,
        available: i64,
    },

    #[error("Locked balance underflow for {account} in {asset}: unlocking {amount}, locked {locked}")]
    LockedUnderflow {
        account: String,
        asset: String,
        amount: i64,
        locked: i64,
    },

    #[error("Balance overflow for {account} in {asset}")]
    Overflow { account: String, asset: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_error_display() {
        let err = OrderError::InvalidPrice("negative".to_string());
        assert_eq!(err.to_string(), "Invalid price: negative");
    }

    #[test]
    fn test_ledger_error_converts_to_order_error() {
        let err = LedgerError::InsufficientBalance {
            account: "bnb1a".to_string(),
            asset: "BNB".to_string(),
            required: 15,
            available: 10,
        };
        let order_err: OrderError = err.into();
        assert!(matches!(order_err, OrderError::InsufficientFunds(_)));
        assert!(order_err.to_string().contains("BNB"));
    }

    #[test]
    fn test_overflow_from_numeric() {
        let err: OrderError = NumericError::NotionalOverflow { price: 1, qty: 2 }.into();
        assert!(matches!(err, OrderError::Overflow(_)));
    }
}
