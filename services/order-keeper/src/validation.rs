//! Pre-book order validation
//!
//! Every check that can reject an order runs before it touches the book or
//! the ledger, notional overflow included, so matching never sees an order
//! whose quote amount cannot be represented.

use types::errors::OrderError;
use types::msg::NewOrderMsg;
use types::numeric::notional;
use types::order::Side;
use types::pair::TradingPair;

/// Asset and amount an order must lock while it rests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockAmount {
    pub asset: String,
    pub amount: i64,
}

/// Check price, quantity and increments against the pair's parameters
pub fn validate_order(msg: &NewOrderMsg, pair: &TradingPair) -> Result<(), OrderError> {
    if !msg.price.is_positive() {
        return Err(OrderError::InvalidPrice(format!("price must be positive, got {}", msg.price)));
    }
    if !msg.quantity.is_positive() {
        return Err(OrderError::InvalidQuantity(format!(
            "quantity must be positive, got {}",
            msg.quantity
        )));
    }
    if !msg.price.is_multiple_of(pair.tick_size) {
        return Err(OrderError::TickSizeMismatch {
            price: msg.price.to_string(),
            tick_size: pair.tick_size.to_string(),
        });
    }
    if !msg.quantity.is_multiple_of(pair.lot_size) {
        return Err(OrderError::LotSizeMismatch {
            qty: msg.quantity.to_string(),
            lot_size: pair.lot_size.to_string(),
        });
    }
    let quote = notional(msg.price, msg.quantity)?;
    if quote <= 0 {
        return Err(OrderError::InvalidQuantity(format!(
            "order value rounds to zero: {} at {}",
            msg.quantity, msg.price
        )));
    }
    Ok(())
}

/// Buys lock the quote notional at their limit price, sells lock the base quantity
pub fn lock_amount(msg: &NewOrderMsg, pair: &TradingPair) -> Result<LockAmount, OrderError> {
    Ok(match msg.side {
        Side::BUY => LockAmount {
            asset: pair.quote_asset().to_string(),
            amount: notional(msg.price, msg.quantity)?,
        },
        Side::SELL => LockAmount {
            asset: pair.base_asset().to_string(),
            amount: msg.quantity.raw(),
        },
    })
}
