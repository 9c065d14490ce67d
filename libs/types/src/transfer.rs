//! Settlement instructions
//!
//! A `Transfer` describes how one order's account balances move: `in_qty` of
//! `in_asset` is credited, `out_qty` of `out_asset` is debited from the locked
//! balance, and `unlock_qty` of `out_asset` leaves the locked balance. Any
//! unlocked amount not paid out returns to the free balance.

use crate::fee::Fee;
use crate::ids::{AccountId, OrderId, Symbol};
use serde::{Deserialize, Serialize};

/// Why a transfer was produced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferEvent {
    Filled,
    FullyExpire,
    PartiallyExpire,
    IocFullyExpire,
    IocPartiallyExpire,
    FullyCancel,
    PartiallyCancel,
    CancelForMatchFailure,
}

impl TransferEvent {
    /// Removals that never pay a fee
    pub fn fee_free(&self) -> bool {
        matches!(
            self,
            TransferEvent::PartiallyExpire
                | TransferEvent::IocPartiallyExpire
                | TransferEvent::PartiallyCancel
                | TransferEvent::CancelForMatchFailure
        )
    }

    pub fn is_expire(&self) -> bool {
        matches!(
            self,
            TransferEvent::FullyExpire
                | TransferEvent::PartiallyExpire
                | TransferEvent::IocFullyExpire
                | TransferEvent::IocPartiallyExpire
        )
    }

    pub fn is_expired_with_fee(&self) -> bool {
        matches!(self, TransferEvent::FullyExpire | TransferEvent::IocFullyExpire)
    }

    pub fn is_cancel(&self) -> bool {
        matches!(
            self,
            TransferEvent::FullyCancel
                | TransferEvent::PartiallyCancel
                | TransferEvent::CancelForMatchFailure
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub order_id: OrderId,
    pub event: TransferEvent,
    pub account: AccountId,
    pub symbol: Symbol,
    pub in_asset: String,
    pub in_qty: i64,
    pub out_asset: String,
    pub out_qty: i64,
    pub unlock_qty: i64,
    pub fee: Fee,
}

impl Transfer {
    pub fn fee_free(&self) -> bool {
        self.event.fee_free()
    }

    pub fn is_expire(&self) -> bool {
        self.event.is_expire()
    }

    pub fn is_expired_with_fee(&self) -> bool {
        self.event.is_expired_with_fee()
    }

    /// Canonical settlement order within one account
    pub fn sort_key(&self) -> (&Symbol, &OrderId) {
        (&self.symbol, &self.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_classification() {
        assert!(TransferEvent::CancelForMatchFailure.fee_free());
        assert!(TransferEvent::PartiallyCancel.fee_free());
        assert!(!TransferEvent::FullyCancel.fee_free());
        assert!(!TransferEvent::Filled.fee_free());

        assert!(TransferEvent::IocPartiallyExpire.is_expire());
        assert!(!TransferEvent::FullyCancel.is_expire());

        assert!(TransferEvent::FullyExpire.is_expired_with_fee());
        assert!(TransferEvent::IocFullyExpire.is_expired_with_fee());
        assert!(!TransferEvent::PartiallyExpire.is_expired_with_fee());

        assert!(TransferEvent::CancelForMatchFailure.is_cancel());
    }
}
