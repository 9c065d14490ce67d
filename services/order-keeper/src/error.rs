//! Keeper error taxonomy
//!
//! Validation and ledger errors reject a single transaction. Matching
//! errors never surface here: they are handled per symbol by the round.

use matching_engine::BookError;
use thiserror::Error;
use types::errors::{LedgerError, OrderError};
use types::numeric::NumericError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeeperError {
    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Book(#[from] BookError),

    #[error(transparent)]
    Numeric(#[from] NumericError),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Trading pair already listed: {0}")]
    AlreadyListed(String),

    #[error("Block {got} does not follow height {current}")]
    HeightOutOfOrder { current: i64, got: i64 },

    #[error("Invalid config: {0}")]
    Config(String),

    #[error("Restore failed: {0}")]
    Restore(String),
}
