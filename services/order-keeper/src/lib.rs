//! Order Keeper Service
//!
//! Owns the order registry for every listed pair and drives each block:
//! validation and fund locking on entry, a parallel matching round across
//! pending symbols, sharded settlement of the resulting transfers, fee
//! collection, breathe-block expiry and the market-data feed.
//!
//! **Key Invariants:**
//! - A symbol's book is touched by one thread at a time
//! - All transfers for an account settle on one shard, in send order
//! - Shard count changes parallelism, never balances or fees
//! - A failed match cancels that symbol's new orders and nothing else
//! - Replay runs the live code paths without the ledger

pub mod config;
pub mod error;
pub mod fees;
pub mod keeper;
pub mod ledger;
pub mod publisher;
pub mod recovery;
pub mod registry;
pub mod round;
pub mod settlement;
pub mod transfer;
pub mod validation;

pub use config::KeeperConfig;
pub use error::KeeperError;
pub use fees::{FeeCalculator, FeePool};
pub use keeper::{BlockOutcome, DexKeeper, RejectedTx, RoundReport};
pub use ledger::{Balance, InMemoryLedger, Ledger};
pub use publisher::{MarketEvent, Publisher};
pub use round::SymbolOutcome;
pub use settlement::{settle, shard_of, SettlementFailure, SettlementReport, ShardRouter};
