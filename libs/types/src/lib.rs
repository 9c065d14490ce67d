//! Types library for the call-auction exchange
//!
//! This library provides the core type definitions shared by the matching
//! engine, the order keeper and persistence. Everything that takes part in
//! consensus state is integer-valued so that every replica derives the same
//! bytes.
//!
//! # Modules
//! - `ids`: Identifiers (OrderId, AccountId, Symbol)
//! - `numeric`: Fixed-point integer types (Price, Quantity) at scale 1e8
//! - `order`: Order records, sides and time-in-force
//! - `msg`: Block and transaction messages
//! - `trade`: Trade execution types
//! - `transfer`: Settlement instructions
//! - `fee`: Fee schedule and fee amounts
//! - `pair`: Trading pair parameters
//! - `errors`: Error taxonomy

pub mod ids;
pub mod numeric;
pub mod order;
pub mod msg;
pub mod trade;
pub mod transfer;
pub mod fee;
pub mod pair;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::order::*;
    pub use crate::msg::*;
    pub use crate::trade::*;
    pub use crate::transfer::*;
    pub use crate::fee::*;
    pub use crate::pair::*;
    pub use crate::errors::*;
}
