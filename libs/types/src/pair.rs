//! Trading pair parameters

use crate::ids::Symbol;
use crate::numeric::{Price, Quantity};
use serde::{Deserialize, Serialize};

/// A listed symbol with its tick and lot increments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingPair {
    pub symbol: Symbol,
    pub tick_size: Price,
    pub lot_size: Quantity,
    /// Reference price used until the first trade
    pub list_price: Price,
}

impl TradingPair {
    pub fn new(symbol: Symbol, tick_size: Price, lot_size: Quantity, list_price: Price) -> Self {
        Self {
            symbol,
            tick_size,
            lot_size,
            list_price,
        }
    }

    pub fn base_asset(&self) -> &str {
        self.symbol.base_asset()
    }

    pub fn quote_asset(&self) -> &str {
        self.symbol.quote_asset()
    }
}
