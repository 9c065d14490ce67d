//! Order registry
//!
//! One `SymbolState` per listed pair owns that pair's engine and its order
//! records. A symbol's state is only ever handed to one matching worker at a
//! time, which is what keeps the book single-threaded.

use std::collections::BTreeMap;

use matching_engine::{EngineConfig, MatchEngine};
use types::ids::{OrderId, Symbol};
use types::order::{OrderInfo, TimeInForce};
use types::pair::TradingPair;

use crate::error::KeeperError;

#[derive(Debug, Clone)]
pub struct SymbolState {
    pub pair: TradingPair,
    pub engine: MatchEngine,
    pub orders: BTreeMap<OrderId, OrderInfo>,
    /// Orders added since the last match, in arrival order
    pub round_orders: Vec<OrderId>,
    pub round_ioc: Vec<OrderId>,
}

impl SymbolState {
    pub fn new(pair: TradingPair, price_limit_bps: i64) -> Self {
        let config = EngineConfig {
            lot_size: pair.lot_size,
            price_limit_bps,
        };
        let engine = MatchEngine::new(config, pair.list_price);
        Self {
            pair,
            engine,
            orders: BTreeMap::new(),
            round_orders: Vec::new(),
            round_ioc: Vec::new(),
        }
    }

    pub fn symbol(&self) -> &Symbol {
        &self.pair.symbol
    }

    pub fn has_round_orders(&self) -> bool {
        !self.round_orders.is_empty()
    }

    /// Put a validated order in the book and the record map
    pub fn add_order(&mut self, order: OrderInfo) -> Result<(), KeeperError> {
        self.engine.book_mut().insert_order(
            order.id.clone(),
            order.side,
            order.created_height,
            order.price,
            order.quantity,
        )?;
        self.round_orders.push(order.id.clone());
        if order.time_in_force == TimeInForce::IOC {
            self.round_ioc.push(order.id.clone());
        }
        self.orders.insert(order.id.clone(), order);
        Ok(())
    }

    /// Take an order out of the book and the record map
    ///
    /// The returned record carries the fills committed so far.
    pub fn remove_order(&mut self, id: &OrderId) -> Result<OrderInfo, KeeperError> {
        let order = self
            .orders
            .get(id)
            .ok_or_else(|| KeeperError::OrderNotFound(id.to_string()))?;
        self.engine.book_mut().remove_order(id, order.side, order.price)?;
        self.orders
            .remove(id)
            .ok_or_else(|| KeeperError::OrderNotFound(id.to_string()))
    }

    pub fn clear_round(&mut self) {
        self.round_orders.clear();
        self.round_ioc.clear();
    }
}

/// Listed pairs and their open orders
#[derive(Debug, Clone, Default)]
pub struct Registry {
    symbols: BTreeMap<Symbol, SymbolState>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_pair(&mut self, pair: TradingPair, price_limit_bps: i64) -> Result<(), KeeperError> {
        if self.symbols.contains_key(&pair.symbol) {
            return Err(KeeperError::AlreadyListed(pair.symbol.to_string()));
        }
        self.symbols
            .insert(pair.symbol.clone(), SymbolState::new(pair, price_limit_bps));
        Ok(())
    }

    pub fn get(&self, symbol: &Symbol) -> Result<&SymbolState, KeeperError> {
        self.symbols
            .get(symbol)
            .ok_or_else(|| KeeperError::UnknownSymbol(symbol.to_string()))
    }

    pub fn get_mut(&mut self, symbol: &Symbol) -> Result<&mut SymbolState, KeeperError> {
        self.symbols
            .get_mut(symbol)
            .ok_or_else(|| KeeperError::UnknownSymbol(symbol.to_string()))
    }

    pub fn symbols(&self) -> impl Iterator<Item = &SymbolState> {
        self.symbols.values()
    }

    pub fn symbols_mut(&mut self) -> impl Iterator<Item = &mut SymbolState> {
        self.symbols.values_mut()
    }

    /// Order ids are unique across every symbol
    pub fn contains_order(&self, id: &OrderId) -> bool {
        self.symbols.values().any(|s| s.orders.contains_key(id))
    }

    pub fn find_order(&self, id: &OrderId) -> Option<&OrderInfo> {
        self.symbols.values().find_map(|s| s.orders.get(id))
    }

    pub fn order_count(&self) -> usize {
        self.symbols.values().map(|s| s.orders.len()).sum()
    }

    /// Symbols with orders added since their last match
    pub fn pending_mut(&mut self) -> Vec<&mut SymbolState> {
        self.symbols.values_mut().filter(|s| s.has_round_orders()).collect()
    }

    /// Drop every book, order and round list, keeping the listings
    pub fn reset_books(&mut self) {
        for state in self.symbols.values_mut() {
            state.engine.book_mut().clear();
            state.engine.set_last_trade_price(state.pair.list_price);
            state.orders.clear();
            state.clear_round();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::AccountId;
    use types::numeric::{Price, Quantity};
    use types::order::Side;

    fn pair(symbol: &str) -> TradingPair {
        TradingPair::new(
            Symbol::new(symbol),
            Price::from_raw(1),
            Quantity::from_raw(1),
            Price::from_raw(100),
        )
    }

    fn order(id: &str, symbol: &str, tif: TimeInForce) -> OrderInfo {
        OrderInfo::new(
            OrderId::new(id),
            AccountId::new("bnb1a"),
            Symbol::new(symbol),
            Side::BUY,
            Price::from_raw(100),
            Quantity::from_raw(10),
            tif,
            3,
            0,
        )
    }

    #[test]
    fn test_list_pair_once() {
        let mut registry = Registry::new();
        registry.list_pair(pair("AAA_BNB"), 500).unwrap();
        assert!(matches!(
            registry.list_pair(pair("AAA_BNB"), 500),
            Err(KeeperError::AlreadyListed(_))
        ));
        assert!(matches!(
            registry.get(&Symbol::new("BBB_BNB")),
            Err(KeeperError::UnknownSymbol(_))
        ));
    }

    #[test]
    fn test_add_and_remove_order() {
        let mut registry = Registry::new();
        registry.list_pair(pair("AAA_BNB"), 500).unwrap();
        registry.list_pair(pair("BBB_BNB"), 500).unwrap();

        let state = registry.get_mut(&Symbol::new("AAA_BNB")).unwrap();
        state.add_order(order("o-1", "AAA_BNB", TimeInForce::GTC)).unwrap();
        state.add_order(order("o-2", "AAA_BNB", TimeInForce::IOC)).unwrap();
        assert_eq!(state.round_orders.len(), 2);
        assert_eq!(state.round_ioc, vec![OrderId::new("o-2")]);

        assert!(registry.contains_order(&OrderId::new("o-1")));
        assert_eq!(registry.pending_mut().len(), 1);

        let state = registry.get_mut(&Symbol::new("AAA_BNB")).unwrap();
        let removed = state.remove_order(&OrderId::new("o-1")).unwrap();
        assert_eq!(removed.id, OrderId::new("o-1"));
        assert!(matches!(
            state.remove_order(&OrderId::new("o-1")),
            Err(KeeperError::OrderNotFound(_))
        ));
        assert_eq!(state.engine.book().level_count(Side::BUY), 1);
        assert_eq!(registry.order_count(), 1);
    }

    #[test]
    fn test_reset_books_keeps_listings() {
        let mut registry = Registry::new();
        registry.list_pair(pair("AAA_BNB"), 500).unwrap();
        let state = registry.get_mut(&Symbol::new("AAA_BNB")).unwrap();
        state.add_order(order("o-1", "AAA_BNB", TimeInForce::GTC)).unwrap();
        state.engine.set_last_trade_price(Price::from_raw(120));

        registry.reset_books();
        let state = registry.get(&Symbol::new("AAA_BNB")).unwrap();
        assert!(state.engine.book().is_empty());
        assert!(state.orders.is_empty());
        assert_eq!(state.engine.last_trade_price(), Price::from_raw(100));
    }
}
