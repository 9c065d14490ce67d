//! Snapshot and replay hooks for the persistence layer
//!
//! Restore loads books and order records from a breathe-block snapshot; block
//! replay goes through `DexKeeper::apply_block` in replay mode, the same path
//! live blocks take, minus ledger settlement.

use std::collections::BTreeMap;

use persistence::{BlockApplier, BookSnapshot, DexState};
use tracing::info;
use types::msg::Block;
use types::order::Side;

use crate::error::KeeperError;
use crate::keeper::DexKeeper;
use crate::ledger::Ledger;

impl<L: Ledger> DexKeeper<L> {
    /// Copy of the consensus state: books, last trade prices and open orders
    pub fn export_dex_state(&self) -> DexState {
        let mut books = BTreeMap::new();
        let mut orders = Vec::new();
        for state in self.registry().symbols() {
            let (buys, sells) = state.engine.book().all_levels();
            books.insert(
                state.symbol().clone(),
                BookSnapshot {
                    buys,
                    sells,
                    last_trade_price: state.engine.last_trade_price(),
                },
            );
            orders.extend(state.orders.values().cloned());
        }
        let mut dex = DexState {
            height: self.height(),
            books,
            orders,
        };
        dex.normalize();
        dex
    }

    /// Replace books and orders with `state`
    ///
    /// Every symbol in the snapshot must already be listed, and every order
    /// resting in a book must have a record.
    pub fn restore_dex_state(&mut self, state: DexState) -> Result<(), KeeperError> {
        let registry = self.registry_mut();
        registry.reset_books();

        let mut resting = 0usize;
        for (symbol, book) in state.books {
            let symbol_state = registry
                .get_mut(&symbol)
                .map_err(|_| KeeperError::Restore(format!("snapshot symbol {symbol} is not listed")))?;
            for (side, levels) in [(Side::BUY, book.buys), (Side::SELL, book.sells)] {
                for level in levels {
                    resting += level.order_count();
                    symbol_state.engine.book_mut().insert_price_level(level, side)?;
                }
            }
            symbol_state.engine.set_last_trade_price(book.last_trade_price);
        }

        let records = state.orders.len();
        for order in state.orders {
            let symbol_state = registry
                .get_mut(&order.symbol)
                .map_err(|_| KeeperError::Restore(format!("order {} on unlisted {}", order.id, order.symbol)))?;
            symbol_state.orders.insert(order.id.clone(), order);
        }
        if resting != records {
            return Err(KeeperError::Restore(format!(
                "{resting} resting orders but {records} order records"
            )));
        }

        self.set_height(state.height);
        info!(height = state.height, orders = records, "Keeper state restored");
        Ok(())
    }
}

impl<L: Ledger> BlockApplier for DexKeeper<L> {
    fn restore(&mut self, state: DexState) -> Result<(), String> {
        self.restore_dex_state(state).map_err(|e| e.to_string())
    }

    fn apply_block(&mut self, block: &Block) -> Result<(), String> {
        let was_replaying = self.is_replaying();
        self.set_replay(true);
        let result = DexKeeper::apply_block(self, block);
        self.set_replay(was_replaying);

        let outcome = result.map_err(|e| e.to_string())?;
        // logged blocks only hold accepted transactions
        if let Some(rejected) = outcome.rejected.first() {
            return Err(format!(
                "logged transaction {} rejected on replay: {}",
                rejected.index, rejected.error
            ));
        }
        Ok(())
    }

    fn export_state(&self) -> DexState {
        self.export_dex_state()
    }
}
