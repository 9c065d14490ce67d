//! Market-data feed
//!
//! Each block's trades, depth and order changes are pushed per symbol onto a
//! bounded channel. Publishing never blocks the keeper: when the consumer
//! lags, new events are dropped and counted.

use std::collections::{BTreeMap, VecDeque};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};

use matching_engine::BookDepth;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use types::ids::Symbol;
use types::order::OrderChange;
use types::trade::Trade;

/// Trades kept per symbol for `recent_trades`
pub const RECENT_TRADES_CAPACITY: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEvent {
    pub height: i64,
    pub timestamp: i64,
    pub symbol: Symbol,
    pub trades: Vec<Trade>,
    pub depth: BookDepth,
    pub changes: Vec<OrderChange>,
}

#[derive(Debug)]
pub struct Publisher {
    sender: Option<SyncSender<MarketEvent>>,
    recent: BTreeMap<Symbol, VecDeque<Trade>>,
    published: u64,
    dropped: u64,
}

impl Publisher {
    /// Feed with room for `capacity` undelivered events
    pub fn new(capacity: usize) -> (Self, Receiver<MarketEvent>) {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        (Self::with_sender(Some(tx)), rx)
    }

    /// Feed that only keeps the recent-trades history
    pub fn disabled() -> Self {
        Self::with_sender(None)
    }

    fn with_sender(sender: Option<SyncSender<MarketEvent>>) -> Self {
        Self {
            sender,
            recent: BTreeMap::new(),
            published: 0,
            dropped: 0,
        }
    }

    pub fn publish(&mut self, event: MarketEvent) {
        let history = self.recent.entry(event.symbol.clone()).or_default();
        for trade in &event.trades {
            if history.len() >= RECENT_TRADES_CAPACITY {
                history.pop_front();
            }
            history.push_back(trade.clone());
        }

        let Some(sender) = &self.sender else {
            return;
        };
        match sender.try_send(event) {
            Ok(()) => self.published += 1,
            Err(TrySendError::Full(event)) => {
                self.dropped += 1;
                warn!(
                    symbol = %event.symbol,
                    height = event.height,
                    dropped = self.dropped,
                    "Market-data consumer lagging, event dropped"
                );
            }
            Err(TrySendError::Disconnected(_)) => {
                debug!("Market-data consumer gone, feed disabled");
                self.sender = None;
            }
        }
    }

    /// Latest trades for `symbol`, oldest first
    pub fn recent_trades(&self, symbol: &Symbol) -> Vec<Trade> {
        self.recent
            .get(symbol)
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn published(&self) -> u64 {
        self.published
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn is_connected(&self) -> bool {
        self.sender.is_some()
    }
}

impl Default for Publisher {
    fn default() -> Self {
        Self::disabled()
    }
}
