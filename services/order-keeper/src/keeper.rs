//! DEX keeper
//!
//! Executes blocks: transactions are applied in order (add locks funds,
//! cancel settles synchronously), then one matching round runs across every
//! symbol that received orders, followed by the breathe-block expiry sweep
//! when the height calls for it.
//!
//! In replay mode the same paths run without touching the ledger, so a
//! restarted node rebuilds its books from logged blocks alone.

use std::collections::BTreeMap;

use matching_engine::BookDepth;
use tracing::{debug, error, info, warn};
use types::errors::OrderError;
use types::ids::{AccountId, OrderId, Symbol};
use types::msg::{Block, CancelOrderMsg, NewOrderMsg, Tx};
use types::numeric::Price;
use types::order::{ChangeKind, OrderChange, OrderInfo};
use types::pair::TradingPair;

use crate::config::KeeperConfig;
use crate::error::KeeperError;
use crate::fees::{FeeCalculator, FeePool};
use crate::ledger::Ledger;
use crate::publisher::{MarketEvent, Publisher};
use crate::registry::Registry;
use crate::round::{self, RoundContext, SymbolOutcome};
use crate::settlement::{self, SettlementReport, ShardRouter};
use crate::transfer;
use crate::validation;

/// A transaction the keeper refused
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedTx {
    pub index: usize,
    pub tx: Tx,
    pub error: KeeperError,
}

/// Result of the end-of-block round
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoundReport {
    pub height: i64,
    pub outcomes: Vec<SymbolOutcome>,
    pub settlement: SettlementReport,
    /// Orders removed by the breathe-block sweep, by symbol
    pub expired: BTreeMap<Symbol, Vec<OrderChange>>,
    pub expiry_settlement: Option<SettlementReport>,
}

impl RoundReport {
    pub fn trade_count(&self) -> usize {
        self.outcomes.iter().map(|o| o.trades.len()).sum()
    }

    pub fn failed_symbols(&self) -> Vec<&Symbol> {
        self.outcomes.iter().filter(|o| o.failed).map(|o| &o.symbol).collect()
    }
}

/// Result of executing one block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockOutcome {
    /// The block restricted to accepted transactions, as it must be logged
    pub accepted: Block,
    pub rejected: Vec<RejectedTx>,
    pub round: RoundReport,
}

pub struct DexKeeper<L: Ledger> {
    config: KeeperConfig,
    ledger: L,
    registry: Registry,
    fee_calc: FeeCalculator,
    fee_pool: FeePool,
    publisher: Publisher,
    height: i64,
    timestamp: i64,
    replaying: bool,
    block_changes: BTreeMap<Symbol, Vec<OrderChange>>,
}

impl<L: Ledger> DexKeeper<L> {
    pub fn new(config: KeeperConfig, ledger: L) -> Result<Self, KeeperError> {
        config.validate()?;
        let fee_calc = FeeCalculator::new(config.fees.clone());
        Ok(Self {
            config,
            ledger,
            registry: Registry::new(),
            fee_calc,
            fee_pool: FeePool::new(),
            publisher: Publisher::disabled(),
            height: 0,
            timestamp: 0,
            replaying: false,
            block_changes: BTreeMap::new(),
        })
    }

    pub fn with_publisher(mut self, publisher: Publisher) -> Self {
        self.publisher = publisher;
        self
    }

    pub fn list_pair(&mut self, pair: TradingPair) -> Result<(), KeeperError> {
        info!(symbol = %pair.symbol, tick = %pair.tick_size, lot = %pair.lot_size, "Listing trading pair");
        self.registry.list_pair(pair, self.config.price_limit_bps)
    }

    pub fn begin_block(&mut self, height: i64, timestamp: i64) -> Result<(), KeeperError> {
        if height <= self.height {
            return Err(KeeperError::HeightOutOfOrder {
                current: self.height,
                got: height,
            });
        }
        self.height = height;
        self.timestamp = timestamp;
        self.block_changes.clear();
        Ok(())
    }

    /// Validate, lock funds and rest a new order
    pub fn add_order(&mut self, msg: &NewOrderMsg) -> Result<(), KeeperError> {
        let pair = &self.registry.get(&msg.symbol)?.pair;
        validation::validate_order(msg, pair)?;
        if self.registry.contains_order(&msg.id) {
            return Err(OrderError::DuplicateId {
                order_id: msg.id.to_string(),
            }
            .into());
        }
        let lock = validation::lock_amount(msg, pair)?;

        if !self.replaying {
            self.ledger
                .lock_funds(&msg.sender, &lock.asset, lock.amount)
                .map_err(OrderError::from)?;
        }

        let order = OrderInfo::new(
            msg.id.clone(),
            msg.sender.clone(),
            msg.symbol.clone(),
            msg.side,
            msg.price,
            msg.quantity,
            msg.time_in_force,
            self.height,
            self.timestamp,
        );
        if let Err(err) = self.registry.get_mut(&msg.symbol)?.add_order(order) {
            if !self.replaying {
                if let Err(unlock_err) = self.ledger.unlock_funds(&msg.sender, &lock.asset, lock.amount) {
                    error!(order_id = %msg.id, error = %unlock_err, "Unlock after failed insert failed");
                }
            }
            return Err(err);
        }

        debug!(order_id = %msg.id, symbol = %msg.symbol, side = ?msg.side, price = %msg.price, qty = %msg.quantity, "Order added");
        self.record_change(&msg.symbol, OrderChange::new(msg.id.clone(), ChangeKind::Ack));
        Ok(())
    }

    /// Remove a resting order and release its remaining lock
    pub fn cancel_order(&mut self, msg: &CancelOrderMsg) -> Result<(), KeeperError> {
        let state = self.registry.get_mut(&msg.symbol)?;
        let order = state
            .orders
            .get(&msg.ref_id)
            .ok_or_else(|| KeeperError::OrderNotFound(msg.ref_id.to_string()))?;
        if order.sender != msg.sender {
            return Err(OrderError::NotOwner {
                order_id: msg.ref_id.to_string(),
                sender: msg.sender.to_string(),
            }
            .into());
        }
        let mut release = transfer::from_canceled(order, false)?;
        state.engine.book().get_order(&msg.ref_id, order.side, order.price)?;

        // the order leaves the book only once its lock is released
        if !self.replaying {
            self.ledger.apply_transfer(&release)?;
        }
        state.remove_order(&msg.ref_id)?;

        if !self.replaying {
            let account = release.account.clone();
            let fee = self
                .fee_calc
                .calculate(&self.ledger, &account, std::slice::from_mut(&mut release));
            match self.ledger.charge_fee(&account, &fee) {
                Ok(()) => self.fee_pool.add(self.height, &fee),
                Err(err) => warn!(order_id = %msg.ref_id, error = %err, "Cancel fee not charged"),
            }
        }

        debug!(order_id = %msg.ref_id, event = ?release.event, "Order canceled");
        self.record_change(&msg.symbol, OrderChange::new(msg.ref_id.clone(), ChangeKind::Canceled));
        Ok(())
    }

    /// Match every pending symbol, settle, sweep expiries on breathe blocks
    /// and publish the block's market data
    pub fn end_block(&mut self) -> RoundReport {
        let ctx = RoundContext {
            height: self.height,
            timestamp: self.timestamp,
            regime: self.config.regime_at(self.height),
        };
        let workers = self.config.shard_count();

        let mut report = RoundReport {
            height: self.height,
            ..RoundReport::default()
        };

        if self.replaying {
            report.outcomes = round::run_matching(self.registry.pending_mut(), ctx, workers, None);
        } else {
            let registry = &mut self.registry;
            let mut outcomes = Vec::new();
            report.settlement = settlement::settle(&self.ledger, &self.fee_calc, workers, |router| {
                outcomes = round::run_matching(registry.pending_mut(), ctx, workers, Some(router));
            });
            report.outcomes = outcomes;
            self.fee_pool.add(self.height, &report.settlement.total_fee);
        }

        if self.config.is_breathe_block(self.height) {
            self.expire(&mut report);
        }

        for failure in &report.settlement.failures {
            error!(account = %failure.account, order_id = ?failure.order_id, error = %failure.error, "Settlement failure");
        }
        info!(
            height = self.height,
            symbols = report.outcomes.len(),
            trades = report.trade_count(),
            failed = report.failed_symbols().len(),
            fees = ?report.settlement.total_fee.tokens,
            "Round finished"
        );

        if !self.replaying {
            self.publish(&report);
        }
        report
    }

    fn expire(&mut self, report: &mut RoundReport) {
        let before = self.config.expire_before(self.height);
        let registry = &mut self.registry;
        let mut expired = BTreeMap::new();

        let mut sweep = |router: Option<&ShardRouter>| {
            for state in registry.symbols_mut() {
                match round::expire_orders(state, before, router) {
                    Ok(changes) if !changes.is_empty() => {
                        expired.insert(state.symbol().clone(), changes);
                    }
                    Ok(_) => {}
                    Err(err) => error!(symbol = %state.symbol(), error = %err, "Expiry skipped, release overflow"),
                }
            }
        };

        if self.replaying {
            sweep(None);
        } else {
            let settled = settlement::settle(&self.ledger, &self.fee_calc, self.config.shard_count(), |router| {
                sweep(Some(router))
            });
            self.fee_pool.add(self.height, &settled.total_fee);
            report.expiry_settlement = Some(settled);
        }

        let count: usize = expired.values().map(Vec::len).sum();
        info!(height = self.height, before, expired = count, "Breathe block expiry");
        report.expired = expired;
    }

    fn publish(&mut self, report: &RoundReport) {
        let mut changes = std::mem::take(&mut self.block_changes);
        for outcome in &report.outcomes {
            changes
                .entry(outcome.symbol.clone())
                .or_default()
                .extend(outcome.changes.iter().cloned());
        }
        for (symbol, expired) in &report.expired {
            changes.entry(symbol.clone()).or_default().extend(expired.iter().cloned());
        }

        for (symbol, changes) in changes {
            let trades = report
                .outcomes
                .iter()
                .find(|o| o.symbol == symbol)
                .map(|o| o.trades.clone())
                .unwrap_or_default();
            let depth = self.depth(&symbol, self.config.depth_levels).unwrap_or_default();
            self.publisher.publish(MarketEvent {
                height: self.height,
                timestamp: self.timestamp,
                symbol,
                trades,
                depth,
                changes,
            });
        }
    }

    fn record_change(&mut self, symbol: &Symbol, change: OrderChange) {
        if !self.replaying {
            self.block_changes.entry(symbol.clone()).or_default().push(change);
        }
    }

    /// Execute a whole block
    ///
    /// Rejected transactions leave no trace in keeper state; the returned
    /// `accepted` block is what the write-ahead log must record.
    pub fn apply_block(&mut self, block: &Block) -> Result<BlockOutcome, KeeperError> {
        self.begin_block(block.height, block.timestamp)?;

        let mut accepted = Vec::with_capacity(block.txs.len());
        let mut rejected = Vec::new();
        for (index, tx) in block.txs.iter().enumerate() {
            let result = match tx {
                Tx::NewOrder(msg) => self.add_order(msg),
                Tx::CancelOrder(msg) => self.cancel_order(msg),
            };
            match result {
                Ok(()) => accepted.push(tx.clone()),
                Err(error) => {
                    debug!(height = block.height, index, %error, "Transaction rejected");
                    if let Tx::NewOrder(msg) = tx {
                        self.record_change(&msg.symbol, OrderChange::new(msg.id.clone(), ChangeKind::FailedBlocking));
                    }
                    rejected.push(RejectedTx {
                        index,
                        tx: tx.clone(),
                        error,
                    });
                }
            }
        }

        let round = self.end_block();
        Ok(BlockOutcome {
            accepted: Block::new(block.height, block.timestamp, accepted),
            rejected,
            round,
        })
    }

    pub fn set_replay(&mut self, replaying: bool) {
        self.replaying = replaying;
    }

    pub fn is_replaying(&self) -> bool {
        self.replaying
    }

    pub fn depth(&self, symbol: &Symbol, levels: usize) -> Result<BookDepth, KeeperError> {
        Ok(self.registry.get(symbol)?.engine.depth(levels))
    }

    pub fn order(&self, id: &OrderId) -> Option<&OrderInfo> {
        self.registry.find_order(id)
    }

    /// Open orders of `account` on `symbol`, by order id
    pub fn open_orders(&self, symbol: &Symbol, account: &AccountId) -> Result<Vec<OrderInfo>, KeeperError> {
        Ok(self
            .registry
            .get(symbol)?
            .orders
            .values()
            .filter(|o| &o.sender == account)
            .cloned()
            .collect())
    }

    pub fn last_trade_price(&self, symbol: &Symbol) -> Result<Price, KeeperError> {
        Ok(self.registry.get(symbol)?.engine.last_trade_price())
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn fee_pool(&self) -> &FeePool {
        &self.fee_pool
    }

    pub fn fee_pool_mut(&mut self) -> &mut FeePool {
        &mut self.fee_pool
    }

    pub fn publisher(&self) -> &Publisher {
        &self.publisher
    }

    pub fn height(&self) -> i64 {
        self.height
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub(crate) fn set_height(&mut self, height: i64) {
        self.height = height;
    }
}
