//! Miniature host chain
//!
//! Stands in for the consensus layer around the keeper: assigns heights and
//! timestamps, executes blocks, logs every accepted block to the write-ahead
//! journal and snapshots keeper state at breathe blocks.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;

use order_keeper::{BlockOutcome, DexKeeper, InMemoryLedger, KeeperConfig, KeeperError};
use persistence::{
    JournalConfig, JournalError, JournalWriter, Snapshot, SnapshotCleanupPolicy, SnapshotError, SnapshotWriter,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};
use types::errors::LedgerError;
use types::ids::{AccountId, Symbol};
use types::msg::{Block, Tx};
use types::numeric::Price;
use types::pair::TradingPair;

use crate::metrics::SimMetrics;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Keeper error: {0}")]
    Keeper(#[from] KeeperError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub keeper: KeeperConfig,
    pub pairs: Vec<TradingPair>,
    pub genesis_time: i64,
    pub block_time_ms: i64,
    pub compress_snapshots: bool,
    /// Snapshots kept on disk
    pub max_snapshots: usize,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            keeper: KeeperConfig::default(),
            pairs: Vec::new(),
            genesis_time: 1_700_000_000_000,
            block_time_ms: 1_000,
            compress_snapshots: false,
            max_snapshots: 3,
        }
    }
}

impl ChainConfig {
    /// Keeper with every configured pair listed and an empty ledger
    pub fn build_keeper(&self) -> Result<DexKeeper<InMemoryLedger>, KeeperError> {
        let mut keeper = DexKeeper::new(self.keeper.clone(), InMemoryLedger::new())?;
        for pair in &self.pairs {
            keeper.list_pair(pair.clone())?;
        }
        Ok(keeper)
    }
}

struct Storage {
    journal: JournalWriter,
    snapshots: SnapshotWriter,
    snapshot_dir: PathBuf,
    cleanup: SnapshotCleanupPolicy,
}

pub struct MiniChain {
    config: ChainConfig,
    keeper: DexKeeper<InMemoryLedger>,
    storage: Option<Storage>,
    metrics: SimMetrics,
}

impl MiniChain {
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        let keeper = config.build_keeper()?;
        Ok(Self {
            config,
            keeper,
            storage: None,
            metrics: SimMetrics::new(),
        })
    }

    /// Journal accepted blocks under `journal_dir` and snapshot breathe
    /// blocks under `snapshot_dir`
    pub fn with_storage(
        mut self,
        snapshot_dir: impl Into<PathBuf>,
        journal_dir: impl Into<PathBuf>,
    ) -> Result<Self, ChainError> {
        let snapshot_dir = snapshot_dir.into();
        let mut journal = JournalWriter::open(JournalConfig::new(journal_dir))?;
        if self.keeper.height() > 0 {
            journal.set_next_height(self.keeper.height() + 1);
        }
        self.storage = Some(Storage {
            journal,
            snapshots: SnapshotWriter::new(&snapshot_dir, self.config.compress_snapshots),
            snapshot_dir,
            cleanup: SnapshotCleanupPolicy::new(self.config.max_snapshots),
        });
        Ok(self)
    }

    pub fn fund(&self, account: &AccountId, asset: &str, amount: i64) -> Result<(), ChainError> {
        self.keeper.ledger().deposit(account, asset, amount)?;
        Ok(())
    }

    /// Fund every account with `amount` of every listed asset
    pub fn fund_all(&self, accounts: &[AccountId], amount: i64) -> Result<(), ChainError> {
        let mut assets: Vec<&str> = self
            .config
            .pairs
            .iter()
            .flat_map(|p| [p.base_asset(), p.quote_asset()])
            .collect();
        assets.sort_unstable();
        assets.dedup();
        for account in accounts {
            for asset in &assets {
                self.fund(account, asset, amount)?;
            }
        }
        Ok(())
    }

    pub fn next_height(&self) -> i64 {
        self.keeper.height() + 1
    }

    /// Execute `txs` as the next block
    pub fn produce_block(&mut self, txs: Vec<Tx>) -> Result<BlockOutcome, ChainError> {
        let height = self.next_height();
        let block = Block::new(height, self.config.genesis_time + height * self.config.block_time_ms, txs);

        let started = Instant::now();
        let outcome = self.keeper.apply_block(&block)?;
        self.metrics.record_block(&outcome, started.elapsed().as_nanos() as u64);

        if let Some(storage) = &mut self.storage {
            storage.journal.write_block(&outcome.accepted)?;
            if self.config.keeper.is_breathe_block(height) {
                let snapshot = Snapshot::new(block.timestamp, self.keeper.export_dex_state(), self.config.compress_snapshots)?;
                let path = storage.snapshots.write(&snapshot)?;
                let removed = storage.cleanup.cleanup(&storage.snapshot_dir)?;
                info!(height, path = %path.display(), removed = removed.len(), "Breathe block snapshot written");
            }
        }

        debug!(
            height,
            accepted = outcome.accepted.txs.len(),
            rejected = outcome.rejected.len(),
            trades = outcome.round.trade_count(),
            "Block produced"
        );
        Ok(outcome)
    }

    /// Last trade price per listed symbol
    pub fn references(&self) -> BTreeMap<Symbol, Price> {
        self.config
            .pairs
            .iter()
            .filter_map(|p| {
                let price = self.keeper.last_trade_price(&p.symbol).ok()?;
                Some((p.symbol.clone(), price))
            })
            .collect()
    }

    /// Flush the journal to disk
    pub fn sync(&mut self) -> Result<(), ChainError> {
        if let Some(storage) = &mut self.storage {
            storage.journal.sync()?;
        }
        Ok(())
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn keeper(&self) -> &DexKeeper<InMemoryLedger> {
        &self.keeper
    }

    pub fn metrics(&self) -> &SimMetrics {
        &self.metrics
    }

    pub fn height(&self) -> i64 {
        self.keeper.height()
    }
}
