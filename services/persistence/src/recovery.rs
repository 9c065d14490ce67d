//! Recovery Flow: Boot from snapshot + block replay
//!
//! Recovery process:
//! 1. Find latest snapshot (none: empty state at height 0)
//! 2. Restore the snapshot into the applier
//! 3. Open the journal, skip blocks at or below the snapshot height
//! 4. Replay every later block through the applier, in height order
//! 5. Optionally compare the final state hash against an expected one
//!
//! The applier replays through the same add/cancel/match paths as live
//! execution; this module only sequences the inputs.

use crate::reader::{JournalReader, ReaderError};
use crate::snapshot::{DexState, Snapshot, SnapshotError, SnapshotLoader, SnapshotWriter};
use std::path::PathBuf;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};
use types::msg::Block;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum RecoveryError {
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    #[error("Reader error: {0}")]
    Reader(#[from] ReaderError),

    #[error("Journal error: {0}")]
    Journal(#[from] crate::journal::JournalError),

    #[error("State hash divergence: expected {expected}, got {actual} at height {height}")]
    HashDivergence {
        expected: String,
        actual: String,
        height: i64,
    },

    #[error("Block height gap: expected {expected}, got {got}")]
    HeightGap { expected: i64, got: i64 },

    #[error("Replay of block {height} failed: {reason}")]
    Apply { height: i64, reason: String },
}

// ── Recovery Metrics ────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct RecoveryMetrics {
    pub snapshot_load_time_ms: u64,
    /// Height of the loaded snapshot (0 if none).
    pub snapshot_height: i64,
    /// Number of blocks replayed.
    pub replay_count: u64,
    pub replay_time_ms: u64,
    pub total_recovery_time_ms: u64,
    pub final_state_hash: String,
    /// Height reached after replay.
    pub final_height: i64,
    pub success: bool,
}

// ── Recovery Log Entry ──────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct RecoveryLogEntry {
    pub stage: RecoveryStage,
    pub message: String,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    Start,
    SnapshotSearch,
    SnapshotLoad,
    JournalOpen,
    JournalSeek,
    Replay,
    Validation,
    Complete,
    Error,
}

// ── Block Applier ───────────────────────────────────────────────────

/// State machine that recovery rebuilds.
///
/// Implemented by the order keeper; blocks go through the live code paths.
pub trait BlockApplier {
    /// Discard current state and load `state`.
    fn restore(&mut self, state: DexState) -> Result<(), String>;

    /// Execute one committed block.
    fn apply_block(&mut self, block: &Block) -> Result<(), String>;

    /// Current state in canonical form.
    fn export_state(&self) -> DexState;
}

// ── Recovery Engine ─────────────────────────────────────────────────

/// Orchestrates snapshot loading + block replay.
pub struct RecoveryEngine {
    snapshot_dir: PathBuf,
    journal_dir: PathBuf,
    log: Vec<RecoveryLogEntry>,
}

impl RecoveryEngine {
    pub fn new(snapshot_dir: impl Into<PathBuf>, journal_dir: impl Into<PathBuf>) -> Self {
        Self {
            snapshot_dir: snapshot_dir.into(),
            journal_dir: journal_dir.into(),
            log: Vec::new(),
        }
    }

    /// Rebuild `applier` from disk.
    ///
    /// Any error is fatal; the applier is left in an unspecified state.
    pub fn recover(
        &mut self,
        applier: &mut dyn BlockApplier,
        expected_hash: Option<&str>,
    ) -> Result<RecoveryMetrics, RecoveryError> {
        let total_start = Instant::now();
        let mut metrics = RecoveryMetrics::default();

        self.log_stage(RecoveryStage::Start, "Recovery started", 0);

        let state = self.load_snapshot(&mut metrics)?;
        let snapshot_height = state.height;
        applier.restore(state).map_err(|reason| RecoveryError::Apply {
            height: snapshot_height,
            reason,
        })?;

        self.log_stage(RecoveryStage::JournalOpen, "Opening journal", 0);
        let mut reader = JournalReader::open(&self.journal_dir)?;
        if snapshot_height > 0 {
            let skipped = reader.seek_past_height(snapshot_height)?;
            self.log_stage(
                RecoveryStage::JournalSeek,
                &format!("Skipped {} blocks at or below height {}", skipped, snapshot_height),
                0,
            );
        }

        let replay_start = Instant::now();
        self.log_stage(RecoveryStage::Replay, "Starting block replay", 0);

        let mut last_height = snapshot_height;
        while let Some(entry) = self.next_entry(&mut reader, replay_start)? {
            if last_height > 0 && entry.height != last_height + 1 {
                self.log_stage(
                    RecoveryStage::Error,
                    &format!("Height gap after {}: got {}", last_height, entry.height),
                    0,
                );
                return Err(RecoveryError::HeightGap {
                    expected: last_height + 1,
                    got: entry.height,
                });
            }
            let block = entry.decode_block()?;
            applier.apply_block(&block).map_err(|reason| RecoveryError::Apply {
                height: block.height,
                reason,
            })?;
            last_height = block.height;
            metrics.replay_count += 1;
        }

        for record in reader.corruption_log() {
            warn!(offset = record.byte_offset, kind = ?record.kind, detail = %record.detail, "journal tail unreadable");
        }

        metrics.replay_time_ms = replay_start.elapsed().as_millis() as u64;
        metrics.final_height = last_height;
        self.log_stage(
            RecoveryStage::Replay,
            &format!("Replayed {} blocks in {}ms", metrics.replay_count, metrics.replay_time_ms),
            metrics.replay_time_ms,
        );

        let final_hash = applier.export_state().compute_hash()?;
        metrics.final_state_hash = final_hash.clone();

        if let Some(expected) = expected_hash {
            self.log_stage(RecoveryStage::Validation, "Validating state hash", 0);
            if final_hash != expected {
                self.log_stage(
                    RecoveryStage::Error,
                    &format!("Hash divergence: expected={}, actual={}", expected, final_hash),
                    0,
                );
                return Err(RecoveryError::HashDivergence {
                    expected: expected.to_string(),
                    actual: final_hash,
                    height: last_height,
                });
            }
        }

        metrics.total_recovery_time_ms = total_start.elapsed().as_millis() as u64;
        metrics.success = true;

        self.log_stage(
            RecoveryStage::Complete,
            &format!(
                "Recovery complete: {} blocks in {}ms, height={}",
                metrics.replay_count, metrics.total_recovery_time_ms, last_height
            ),
            metrics.total_recovery_time_ms,
        );

        Ok(metrics)
    }

    /// Persist the applier's current state as a breathe-block snapshot.
    pub fn take_snapshot(
        &self,
        applier: &dyn BlockApplier,
        timestamp: i64,
        compress: bool,
    ) -> Result<PathBuf, RecoveryError> {
        let snapshot = Snapshot::new(timestamp, applier.export_state(), compress)?;
        Ok(SnapshotWriter::new(&self.snapshot_dir, compress).write(&snapshot)?)
    }

    pub fn log(&self) -> &[RecoveryLogEntry] {
        &self.log
    }

    // ── Internal ────────────────────────────────────────────────────

    fn next_entry(
        &mut self,
        reader: &mut JournalReader,
        replay_start: Instant,
    ) -> Result<Option<crate::journal::BlockEntry>, RecoveryError> {
        reader.next_entry().map_err(|e| {
            self.log_stage(
                RecoveryStage::Error,
                &format!("Replay error: {}", e),
                replay_start.elapsed().as_millis() as u64,
            );
            RecoveryError::Reader(e)
        })
    }

    fn load_snapshot(&mut self, metrics: &mut RecoveryMetrics) -> Result<DexState, RecoveryError> {
        self.log_stage(RecoveryStage::SnapshotSearch, "Searching for snapshots", 0);
        let start = Instant::now();

        match SnapshotLoader::new(&self.snapshot_dir).load_latest() {
            Ok(snapshot) => {
                metrics.snapshot_load_time_ms = start.elapsed().as_millis() as u64;
                metrics.snapshot_height = snapshot.height;
                self.log_stage(
                    RecoveryStage::SnapshotLoad,
                    &format!(
                        "Snapshot loaded: height={}, hash={}",
                        snapshot.height,
                        snapshot.checksum.get(..16).unwrap_or(&snapshot.checksum)
                    ),
                    metrics.snapshot_load_time_ms,
                );
                Ok(snapshot.state)
            }
            Err(SnapshotError::NoSnapshots) => {
                self.log_stage(
                    RecoveryStage::SnapshotSearch,
                    "No snapshots found, starting from empty state",
                    0,
                );
                Ok(DexState::empty())
            }
            Err(e) => {
                self.log_stage(RecoveryStage::Error, &format!("Snapshot unusable: {}", e), 0);
                Err(RecoveryError::Snapshot(e))
            }
        }
    }

    fn log_stage(&mut self, stage: RecoveryStage, message: &str, elapsed_ms: u64) {
        if stage == RecoveryStage::Error {
            error!(?stage, elapsed_ms, "{}", message);
        } else {
            info!(?stage, elapsed_ms, "{}", message);
        }
        self.log.push(RecoveryLogEntry {
            stage,
            message: message.to_string(),
            elapsed_ms,
        });
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use types::msg::Tx;
    use types::order::OrderInfo;

    /// Tracks accepted orders and cancels; no matching.
    #[derive(Default)]
    pub struct LedgerlessApplier {
        pub state: Option<DexState>,
    }

    impl BlockApplier for LedgerlessApplier {
        fn restore(&mut self, state: DexState) -> Result<(), String> {
            self.state = Some(state);
            Ok(())
        }

        fn apply_block(&mut self, block: &Block) -> Result<(), String> {
            let state = self.state.get_or_insert_with(DexState::empty);
            for tx in &block.txs {
                match tx {
                    Tx::NewOrder(msg) => state.orders.push(OrderInfo::new(
                        msg.id.clone(),
                        msg.sender.clone(),
                        msg.symbol.clone(),
                        msg.side,
                        msg.price,
                        msg.quantity,
                        msg.time_in_force,
                        block.height,
                        block.timestamp,
                    )),
                    Tx::CancelOrder(msg) => state.orders.retain(|o| o.id != msg.ref_id),
                }
            }
            state.height = block.height;
            state.normalize();
            Ok(())
        }

        fn export_state(&self) -> DexState {
            self.state.clone().unwrap_or_else(DexState::empty)
        }
    }

    pub fn order_block(height: i64) -> Block {
        use types::ids::{AccountId, OrderId, Symbol};
        use types::msg::NewOrderMsg;
        use types::numeric::{Price, Quantity};
        use types::order::{Side, TimeInForce};

        Block::new(
            height,
            1_700_000_000 + height,
            vec![Tx::NewOrder(NewOrderMsg {
                sender: AccountId::new("bnb1a"),
                id: OrderId::new(format!("bnb1a-{height}")),
                symbol: Symbol::new("XYZ-000_BNB"),
                side: if height % 2 == 0 { Side::BUY } else { Side::SELL },
                price: Price::from_raw(100_000_000 + height),
                quantity: Quantity::from_raw(1_000),
                time_in_force: TimeInForce::GTC,
            })],
        )
    }
}
