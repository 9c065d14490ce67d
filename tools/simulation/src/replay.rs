//! Crash recovery and replay validation
//!
//! A recovered keeper starts from the latest snapshot, replays the journal
//! through the live block path and must end in exactly the state the live
//! chain holds. Balances are not part of that state: replay never touches
//! the ledger.

use std::path::Path;

use order_keeper::{DexKeeper, InMemoryLedger, KeeperError};
use persistence::{
    DeterminismVerifier, DivergenceReport, RecoveryEngine, RecoveryError, RecoveryMetrics, SnapshotError,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::chain::{ChainConfig, MiniChain};

#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Keeper error: {0}")]
    Keeper(#[from] KeeperError),

    #[error("Recovery error: {0}")]
    Recovery(#[from] RecoveryError),

    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

/// Rebuild a keeper from `snapshot_dir` and `journal_dir`
pub fn recover(
    config: &ChainConfig,
    snapshot_dir: &Path,
    journal_dir: &Path,
    expected_hash: Option<&str>,
) -> Result<(DexKeeper<InMemoryLedger>, RecoveryMetrics), ReplayError> {
    let mut keeper = config.build_keeper()?;
    let mut engine = RecoveryEngine::new(snapshot_dir, journal_dir);
    let metrics = engine.recover(&mut keeper, expected_hash)?;
    info!(
        snapshot_height = metrics.snapshot_height,
        replayed = metrics.replay_count,
        height = metrics.final_height,
        "Keeper recovered"
    );
    Ok((keeper, metrics))
}

/// Live state compared with a recovery from disk
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayValidation {
    pub matches: bool,
    pub live_hash: String,
    pub recovered_hash: String,
    pub snapshot_height: i64,
    pub replayed_blocks: u64,
}

/// Recover from the chain's storage and compare with the live keeper
pub fn validate_against(chain: &MiniChain, snapshot_dir: &Path, journal_dir: &Path) -> Result<ReplayValidation, ReplayError> {
    let live_hash = chain.keeper().export_dex_state().compute_hash()?;
    let (recovered, metrics) = recover(chain.config(), snapshot_dir, journal_dir, None)?;
    let recovered_hash = recovered.export_dex_state().compute_hash()?;

    let matches = recovered_hash == live_hash;
    if !matches {
        warn!(live = %live_hash, recovered = %recovered_hash, "Recovered state diverges from live state");
    }
    Ok(ReplayValidation {
        matches,
        live_hash,
        recovered_hash,
        snapshot_height: metrics.snapshot_height,
        replayed_blocks: metrics.replay_count,
    })
}

/// Recover twice independently and compare the two results
pub fn verify_double_recovery(
    config: &ChainConfig,
    snapshot_dir: &Path,
    journal_dir: &Path,
) -> Result<DivergenceReport, ReplayError> {
    let (first, _) = recover(config, snapshot_dir, journal_dir, None)?;
    let (second, _) = recover(config, snapshot_dir, journal_dir, None)?;
    Ok(DeterminismVerifier::compare_states(&first.export_dex_state(), &second.export_dex_state())?)
}
