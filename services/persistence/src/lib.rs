//! Persistence & Deterministic Replay Service
//!
//! Provides the block write-ahead log, sequential reading with corruption
//! detection, breathe-block state snapshots, crash recovery by block
//! replay, and determinism checks.
//!
//! **Key Invariants:**
//! - Blocks are logged with contiguous heights
//! - Snapshot state serializes deterministically (sorted maps, sorted orders)
//! - Recovery replays through the same code paths as live execution

pub mod journal;
pub mod reader;
pub mod snapshot;
pub mod recovery;
pub mod determinism;

pub use determinism::{DeterminismVerifier, DivergenceReport};
pub use journal::{BlockEntry, JournalConfig, JournalError, JournalWriter};
pub use reader::{JournalReader, ReaderError};
pub use recovery::{BlockApplier, RecoveryEngine, RecoveryError, RecoveryMetrics};
pub use snapshot::{
    BookSnapshot, DexState, Snapshot, SnapshotCleanupPolicy, SnapshotError, SnapshotLoader, SnapshotWriter,
};
