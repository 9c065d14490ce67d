//! Journal Writer: Append-only block write-ahead log with checksums
//!
//! Every committed block is appended before its effects are considered
//! durable. Recovery replays the entries above the latest snapshot height.
//!
//! # Binary Format (per entry)
//! ```text
//! [total_len: u32]
//! [height:    i64]
//! [timestamp: i64]
//! [payload_len: u32][payload: bytes]   // bincode-encoded Block
//! [checksum: u32]  // CRC32C over height+timestamp+payload
//! ```

use crc32c::crc32c;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use types::msg::Block;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum JournalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Height error: expected {expected}, got {got}")]
    HeightGap { expected: i64, got: i64 },
}

/// Smallest possible body: height, timestamp, payload length, checksum.
const MIN_BODY_LEN: usize = 8 + 8 + 4 + 4;

/// Bodies larger than this are treated as corruption.
const MAX_BODY_LEN: usize = 100_000_000;

// ── Journal Entry ───────────────────────────────────────────────────

/// One logged block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockEntry {
    pub height: i64,
    /// Block time as agreed by consensus, never local wall clock.
    pub timestamp: i64,
    /// Bincode-serialized `Block`
    pub payload: Vec<u8>,
    /// CRC32C over (height ++ timestamp ++ payload)
    pub checksum: u32,
}

impl BlockEntry {
    /// Create a new entry, computing the CRC32C checksum automatically.
    pub fn new(height: i64, timestamp: i64, payload: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(height, timestamp, &payload);
        Self {
            height,
            timestamp,
            payload,
            checksum,
        }
    }

    pub fn from_block(block: &Block) -> Result<Self, JournalError> {
        let payload = bincode::serialize(block).map_err(|e| JournalError::Serialization(e.to_string()))?;
        Ok(Self::new(block.height, block.timestamp, payload))
    }

    pub fn decode_block(&self) -> Result<Block, JournalError> {
        let block: Block =
            bincode::deserialize(&self.payload).map_err(|e| JournalError::Serialization(e.to_string()))?;
        if block.height != self.height {
            return Err(JournalError::Serialization(format!(
                "entry height {} holds block {}",
                self.height, block.height
            )));
        }
        Ok(block)
    }

    pub fn compute_checksum(height: i64, timestamp: i64, payload: &[u8]) -> u32 {
        let mut buf = Vec::with_capacity(8 + 8 + payload.len());
        buf.extend_from_slice(&height.to_le_bytes());
        buf.extend_from_slice(&timestamp.to_le_bytes());
        buf.extend_from_slice(payload);
        crc32c(&buf)
    }

    /// Validate the stored checksum against recomputed value.
    pub fn verify_checksum(&self) -> bool {
        self.checksum == Self::compute_checksum(self.height, self.timestamp, &self.payload)
    }

    /// Serialize entry to the binary wire format.
    pub fn to_bytes(&self) -> Vec<u8> {
        let payload_len = self.payload.len() as u32;
        let body_len = MIN_BODY_LEN as u32 + payload_len;

        let mut buf = Vec::with_capacity(4 + body_len as usize);
        buf.extend_from_slice(&body_len.to_le_bytes());
        buf.extend_from_slice(&self.height.to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&payload_len.to_le_bytes());
        buf.extend_from_slice(&self.payload);
        buf.extend_from_slice(&self.checksum.to_le_bytes());
        buf
    }

    /// Deserialize entry from the binary wire format.
    ///
    /// Returns `(entry, bytes_consumed)`. Truncated or malformed input is an
    /// error, never a panic.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), JournalError> {
        let body_len = u32::from_le_bytes(take::<4>(data, 0, "length prefix")?) as usize;

        if body_len > MAX_BODY_LEN {
            return Err(JournalError::Serialization(format!(
                "Implausible body length: {} (likely corruption)",
                body_len
            )));
        }
        if body_len < MIN_BODY_LEN {
            return Err(JournalError::Serialization(format!(
                "Body too small: {} bytes, minimum is {}",
                body_len, MIN_BODY_LEN
            )));
        }

        let total = 4 + body_len;
        if data.len() < total {
            return Err(JournalError::Serialization(format!(
                "Incomplete entry: need {} bytes, have {}",
                total,
                data.len()
            )));
        }

        let body = &data[4..total];
        let height = i64::from_le_bytes(take::<8>(body, 0, "height")?);
        let timestamp = i64::from_le_bytes(take::<8>(body, 8, "timestamp")?);
        let payload_len = u32::from_le_bytes(take::<4>(body, 16, "payload length")?) as usize;

        let payload_end = 20 + payload_len;
        if payload_end + 4 != body.len() {
            return Err(JournalError::Serialization(format!(
                "payload_len {} does not fit body of {} bytes",
                payload_len,
                body.len()
            )));
        }
        let payload = body[20..payload_end].to_vec();
        let checksum = u32::from_le_bytes(take::<4>(body, payload_end, "checksum")?);

        Ok((
            Self {
                height,
                timestamp,
                payload,
                checksum,
            },
            total,
        ))
    }
}

fn take<const N: usize>(data: &[u8], pos: usize, what: &str) -> Result<[u8; N], JournalError> {
    data.get(pos..pos + N)
        .and_then(|s| s.try_into().ok())
        .ok_or_else(|| JournalError::Serialization(format!("Not enough data for {}", what)))
}

// ── Journal Writer Configuration ────────────────────────────────────

#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub dir: PathBuf,
    /// File size in bytes that triggers rotation (default 64 MiB).
    pub max_file_size: u64,
}

impl JournalConfig {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_file_size: 64 * 1024 * 1024,
        }
    }
}

// ── Journal Writer ──────────────────────────────────────────────────

/// Append-only block log with checksums and size-based rotation.
///
/// Every append reaches the OS before returning; `sync` makes it durable.
pub struct JournalWriter {
    config: JournalConfig,
    writer: BufWriter<File>,
    current_file: PathBuf,
    current_file_size: u64,
    /// 0 until the first append or `set_next_height`
    next_height: i64,
    file_index: u64,
}

impl JournalWriter {
    /// Open a journal writer, creating the directory if needed.
    pub fn open(config: JournalConfig) -> Result<Self, JournalError> {
        fs::create_dir_all(&config.dir)?;

        let file_index = Self::find_latest_index(&config.dir);
        let current_file = Self::journal_path(&config.dir, file_index);

        let file = OpenOptions::new().create(true).append(true).open(&current_file)?;

        let current_file_size = file.metadata()?.len();
        Ok(Self {
            config,
            writer: BufWriter::new(file),
            current_file,
            current_file_size,
            next_height: 0,
            file_index,
        })
    }

    /// Set the next expected height (after recovery).
    pub fn set_next_height(&mut self, height: i64) {
        self.next_height = height;
    }

    pub fn next_height(&self) -> i64 {
        self.next_height
    }

    pub fn current_file_path(&self) -> &Path {
        &self.current_file
    }

    /// Append an entry. Heights must be contiguous once known.
    pub fn append(&mut self, entry: &BlockEntry) -> Result<(), JournalError> {
        if self.next_height > 0 && entry.height != self.next_height {
            return Err(JournalError::HeightGap {
                expected: self.next_height,
                got: entry.height,
            });
        }

        if self.current_file_size >= self.config.max_file_size {
            self.rotate()?;
        }

        let bytes = entry.to_bytes();
        self.writer.write_all(&bytes)?;
        self.writer.flush()?;

        self.current_file_size += bytes.len() as u64;
        self.next_height = entry.height + 1;
        Ok(())
    }

    /// Encode and append a block in one call.
    pub fn write_block(&mut self, block: &Block) -> Result<BlockEntry, JournalError> {
        let entry = BlockEntry::from_block(block)?;
        self.append(&entry)?;
        Ok(entry)
    }

    /// Flush and fsync the current file.
    pub fn sync(&mut self) -> Result<(), JournalError> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        Ok(())
    }

    fn rotate(&mut self) -> Result<(), JournalError> {
        self.sync()?;

        self.file_index += 1;
        self.current_file = Self::journal_path(&self.config.dir, self.file_index);

        let file = OpenOptions::new().create(true).append(true).open(&self.current_file)?;

        self.writer = BufWriter::new(file);
        self.current_file_size = 0;
        Ok(())
    }

    pub(crate) fn journal_path(dir: &Path, index: u64) -> PathBuf {
        dir.join(format!("journal-{:06}.bin", index))
    }

    pub(crate) fn parse_index(name: &str) -> Option<u64> {
        if name.starts_with("journal-") && name.ends_with(".bin") {
            name.trim_start_matches("journal-")
                .trim_end_matches(".bin")
                .parse::<u64>()
                .ok()
        } else {
            None
        }
    }

    fn find_latest_index(dir: &Path) -> u64 {
        fs::read_dir(dir)
            .ok()
            .and_then(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter_map(|e| Self::parse_index(&e.file_name().to_string_lossy()))
                    .max()
            })
            .unwrap_or(0)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
