//! Journal Reader: Sequential block reader with corruption detection
//!
//! Features:
//! - Sequential entry reading across rotated journal files
//! - CRC32C checksum validation on every read
//! - Corruption detection with byte-offset reporting
//! - Partial recovery: skip a corrupted entry, keep the valid remainder
//! - Seek to the first block above a snapshot height
//! - Contiguous height validation

use crate::journal::{BlockEntry, JournalError, JournalWriter};
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use thiserror::Error;

// ── Errors ──────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum ReaderError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("Journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("Checksum mismatch at byte offset {offset}: block height={height}")]
    ChecksumMismatch { offset: u64, height: i64 },

    #[error("Height gap: expected {expected}, got {got}")]
    HeightGap { expected: i64, got: i64 },
}

// ── Corruption Log Entry ────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CorruptionRecord {
    /// Byte offset (across all files) where corruption was detected.
    pub byte_offset: u64,
    pub kind: CorruptionKind,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CorruptionKind {
    ChecksumMismatch,
    TruncatedEntry,
}

// ── Journal Reader ──────────────────────────────────────────────────

/// Sequential journal reader with checksum validation.
pub struct JournalReader {
    /// Journal files sorted by index.
    files: Vec<PathBuf>,
    current_file_idx: usize,
    data: Vec<u8>,
    pos: usize,
    global_offset: u64,
    last_height: Option<i64>,
    corruption_log: Vec<CorruptionRecord>,
}

impl JournalReader {
    /// Open a reader over all journal files in `dir`.
    ///
    /// A missing directory reads as an empty journal.
    pub fn open(dir: &Path) -> Result<Self, ReaderError> {
        let files = Self::discover_files(dir)?;
        let mut reader = Self {
            files,
            current_file_idx: 0,
            data: Vec::new(),
            pos: 0,
            global_offset: 0,
            last_height: None,
            corruption_log: Vec::new(),
        };
        reader.load_current_file()?;
        Ok(reader)
    }

    /// Read the next entry, validating its checksum.
    ///
    /// Returns `None` when all files are exhausted. A truncated tail is
    /// logged and skipped.
    pub fn next_entry(&mut self) -> Result<Option<BlockEntry>, ReaderError> {
        loop {
            if self.pos >= self.data.len() && !self.advance_file()? {
                return Ok(None);
            }

            let offset_before = self.global_offset;
            match BlockEntry::from_bytes(&self.data[self.pos..]) {
                Ok((entry, consumed)) => {
                    self.pos += consumed;
                    self.global_offset += consumed as u64;

                    if !entry.verify_checksum() {
                        self.corruption_log.push(CorruptionRecord {
                            byte_offset: offset_before,
                            kind: CorruptionKind::ChecksumMismatch,
                            detail: format!(
                                "CRC32C mismatch for height={}, stored={:#010x}",
                                entry.height, entry.checksum
                            ),
                        });
                        return Err(ReaderError::ChecksumMismatch {
                            offset: offset_before,
                            height: entry.height,
                        });
                    }

                    self.last_height = Some(entry.height);
                    return Ok(Some(entry));
                }
                Err(e) => {
                    let remaining = self.data.len() - self.pos;
                    self.corruption_log.push(CorruptionRecord {
                        byte_offset: offset_before,
                        kind: CorruptionKind::TruncatedEntry,
                        detail: format!("{} bytes unreadable: {}", remaining, e),
                    });
                    self.global_offset += remaining as u64;
                    self.pos = self.data.len();
                }
            }
        }
    }

    pub fn read_all(&mut self) -> Result<Vec<BlockEntry>, ReaderError> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }

    /// Read the remaining entries, requiring contiguous heights.
    pub fn read_all_validated(&mut self) -> Result<Vec<BlockEntry>, ReaderError> {
        let entries = self.read_all()?;
        Self::validate_heights(&entries)?;
        Ok(entries)
    }

    /// Skip entries with `height <= after_height`; returns how many.
    pub fn seek_past_height(&mut self, after_height: i64) -> Result<u64, ReaderError> {
        let mut skipped = 0u64;
        loop {
            if self.pos >= self.data.len() && !self.advance_file()? {
                break;
            }
            match BlockEntry::from_bytes(&self.data[self.pos..]) {
                Ok((entry, consumed)) => {
                    if entry.height > after_height {
                        break;
                    }
                    self.pos += consumed;
                    self.global_offset += consumed as u64;
                    self.last_height = Some(entry.height);
                    skipped += 1;
                }
                Err(_) => {
                    self.global_offset += (self.data.len() - self.pos) as u64;
                    self.pos = self.data.len();
                }
            }
        }
        Ok(skipped)
    }

    /// Read as many valid entries as possible, skipping corrupted ones.
    pub fn recover_entries(&mut self) -> (Vec<BlockEntry>, Vec<CorruptionRecord>) {
        let mut entries = Vec::new();
        loop {
            match self.next_entry() {
                Ok(Some(entry)) => entries.push(entry),
                Ok(None) => break,
                // the bad frame was consumed; carry on with the next one
                Err(ReaderError::ChecksumMismatch { .. }) => continue,
                Err(_) => break,
            }
        }
        (entries, self.corruption_log.clone())
    }

    pub fn current_offset(&self) -> u64 {
        self.global_offset
    }

    pub fn last_height(&self) -> Option<i64> {
        self.last_height
    }

    pub fn corruption_log(&self) -> &[CorruptionRecord] {
        &self.corruption_log
    }

    /// Heights must increase by exactly one.
    pub fn validate_heights(entries: &[BlockEntry]) -> Result<(), ReaderError> {
        for window in entries.windows(2) {
            let expected = window[0].height + 1;
            if window[1].height != expected {
                return Err(ReaderError::HeightGap {
                    expected,
                    got: window[1].height,
                });
            }
        }
        Ok(())
    }

    // ── Internal Helpers ────────────────────────────────────────────

    fn discover_files(dir: &Path) -> Result<Vec<PathBuf>, ReaderError> {
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut files: Vec<(u64, PathBuf)> = fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .filter_map(|e| {
                let idx = JournalWriter::parse_index(&e.file_name().to_string_lossy())?;
                Some((idx, e.path()))
            })
            .collect();

        files.sort_by_key(|(idx, _)| *idx);
        Ok(files.into_iter().map(|(_, p)| p).collect())
    }

    fn load_current_file(&mut self) -> Result<(), ReaderError> {
        self.data.clear();
        self.pos = 0;
        if let Some(path) = self.files.get(self.current_file_idx) {
            File::open(path)?.read_to_end(&mut self.data)?;
        }
        Ok(())
    }

    fn advance_file(&mut self) -> Result<bool, ReaderError> {
        if self.current_file_idx + 1 >= self.files.len() {
            return Ok(false);
        }
        self.current_file_idx += 1;
        self.load_current_file()?;
        Ok(true)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
