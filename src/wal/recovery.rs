//! WAL Recovery
//!
//! Handles crash recovery by replaying WAL files.

use std::fs::OpenOptions;
use std::path::Path;

use crate::error::{Result, StoreError};

use super::{WalEntry, WalReader};

/// Handles WAL recovery after crash
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Number of entries successfully recovered
    pub entries_recovered: u64,

    /// Number of corrupted entries skipped
    pub entries_corrupted: u64,

    /// Last valid LSN
    pub last_lsn: u64,

    /// Whether the WAL was truncated (partial writes removed)
    pub was_truncated: bool,
}

impl RecoveryResult {
    /// Fold another file's result into this one
    pub fn merge(&mut self, other: &RecoveryResult) {
        self.entries_recovered += other.entries_recovered;
        self.entries_corrupted += other.entries_corrupted;
        self.last_lsn = self.last_lsn.max(other.last_lsn);
        self.was_truncated |= other.was_truncated;
    }
}

impl WalRecovery {
    /// Recover entries from a WAL file
    ///
    /// This will:
    /// 1. Read all valid entries
    /// 2. Stop at the first torn or corrupted frame
    /// 3. Truncate the file there, so later appends follow a clean frame
    /// 4. Return all valid entries in order
    pub fn recover(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult)> {
        let (entries, result, valid_offset) = Self::scan(path)?;

        let mut result = result;
        if result.entries_corrupted > 0 {
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(valid_offset)?;
            file.sync_all()?;
            result.was_truncated = true;

            tracing::warn!(
                "Truncated WAL {} at offset {} after {} good entries",
                path.display(),
                valid_offset,
                result.entries_recovered
            );
        }

        Ok((entries, result))
    }

    /// Verify integrity of a WAL file without modifying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        let (_, result, _) = Self::scan(path)?;
        Ok(result)
    }

    fn scan(path: &Path) -> Result<(Vec<WalEntry>, RecoveryResult, u64)> {
        let mut reader = WalReader::open(path)?;
        let mut entries = Vec::new();
        let mut result = RecoveryResult::default();

        loop {
            match reader.next_entry() {
                Ok(Some(entry)) => {
                    result.entries_recovered += 1;
                    result.last_lsn = entry.lsn;
                    entries.push(entry);
                }
                Ok(None) => break,
                Err(StoreError::WalCorruption(reason)) => {
                    tracing::warn!("WAL {}: {}", path.display(), reason);
                    result.entries_corrupted += 1;
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        Ok((entries, result, reader.valid_offset()))
    }
}
