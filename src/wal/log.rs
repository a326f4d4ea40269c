//! Write-ahead log directory
//!
//! The log is a sequence of numbered files. Appends go to the newest
//! (active) file. A flush rotates to a fresh file first, and older files are
//! deleted only after every memtable they fed has reached a segment.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::Result;

use super::{RecoveryResult, WalEntry, WalRecord, WalRecovery, WalWriter};

/// Entries recovered from every file of a log directory
#[derive(Debug, Default)]
pub struct Replay {
    pub entries: Vec<WalEntry>,
    pub result: RecoveryResult,
    /// Highest file id found on disk (0 when the directory was empty)
    pub last_file_id: u64,
}

/// Append-only log spread over numbered files
pub struct WriteAheadLog {
    dir: PathBuf,
    sync_strategy: WalSyncStrategy,
    active: WalWriter,
    active_id: u64,
}

impl WriteAheadLog {
    /// Read every log file in `dir`, oldest first
    ///
    /// Torn tails are truncated; reading continues with the next file.
    pub fn replay(dir: &Path) -> Result<Replay> {
        fs::create_dir_all(dir)?;

        let mut replay = Replay::default();
        for (id, path) in Self::list_files(dir)? {
            let (entries, result) = WalRecovery::recover(&path)?;
            tracing::debug!(
                "Replayed WAL file {}: {} entries, {} corrupted",
                path.display(),
                result.entries_recovered,
                result.entries_corrupted
            );
            replay.entries.extend(entries);
            replay.result.merge(&result);
            replay.last_file_id = id;
        }

        Ok(replay)
    }

    /// Start a new active file after the existing ones
    ///
    /// Existing files stay on disk until retired.
    pub fn open(dir: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let last_id = Self::list_files(dir)?
            .last()
            .map(|(id, _)| *id)
            .unwrap_or(0);
        let active_id = last_id + 1;
        let active = WalWriter::open(&Self::file_path(dir, active_id), sync_strategy, next_lsn)?;

        Ok(Self {
            dir: dir.to_path_buf(),
            sync_strategy,
            active,
            active_id,
        })
    }

    /// Append a record to the active file; returns its LSN
    pub fn append(&mut self, record: &WalRecord) -> Result<u64> {
        self.active.append(record)
    }

    /// Switch appends to a new file and return the id of the file that was
    /// active until now
    ///
    /// If the new file cannot be created the current one stays active.
    pub fn rotate(&mut self) -> Result<u64> {
        let new_id = self.active_id + 1;
        let next = WalWriter::open(
            &Self::file_path(&self.dir, new_id),
            self.sync_strategy,
            self.active.current_lsn(),
        )?;

        self.active.sync()?;
        let retired = self.active_id;
        self.active = next;
        self.active_id = new_id;

        tracing::debug!("WAL rotated: file {} -> {}", retired, new_id);
        Ok(retired)
    }

    /// Delete every file with id <= `file_id` (the active file is kept)
    ///
    /// Returns the number of files removed.
    pub fn retire_through(&mut self, file_id: u64) -> Result<usize> {
        let mut removed = 0;
        for (id, path) in Self::list_files(&self.dir)? {
            if id > file_id || id >= self.active_id {
                break;
            }
            fs::remove_file(&path)?;
            removed += 1;
        }

        if removed > 0 {
            tracing::debug!("Retired {} WAL file(s) through {}", removed, file_id);
        }
        Ok(removed)
    }

    /// Force sync of the active file
    pub fn sync(&mut self) -> Result<()> {
        self.active.sync()
    }

    #[cfg(test)]
    pub(crate) fn fail_next_sync(&mut self) {
        self.active.fail_next_sync();
    }

    pub fn active_file_id(&self) -> u64 {
        self.active_id
    }

    /// LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.active.current_lsn()
    }

    /// Ids and paths of all log files, ascending
    pub fn list_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            if let Some(id) = Self::parse_file_id(&path) {
                files.push((id, path));
            }
        }
        files.sort_by_key(|(id, _)| *id);
        Ok(files)
    }

    /// "wal_000042.log" -> Some(42)
    fn parse_file_id(path: &Path) -> Option<u64> {
        if path.extension()? != "log" {
            return None;
        }
        let name = path.file_stem()?.to_string_lossy();
        name.strip_prefix("wal_")?.parse().ok()
    }

    fn file_path(dir: &Path, id: u64) -> PathBuf {
        dir.join(format!("wal_{:06}.log", id))
    }
}
