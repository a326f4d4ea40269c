//! Configuration for cellstore
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, StoreError};

/// Main configuration for a cellstore instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── catalog.json           (table schemas and states)
    ///     ├── wal/wal_000001.log     (write-ahead log files)
    ///     └── tables/{id}/           (segment files per table)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Max size of a table's active memtable before flush (in bytes)
    pub memtable_size_limit: usize,

    // -------------------------------------------------------------------------
    // Compaction Configuration
    // -------------------------------------------------------------------------
    /// Number of segments in one table that triggers a compaction
    pub compaction_segment_trigger: usize,

    /// Total segment bytes in one table that triggers a compaction
    pub compaction_size_trigger: u64,

    /// Tombstones younger than this survive compaction
    pub tombstone_retention: Duration,

    // -------------------------------------------------------------------------
    // Background Worker Configuration
    // -------------------------------------------------------------------------
    /// Spawn the background flush/compaction thread
    pub background_threads_enabled: bool,

    /// How often the background worker re-checks flush/compaction triggers
    pub background_interval: Duration,

    /// First retry delay after a failed flush or compaction
    pub retry_backoff_initial: Duration,

    /// Upper bound for the exponential retry delay
    pub retry_backoff_max: Duration,

    // -------------------------------------------------------------------------
    // Query Configuration
    // -------------------------------------------------------------------------
    /// Rows assembled per scanner refill
    pub scan_batch_rows: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cellstore_data"),
            wal_sync_strategy: WalSyncStrategy::EveryWrite,
            memtable_size_limit: 64 * 1024 * 1024, // 64 MB
            compaction_segment_trigger: 4,
            compaction_size_trigger: 256 * 1024 * 1024, // 256 MB
            tombstone_retention: Duration::from_secs(60 * 60),
            background_threads_enabled: true,
            background_interval: Duration::from_secs(1),
            retry_backoff_initial: Duration::from_millis(100),
            retry_backoff_max: Duration::from_secs(30),
            scan_batch_rows: 256,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.memtable_size_limit == 0 {
            return Err(StoreError::Config(
                "memtable_size_limit must be greater than zero".to_string(),
            ));
        }
        if self.compaction_segment_trigger < 2 {
            return Err(StoreError::Config(
                "compaction_segment_trigger must be at least 2".to_string(),
            ));
        }
        if self.scan_batch_rows == 0 {
            return Err(StoreError::Config(
                "scan_batch_rows must be greater than zero".to_string(),
            ));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(StoreError::Config(
                "EveryNEntries count must be greater than zero".to_string(),
            ));
        }
        if self.retry_backoff_initial > self.retry_backoff_max {
            return Err(StoreError::Config(
                "retry_backoff_initial must not exceed retry_backoff_max".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the segment count that triggers compaction
    pub fn compaction_segment_trigger(mut self, count: usize) -> Self {
        self.config.compaction_segment_trigger = count;
        self
    }

    /// Set the total segment size that triggers compaction (in bytes)
    pub fn compaction_size_trigger(mut self, bytes: u64) -> Self {
        self.config.compaction_size_trigger = bytes;
        self
    }

    /// Set how long tombstones survive compaction
    pub fn tombstone_retention(mut self, retention: Duration) -> Self {
        self.config.tombstone_retention = retention;
        self
    }

    /// Enable or disable the background flush/compaction thread
    pub fn background_threads_enabled(mut self, enabled: bool) -> Self {
        self.config.background_threads_enabled = enabled;
        self
    }

    /// Set the background worker poll interval
    pub fn background_interval(mut self, interval: Duration) -> Self {
        self.config.background_interval = interval;
        self
    }

    /// Set the retry backoff bounds for background failures
    pub fn retry_backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.retry_backoff_initial = initial;
        self.config.retry_backoff_max = max;
        self
    }

    /// Set the number of rows a scanner assembles per refill
    pub fn scan_batch_rows(mut self, rows: usize) -> Self {
        self.config.scan_batch_rows = rows;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
