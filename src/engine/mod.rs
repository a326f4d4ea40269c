//! Engine Module
//!
//! The storage engine that coordinates all components.
//!
//! ## Responsibilities
//! - Validate mutations against the catalog, log them, apply them
//! - Serve point reads and scans over memtables and segments
//! - Freeze and flush memtables, retire WAL files, compact segments
//! - Crash recovery on startup
//!
//! ## Write path
//! ```text
//!  mutate(table, m)
//!    │ gate.read()                  (disable waits for this)
//!    │ catalog: enabled? families?
//!    ▼
//!  ┌──────── wal mutex ────────┐
//!  │ assign timestamps         │
//!  │ append WalRecord (fsync)  │──▶ wal/wal_000007.log
//!  │ memtable.apply(cells)     │
//!  └───────────────────────────┘
//!    │ active memtable over limit?
//!    ▼
//!  signal background worker
//! ```
//!
//! ## Lock order
//! `tables` registry → `wal` → table memtables. The registry lock is never
//! taken while the WAL mutex is held.

mod admin;
mod background;
mod table;

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use crossbeam::channel::{self, Sender};
use parking_lot::{Mutex, RwLock};

use crate::catalog::{Catalog, TableDescriptor};
use crate::cell::{Cell, Mutation, TimestampOracle};
use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::query::{read_row, RowSource, ScanOptions, Scanner, SourceBatch};
use crate::storage::CompactionStats;
use crate::wal::{WalRecord, WriteAheadLog};

pub use admin::Admin;

use background::{BackgroundWorker, Signal};
use table::TableStore;

/// The main storage engine
///
/// ## Concurrency Model
///
/// - **Writes**: any number of callers; WAL append + memtable insert of one
///   batch happen under the WAL mutex, so a batch is visible all at once
///   and log order equals timestamp order
/// - **Reads**: lock-free with respect to writers apart from short
///   memtable read locks; each read captures memtables, then segments
/// - **Flush/compaction**: background thread, publishing by pointer swap
pub struct Engine {
    inner: Arc<EngineInner>,
    worker: Option<BackgroundWorker>,
}

/// State shared with the background worker and scanners
pub(crate) struct EngineInner {
    config: Config,
    catalog: Catalog,
    /// Table id → runtime state
    tables: RwLock<HashMap<u64, Arc<TableStore>>>,
    wal: Mutex<WriteAheadLog>,
    /// Segment file numbers, unique across tables
    file_numbers: Arc<AtomicU64>,
    timestamps: TimestampOracle,
    tables_dir: PathBuf,
    signals: Sender<Signal>,
    /// Serializes store-wide freeze/flush/retire cycles
    flush_lock: Mutex<()>,
}

impl Engine {
    // =========================================================================
    // Internal Path Constants
    // =========================================================================
    const CATALOG_FILE: &'static str = "catalog.json";
    const WAL_DIR: &'static str = "wal";
    const TABLES_DIR: &'static str = "tables";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Load the catalog
    /// 2. Open every table's segments, remove directories of dropped tables
    /// 3. Replay all WAL files into the memtables of known tables, and
    ///    start write timestamps past the newest stored one
    /// 4. Start a fresh WAL file and flush the recovered data
    /// 5. Start the background worker
    pub fn open(config: Config) -> Result<Self> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let tables_dir = config.data_dir.join(Self::TABLES_DIR);
        let wal_dir = config.data_dir.join(Self::WAL_DIR);
        fs::create_dir_all(&tables_dir)?;

        let catalog = Catalog::open(&config.data_dir.join(Self::CATALOG_FILE))?;

        let file_numbers = Arc::new(AtomicU64::new(1));
        let mut tables = HashMap::new();
        for desc in catalog.descriptors() {
            let store = TableStore::open(
                &table_dir(&tables_dir, desc.id),
                desc.id,
                &desc.name,
                Arc::clone(&file_numbers),
                0,
            )?;
            tables.insert(desc.id, Arc::new(store));
        }
        remove_orphan_tables(&tables_dir, &tables)?;

        let timestamps = TimestampOracle::new();
        for store in tables.values() {
            timestamps.observe(store.max_timestamp());
        }

        let replay = WriteAheadLog::replay(&wal_dir)?;
        let mut skipped = 0u64;
        for entry in &replay.entries {
            match tables.get(&entry.record.table_id) {
                Some(store) => {
                    let cells = entry.record.mutation.cells();
                    if let Some(newest) = cells.iter().map(Cell::timestamp).max() {
                        timestamps.observe(newest);
                    }
                    store.apply(cells);
                }
                None => skipped += 1,
            }
        }
        if replay.result.entries_recovered > 0 || replay.result.entries_corrupted > 0 {
            tracing::info!(
                "WAL recovery: {} entries recovered, {} skipped (dropped tables), {} corrupted, last_lsn={}",
                replay.result.entries_recovered,
                skipped,
                replay.result.entries_corrupted,
                replay.result.last_lsn
            );
        }

        let wal = WriteAheadLog::open(
            &wal_dir,
            config.wal_sync_strategy,
            replay.result.last_lsn + 1,
        )?;

        let (sender, receiver) = channel::bounded(1);
        let background = config.background_threads_enabled;
        let inner = Arc::new(EngineInner {
            config,
            catalog,
            tables: RwLock::new(tables),
            wal: Mutex::new(wal),
            file_numbers,
            timestamps,
            tables_dir,
            signals: sender.clone(),
            flush_lock: Mutex::new(()),
        });

        // Recovered data goes to segments right away; if that fails it
        // stays in the memtables and the old WAL files are kept
        if replay.result.entries_recovered > 0 {
            if let Err(e) = inner.flush_all() {
                tracing::warn!("Flush of recovered data failed, WAL kept: {}", e);
            }
        }

        let worker = if background {
            Some(BackgroundWorker::spawn(Arc::clone(&inner), sender, receiver)?)
        } else {
            None
        };

        tracing::info!(
            "Engine opened at {} with {} table(s)",
            inner.config.data_dir.display(),
            inner.tables.read().len()
        );

        Ok(Self { inner, worker })
    }

    /// Open with a path (convenience method)
    ///
    /// Default config rooted at `path`
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Schema administration
    pub fn admin(&self) -> Admin<'_> {
        Admin::new(&self.inner)
    }

    // =========================================================================
    // Data operations
    // =========================================================================

    /// Write `value` to each (family, qualifier) of `row` as one batch
    pub fn put<I, F, Q, V>(&self, table: &str, row: &[u8], cells: I) -> Result<()>
    where
        I: IntoIterator<Item = (F, Q, V)>,
        F: Into<String>,
        Q: Into<Vec<u8>>,
        V: Into<Vec<u8>>,
    {
        let mutation = cells
            .into_iter()
            .fold(Mutation::new(row), |m, (family, qualifier, value)| {
                m.put(family, qualifier, value)
            });
        self.mutate(table, mutation)
    }

    /// Apply a row batch atomically
    ///
    /// Fails with `TableNotFound`, `TableDisabled` or `InvalidFamily`
    /// without side effects, or with `Io` if the WAL append fails (the batch
    /// is then not applied).
    pub fn mutate(&self, table: &str, mutation: Mutation) -> Result<()> {
        self.inner.mutate(table, mutation)
    }

    /// Newest live cell of every column of `row`; empty if there are none
    pub fn get(&self, table: &str, row: &[u8]) -> Result<Vec<Cell>> {
        self.inner.get(table, row, None)
    }

    /// Like [`get`](Self::get), restricted to `families`
    pub fn get_families(&self, table: &str, row: &[u8], families: &[&str]) -> Result<Vec<Cell>> {
        let families: Vec<String> = families.iter().map(|f| f.to_string()).collect();
        self.inner.get(table, row, Some(&families))
    }

    /// Rows in `[start, stop)`, ascending
    pub fn scan(&self, table: &str, start: Option<&[u8]>, stop: Option<&[u8]>) -> Result<Scanner> {
        let options = ScanOptions {
            start_row: start.map(|s| s.to_vec()),
            stop_row: stop.map(|s| s.to_vec()),
            families: None,
        };
        self.scan_with(table, options)
    }

    pub fn scan_with(&self, table: &str, options: ScanOptions) -> Result<Scanner> {
        self.inner.scan(table, options)
    }

    /// Delete a column (family and qualifier), a family (family only) or
    /// the whole row (neither) at the current time
    pub fn delete(
        &self,
        table: &str,
        row: &[u8],
        family: Option<&str>,
        qualifier: Option<&[u8]>,
    ) -> Result<()> {
        let mutation = match (family, qualifier) {
            (None, None) => Mutation::new(row).delete_row(),
            (Some(family), None) => Mutation::new(row).delete_family(family),
            (Some(family), Some(qualifier)) => Mutation::new(row).delete_column(family, qualifier),
            (None, Some(_)) => {
                return Err(StoreError::InvalidArgument(
                    "a qualifier needs a family".to_string(),
                ))
            }
        };
        self.mutate(table, mutation)
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Flush every memtable to segments and retire covered WAL files
    pub fn flush(&self) -> Result<()> {
        self.inner.flush_all()
    }

    /// Merge all segments of `table` into one, whatever the triggers say
    pub fn compact(&self, table: &str) -> Result<CompactionStats> {
        let (store, _) = self.inner.store(table)?;
        Ok(store
            .compact(&self.inner.config, true)?
            .unwrap_or_default())
    }

    /// Close the engine gracefully
    ///
    /// Stops the background worker, flushes pending data and syncs the WAL.
    pub fn close(mut self) -> Result<()> {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
        self.inner.flush_all()?;
        self.inner.wal.lock().sync()?;
        tracing::info!("Engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    pub fn data_dir(&self) -> &Path {
        &self.inner.config.data_dir
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Bytes in the active memtable of `table`
    pub fn memtable_size(&self, table: &str) -> Result<usize> {
        Ok(self.inner.store(table)?.0.active_size())
    }

    /// Cells held in memory (active and frozen) for `table`
    pub fn memtable_entry_count(&self, table: &str) -> Result<usize> {
        Ok(self.inner.store(table)?.0.memtable_entry_count())
    }

    pub fn segment_count(&self, table: &str) -> Result<usize> {
        Ok(self.inner.store(table)?.0.segments().segment_count())
    }

    /// Number of WAL files on disk, including the active one
    pub fn wal_file_count(&self) -> Result<usize> {
        Ok(WriteAheadLog::list_files(&self.inner.config.data_dir.join(Self::WAL_DIR))?.len())
    }

    /// Directory holding the segments of `table`
    pub fn table_dir(&self, table: &str) -> Result<PathBuf> {
        let (store, _) = self.inner.store(table)?;
        Ok(table_dir(&self.inner.tables_dir, store.id()))
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Some(mut worker) = self.worker.take() {
            worker.shutdown();
        }
    }
}

impl EngineInner {
    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    // =========================================================================
    // Table lookup
    // =========================================================================

    /// Runtime state and current descriptor of `name`
    fn store(&self, name: &str) -> Result<(Arc<TableStore>, TableDescriptor)> {
        let desc = self.catalog.describe(name)?;
        let store = self
            .tables
            .read()
            .get(&desc.id)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))?;
        Ok((store, desc))
    }

    /// Like `store`, but the table must be enabled
    fn readable(&self, name: &str) -> Result<(Arc<TableStore>, TableDescriptor)> {
        let (store, desc) = self.store(name)?;
        if !desc.is_enabled() {
            return Err(StoreError::TableDisabled(name.to_string()));
        }
        Ok((store, desc))
    }

    fn table_list(&self) -> Vec<Arc<TableStore>> {
        self.tables.read().values().cloned().collect()
    }

    // =========================================================================
    // Writes
    // =========================================================================

    fn mutate(&self, name: &str, mutation: Mutation) -> Result<()> {
        mutation.validate()?;
        let (store, _) = self.store(name)?;

        let _admitted = store.admit();
        // re-read under the gate: disable may have completed meanwhile
        let desc = self.catalog.describe(name)?;
        if desc.id != store.id() {
            return Err(StoreError::TableNotFound(name.to_string()));
        }
        if !desc.is_enabled() {
            return Err(StoreError::TableDisabled(name.to_string()));
        }
        check_families(&desc, mutation.families())?;

        self.write(&store, mutation)
    }

    /// Log and apply a validated mutation
    fn write(&self, store: &TableStore, mut mutation: Mutation) -> Result<()> {
        let size = {
            let mut wal = self.wal.lock();
            mutation.assign_timestamps(self.timestamps.next());
            let record = WalRecord {
                table_id: store.id(),
                mutation,
            };
            wal.append(&record)?;
            store.apply(record.mutation.cells())
        };

        if size >= self.config.memtable_size_limit {
            self.request_flush();
        }
        Ok(())
    }

    fn request_flush(&self) {
        // full means a signal is already pending
        let _ = self.signals.try_send(Signal::Flush);
    }

    // =========================================================================
    // Reads
    // =========================================================================

    fn get(&self, name: &str, row: &[u8], families: Option<&[String]>) -> Result<Vec<Cell>> {
        let (store, desc) = self.readable(name)?;
        if let Some(families) = families {
            check_families(&desc, families.iter().map(|f| f.as_str()))?;
        }
        let sources = store.row_sources(row)?;
        read_row(sources, &desc.families, families)
    }

    fn scan(self: &Arc<Self>, name: &str, options: ScanOptions) -> Result<Scanner> {
        let (store, desc) = self.readable(name)?;
        if let Some(families) = &options.families {
            check_families(&desc, families.iter().map(|f| f.as_str()))?;
        }

        let reader = TableReader {
            inner: Arc::clone(self),
            store,
            name: name.to_string(),
        };
        Ok(Scanner::new(
            Arc::new(reader),
            options,
            self.config.scan_batch_rows,
        ))
    }

    // =========================================================================
    // Flush
    // =========================================================================

    /// Freeze every non-empty active memtable, flush all frozen ones, and
    /// retire WAL files nothing depends on any more
    fn flush_all(&self) -> Result<()> {
        let _flushing = self.flush_lock.lock();
        self.freeze_all()?;
        self.flush_pending()
    }

    /// Rotate the WAL and freeze active memtables in one step with respect
    /// to writers
    fn freeze_all(&self) -> Result<usize> {
        let tables = self.table_list();
        let mut wal = self.wal.lock();
        if tables.iter().all(|t| t.active_size() == 0) {
            return Ok(0);
        }

        let retired = wal.rotate()?;
        let floor = wal.active_file_id();
        let frozen = tables.iter().filter(|t| t.freeze(floor)).count();

        tracing::debug!("Froze {} memtable(s) after WAL file {}", frozen, retired);
        Ok(frozen)
    }

    /// Flush frozen memtables of every table; caller holds `flush_lock`
    fn flush_pending(&self) -> Result<()> {
        let mut first_error = None;
        for table in self.table_list() {
            if let Err(e) = table.flush_frozen() {
                tracing::warn!("Flush of table '{}' failed: {}", table.name(), e);
                first_error.get_or_insert(e);
            }
        }

        self.retire_wal()?;
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Delete WAL files below the lowest file any memtable still needs
    fn retire_wal(&self) -> Result<()> {
        let tables = self.table_list();
        let mut wal = self.wal.lock();
        let keep_from = tables
            .iter()
            .filter_map(|t| t.wal_floor())
            .min()
            .unwrap_or_else(|| wal.active_file_id());
        if keep_from > 1 {
            wal.retire_through(keep_from - 1)?;
        }
        Ok(())
    }

    /// One round of background work
    fn background_pass(&self) -> Result<()> {
        let tables = self.table_list();
        if tables
            .iter()
            .any(|t| t.active_size() >= self.config.memtable_size_limit)
        {
            self.flush_all()?;
        } else if tables.iter().any(|t| t.frozen_count() > 0) {
            let _flushing = self.flush_lock.lock();
            self.flush_pending()?;
        }

        let mut first_error = None;
        for table in tables.iter().filter(|t| !t.is_dropped()) {
            if let Err(e) = table.compact(&self.config, false) {
                tracing::warn!("Compaction of table '{}' failed: {}", table.name(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Table lifecycle (used by Admin)
    // =========================================================================

    fn create_table(&self, name: &str, families: &[&str]) -> Result<TableDescriptor> {
        // registry held so no caller sees the catalog entry without its store
        let mut tables = self.tables.write();
        let desc = self.catalog.create_table(name, families.iter().copied())?;

        let floor = self.wal.lock().active_file_id();
        let store = TableStore::open(
            &table_dir(&self.tables_dir, desc.id),
            desc.id,
            &desc.name,
            Arc::clone(&self.file_numbers),
            floor,
        );
        match store {
            Ok(store) => {
                tables.insert(desc.id, Arc::new(store));
                Ok(desc)
            }
            Err(e) => {
                // undo the catalog entry; the table never became usable
                let undone = self
                    .catalog
                    .disable(name)
                    .and_then(|()| self.catalog.drop_table(name).map(|_| ()));
                if let Err(undo) = undone {
                    tracing::error!(
                        "Table '{}' left in the catalog after failed create: {}",
                        name,
                        undo
                    );
                }
                Err(e)
            }
        }
    }

    fn disable_table(&self, name: &str) -> Result<()> {
        let (store, _) = self.store(name)?;
        let _quiesced = store.quiesce();
        self.catalog.disable(name)
    }

    fn drop_table(&self, name: &str) -> Result<()> {
        let desc = self.catalog.drop_table(name)?;
        let store = self.tables.write().remove(&desc.id);
        if let Some(store) = store {
            store.mark_dropped();
        }

        let dir = table_dir(&self.tables_dir, desc.id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            // cleaned up on next open
            Err(e) => tracing::warn!("Could not remove {}: {}", dir.display(), e),
        }
        Ok(())
    }

    /// Remove a family and mask its existing cells
    fn remove_family(&self, name: &str, family: &str) -> Result<()> {
        let desc = self.catalog.remove_family(name, family)?;
        let store = self
            .tables
            .read()
            .get(&desc.id)
            .cloned()
            .ok_or_else(|| StoreError::TableNotFound(name.to_string()))?;

        // One tombstone per row with cells in the family, all in one batch
        // so a failure leaves either every row masked or none
        let swept = rows_with_family(&store, family).and_then(|rows| {
            if rows.is_empty() {
                return Ok(());
            }
            self.write(&store, Mutation::family_sweep(family, rows))
        });
        if let Err(e) = swept {
            if let Err(undo) = self.catalog.add_family(name, family) {
                tracing::error!(
                    "Family '{}' of table '{}' removed but its cells are not masked: {}",
                    family,
                    name,
                    undo
                );
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Scan source bound to one table; re-checks the table on every refill
struct TableReader {
    inner: Arc<EngineInner>,
    store: Arc<TableStore>,
    name: String,
}

impl RowSource for TableReader {
    fn snapshot_rows(
        &self,
        start: &[u8],
        stop: Option<&[u8]>,
        max_rows: usize,
    ) -> Result<SourceBatch> {
        let desc = self.inner.catalog.describe(&self.name)?;
        if desc.id != self.store.id() || self.store.is_dropped() {
            return Err(StoreError::TableNotFound(self.name.clone()));
        }
        if !desc.is_enabled() {
            return Err(StoreError::TableDisabled(self.name.clone()));
        }

        let (sources, complete_through) = self.store.range_sources(start, stop, max_rows)?;
        Ok(SourceBatch {
            sources,
            complete_through,
            families: desc.families,
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn check_families<'a>(
    desc: &TableDescriptor,
    families: impl IntoIterator<Item = &'a str>,
) -> Result<()> {
    for family in families {
        if !desc.has_family(family) {
            return Err(StoreError::InvalidFamily {
                table: desc.name.clone(),
                family: family.to_string(),
            });
        }
    }
    Ok(())
}

/// `<tables_dir>/000042`
fn table_dir(tables_dir: &Path, id: u64) -> PathBuf {
    tables_dir.join(format!("{:06}", id))
}

/// Every distinct row holding a cell of `family`, across all sources
fn rows_with_family(store: &TableStore, family: &str) -> Result<BTreeSet<Vec<u8>>> {
    let (sources, _) = store.range_sources(&[], None, usize::MAX)?;
    let mut rows = BTreeSet::new();
    for source in sources {
        for cell in source {
            let cell = cell?;
            if cell.family() == family {
                rows.insert(cell.key.row);
            }
        }
    }
    Ok(rows)
}

/// Delete table directories with no catalog entry (dropped tables whose
/// cleanup was interrupted)
fn remove_orphan_tables(tables_dir: &Path, tables: &HashMap<u64, Arc<TableStore>>) -> Result<()> {
    for entry in fs::read_dir(tables_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let id = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.parse::<u64>().ok());
        if let Some(id) = id {
            if !tables.contains_key(&id) {
                tracing::info!("Removing data of dropped table id {}", id);
                fs::remove_dir_all(&path)?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WalSyncStrategy;
    use tempfile::TempDir;

    fn open_engine(dir: &TempDir) -> Engine {
        Engine::open(
            Config::builder()
                .data_dir(dir.path())
                .wal_sync_strategy(WalSyncStrategy::EveryWrite)
                .background_threads_enabled(false)
                .build(),
        )
        .unwrap()
    }

    #[test]
    fn test_write_with_failed_fsync_has_no_effect() {
        let dir = TempDir::new().unwrap();
        {
            let engine = open_engine(&dir);
            engine.admin().create_table("t", &["cf"]).unwrap();
            engine.put("t", b"a", [("cf", "q", "1")]).unwrap();

            engine.inner.wal.lock().fail_next_sync();
            assert!(engine.put("t", b"b", [("cf", "q", "2")]).is_err());
            assert!(engine.get("t", b"b").unwrap().is_empty());
            assert_eq!(engine.memtable_entry_count("t").unwrap(), 1);

            engine.put("t", b"c", [("cf", "q", "3")]).unwrap();
            // dropped without close: recovery goes through the WAL
        }

        let engine = open_engine(&dir);
        assert_eq!(engine.get("t", b"a").unwrap()[0].value(), b"1");
        assert!(engine.get("t", b"b").unwrap().is_empty());
        assert_eq!(engine.get("t", b"c").unwrap()[0].value(), b"3");
    }

    #[test]
    fn test_removed_family_masks_all_rows_in_one_batch() {
        let dir = TempDir::new().unwrap();
        let engine = open_engine(&dir);
        engine
            .admin()
            .create_table("t", &["cf", "other", "unused"])
            .unwrap();
        for row in ["a", "b", "c"] {
            engine.put("t", row.as_bytes(), [("cf", "q", "v")]).unwrap();
        }
        engine.put("t", b"d", [("other", "q", "v")]).unwrap();
        let lsn = engine.inner.wal.lock().current_lsn();

        engine.admin().disable_table("t").unwrap();
        engine.admin().remove_family("t", "cf").unwrap();
        assert_eq!(engine.inner.wal.lock().current_lsn(), lsn + 1);

        // no cells to mask, nothing logged
        engine.admin().remove_family("t", "unused").unwrap();
        assert_eq!(engine.inner.wal.lock().current_lsn(), lsn + 1);

        engine.admin().enable_table("t").unwrap();
        for row in ["a", "b", "c"] {
            assert!(engine.get("t", row.as_bytes()).unwrap().is_empty());
        }
        assert_eq!(engine.get("t", b"d").unwrap().len(), 1);
    }
}
