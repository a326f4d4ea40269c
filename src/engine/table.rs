//! Per-table runtime state
//!
//! ```text
//! TableStore
//!  ├── memtables (RwLock, held only to swap pointers or publish a compaction)
//!  │    ├── active            receives mutations
//!  │    └── frozen [old..new] waiting for flush
//!  ├── segments              SegmentManager, newest first
//!  └── gate (RwLock<()>)     shared by mutations, exclusive for disable
//! ```
//! Readers capture memtables before segments. A frozen memtable is only
//! released after the segment holding its cells is published, so every
//! cell is visible in at least one captured source at all times.

use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::cell::{now_millis, Cell};
use crate::config::Config;
use crate::error::Result;
use crate::memtable::MemTable;
use crate::query::{memory_source, CellSource};
use crate::storage::{compact_segments, needs_compaction, CompactionStats, SegmentManager, SegmentReader};

/// A memtable that no longer takes writes
struct FrozenMemTable {
    memtable: Arc<MemTable>,
    /// Lowest WAL file id that may hold its cells
    wal_floor: u64,
}

struct MemTables {
    active: Arc<MemTable>,
    /// Lowest WAL file id that may hold cells of `active`
    active_floor: u64,
    /// Oldest first
    frozen: Vec<FrozenMemTable>,
}

/// Runtime state of one table
pub(crate) struct TableStore {
    id: u64,
    name: String,
    memtables: RwLock<MemTables>,
    segments: SegmentManager,
    /// Mutations hold this shared; disable takes it exclusively so it
    /// returns only after in-flight mutations finish
    gate: RwLock<()>,
    flush_lock: Mutex<()>,
    compaction_lock: Mutex<()>,
    dropped: AtomicBool,
}

impl TableStore {
    /// Open the table's segment directory
    ///
    /// `wal_floor` is the first WAL file whose records may land in the new
    /// active memtable.
    pub fn open(
        dir: &Path,
        id: u64,
        name: &str,
        file_numbers: Arc<AtomicU64>,
        wal_floor: u64,
    ) -> Result<Self> {
        Ok(Self {
            id,
            name: name.to_string(),
            memtables: RwLock::new(MemTables {
                active: Arc::new(MemTable::new()),
                active_floor: wal_floor,
                frozen: Vec::new(),
            }),
            segments: SegmentManager::open(dir, file_numbers)?,
            gate: RwLock::new(()),
            flush_lock: Mutex::new(()),
            compaction_lock: Mutex::new(()),
            dropped: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn segments(&self) -> &SegmentManager {
        &self.segments
    }

    // =========================================================================
    // Admission
    // =========================================================================

    /// Held by a mutation for its whole duration
    pub fn admit(&self) -> RwLockReadGuard<'_, ()> {
        self.gate.read()
    }

    /// Waits for admitted mutations and blocks new ones while held
    pub fn quiesce(&self) -> RwLockWriteGuard<'_, ()> {
        self.gate.write()
    }

    pub fn mark_dropped(&self) {
        self.dropped.store(true, Ordering::Release);
        self.segments.mark_all_obsolete();
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped.load(Ordering::Acquire)
    }

    // =========================================================================
    // Memtables
    // =========================================================================

    /// Insert a batch into the active memtable; returns its new size
    pub fn apply(&self, cells: &[Cell]) -> usize {
        let memtables = self.memtables.read();
        memtables.active.apply(cells)
    }

    pub fn active_size(&self) -> usize {
        self.memtables.read().active.size()
    }

    /// Cells held in memory across active and frozen memtables
    pub fn memtable_entry_count(&self) -> usize {
        let memtables = self.memtables.read();
        memtables.active.entry_count()
            + memtables
                .frozen
                .iter()
                .map(|f| f.memtable.entry_count())
                .sum::<usize>()
    }

    pub fn frozen_count(&self) -> usize {
        self.memtables.read().frozen.len()
    }

    /// Retire the active memtable if it holds anything
    ///
    /// Must be called right after a WAL rotation, with appends blocked;
    /// `next_floor` is the id of the new WAL file.
    pub fn freeze(&self, next_floor: u64) -> bool {
        let mut memtables = self.memtables.write();
        if memtables.active.is_empty() {
            memtables.active_floor = next_floor;
            return false;
        }

        let retired = std::mem::replace(&mut memtables.active, Arc::new(MemTable::new()));
        let wal_floor = std::mem::replace(&mut memtables.active_floor, next_floor);
        memtables.frozen.push(FrozenMemTable {
            memtable: retired,
            wal_floor,
        });
        true
    }

    /// Lowest WAL file id still needed by this table, if any
    pub fn wal_floor(&self) -> Option<u64> {
        let memtables = self.memtables.read();
        let frozen = memtables.frozen.iter().map(|f| f.wal_floor).min();
        let active = (!memtables.active.is_empty()).then_some(memtables.active_floor);
        match (frozen, active) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Oldest cell timestamp held in any memtable, `i64::MAX` if none
    fn memtable_min_timestamp(memtables: &MemTables) -> i64 {
        memtables
            .frozen
            .iter()
            .map(|f| f.memtable.min_timestamp())
            .fold(memtables.active.min_timestamp(), i64::min)
    }

    /// Newest cell timestamp in any segment (0 if there are none)
    pub fn max_timestamp(&self) -> i64 {
        self.segments
            .snapshot()
            .iter()
            .map(|s| s.max_timestamp())
            .max()
            .unwrap_or(0)
    }

    /// Active first, then frozen newest first
    fn memtable_snapshot(&self) -> Vec<Arc<MemTable>> {
        let memtables = self.memtables.read();
        let mut all = Vec::with_capacity(memtables.frozen.len() + 1);
        all.push(Arc::clone(&memtables.active));
        all.extend(memtables.frozen.iter().rev().map(|f| Arc::clone(&f.memtable)));
        all
    }

    // =========================================================================
    // Read sources
    // =========================================================================

    /// Sources holding cells of `row`, highest priority first
    pub fn row_sources(&self, row: &[u8]) -> Result<Vec<CellSource>> {
        let memtables = self.memtable_snapshot();
        let segments = self.segments.snapshot();

        let mut sources = Vec::with_capacity(memtables.len() + segments.len());
        for memtable in &memtables {
            sources.push(memory_source(memtable.row(row)));
        }
        for segment in segments.iter().filter(|s| s.might_contain_row(row)) {
            sources.push(memory_source(segment.row(row)?));
        }
        Ok(sources)
    }

    /// Sources for rows in `[start, stop)` plus the row through which the
    /// memory copies are complete
    pub fn range_sources(
        &self,
        start: &[u8],
        stop: Option<&[u8]>,
        max_rows: usize,
    ) -> Result<(Vec<CellSource>, Option<Vec<u8>>)> {
        let memtables = self.memtable_snapshot();
        let segments = self.segments.snapshot();

        let mut sources: Vec<CellSource> = Vec::with_capacity(memtables.len() + segments.len());
        let mut bound: Option<Vec<u8>> = None;
        for memtable in &memtables {
            let range = memtable.range_rows(start, stop, max_rows);
            if let Some(last) = range.last_complete_row {
                bound = Some(match bound {
                    Some(current) if current <= last => current,
                    _ => last,
                });
            }
            sources.push(memory_source(range.cells));
        }
        for segment in segments.iter().filter(|s| s.overlaps(start, stop)) {
            sources.push(Box::new(segment.range(start, stop)?));
        }
        Ok((sources, bound))
    }

    // =========================================================================
    // Flush & compaction
    // =========================================================================

    /// Write every frozen memtable out as a segment, oldest first
    ///
    /// A frozen memtable is released only after its segment is published.
    /// On error the remaining ones stay queued.
    pub fn flush_frozen(&self) -> Result<usize> {
        let _flushing = self.flush_lock.lock();
        let mut flushed = 0;

        loop {
            if self.is_dropped() {
                break;
            }

            let oldest = {
                let memtables = self.memtables.read();
                memtables.frozen.first().map(|f| Arc::clone(&f.memtable))
            };
            let memtable = match oldest {
                Some(memtable) => memtable,
                None => break,
            };

            let cells = memtable.snapshot();
            if !cells.is_empty() {
                let segment = self.segments.flush(&cells)?;
                tracing::debug!(
                    "Table '{}': flushed {} cells ({} bytes) as segment seq {}",
                    self.name,
                    cells.len(),
                    memtable.size(),
                    segment.sequence()
                );
            }

            self.memtables
                .write()
                .frozen
                .retain(|f| !Arc::ptr_eq(&f.memtable, &memtable));
            flushed += 1;
        }

        Ok(flushed)
    }

    /// Merge all segments into one
    ///
    /// Without `force` this only runs when a trigger is reached. Returns
    /// `None` when nothing was done.
    ///
    /// Tombstones are purged only below a horizon older than every cell in
    /// the memtables. If cells that a purged tombstone may have masked show
    /// up outside the inputs meanwhile (a write with an old timestamp, or a
    /// segment flushed during the merge) the output is discarded.
    pub fn compact(&self, config: &Config, force: bool) -> Result<Option<CompactionStats>> {
        let _compacting = self.compaction_lock.lock();

        let retention = i64::try_from(config.tombstone_retention.as_millis()).unwrap_or(i64::MAX);
        let memtable_min = Self::memtable_min_timestamp(&self.memtables.read());
        let horizon = now_millis().saturating_sub(retention).min(memtable_min);

        let inputs = self.segments.snapshot();
        let bytes: u64 = inputs.iter().map(|s| s.file_size()).sum();
        let due = if force {
            !inputs.is_empty()
        } else {
            needs_compaction(inputs.len(), bytes, config)
        };
        if !due || self.is_dropped() {
            return Ok(None);
        }

        let (meta, stats) = compact_segments(&self.segments, &inputs, horizon)?;
        let output = match meta {
            Some(meta) => Some(Arc::new(SegmentReader::open(&meta.path)?)),
            None => None,
        };

        {
            // blocks writes and frozen memtable release while swapping
            let memtables = self.memtables.write();
            let conflict = stats.purged_tombstones > 0
                && (Self::memtable_min_timestamp(&memtables) < horizon
                    || self.has_segments_besides(&inputs));
            if self.is_dropped() || conflict {
                if let Some(output) = &output {
                    output.mark_obsolete();
                }
                if conflict {
                    tracing::debug!(
                        "Table '{}': compaction output discarded, cells below horizon {} arrived meanwhile",
                        self.name,
                        horizon
                    );
                }
                return Ok(None);
            }
            self.segments.replace(&inputs, output);
        }

        tracing::info!(
            "Table '{}': compacted {} segment(s), {} -> {} cells, {} versions dropped, {} tombstones purged",
            self.name,
            stats.input_segments,
            stats.input_cells,
            stats.output_cells,
            stats.dropped_versions,
            stats.purged_tombstones
        );
        Ok(Some(stats))
    }

    /// Whether a segment not in `inputs` has been published
    fn has_segments_besides(&self, inputs: &[Arc<SegmentReader>]) -> bool {
        let current = self.segments.snapshot();
        current
            .iter()
            .any(|s| !inputs.iter().any(|i| i.file_number() == s.file_number()))
    }
}
