//! MemTable implementation
//!
//! BTreeMap-based memtable with RwLock for concurrency.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::cell::{Cell, CellKey};

/// In-memory table for recent writes
pub struct MemTable {
    /// Cell versions in canonical order
    data: RwLock<BTreeMap<CellKey, Vec<u8>>>,

    /// Approximate size in bytes (keys + values)
    size: AtomicUsize,

    /// Oldest cell timestamp ever inserted (`i64::MAX` while empty)
    min_timestamp: AtomicI64,
}

/// Cells of consecutive rows copied out of a memtable
#[derive(Debug, Default)]
pub struct RowRange {
    /// Cells in canonical order
    pub cells: Vec<Cell>,

    /// Set when the copy stopped at the row limit: rows after this one may
    /// exist in the memtable but were not copied
    pub last_complete_row: Option<Vec<u8>>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new() -> Self {
        Self {
            data: RwLock::new(BTreeMap::new()),
            size: AtomicUsize::new(0),
            min_timestamp: AtomicI64::new(i64::MAX),
        }
    }

    /// Insert every cell of a batch under one write lock
    ///
    /// Returns the new approximate size.
    pub fn apply(&self, cells: &[Cell]) -> usize {
        let mut data = self.data.write();
        let mut added = 0usize;
        let mut removed = 0usize;

        if let Some(oldest) = cells.iter().map(Cell::timestamp).min() {
            self.min_timestamp.fetch_min(oldest, Ordering::Relaxed);
        }
        for cell in cells {
            added += cell.encoded_len();
            if let Some(old) = data.insert(cell.key.clone(), cell.value.clone()) {
                // Same key rewritten: only the old value's bytes go away
                removed += cell.key.encoded_len() + old.len();
            }
        }

        let delta = added as isize - removed as isize;
        if delta >= 0 {
            self.size.fetch_add(delta as usize, Ordering::Relaxed) + delta as usize
        } else {
            let shrink = (-delta) as usize;
            self.size.fetch_sub(shrink, Ordering::Relaxed) - shrink
        }
    }

    /// Insert a single cell
    pub fn insert(&self, cell: Cell) -> usize {
        self.apply(std::slice::from_ref(&cell))
    }

    /// All versions of one row, in canonical order
    pub fn row(&self, row: &[u8]) -> Vec<Cell> {
        let data = self.data.read();
        data.range(CellKey::first_of_row(row)..)
            .take_while(|(key, _)| key.row == row)
            .map(|(key, value)| Cell {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Copy the cells of up to `max_rows` rows starting at `start`
    /// (inclusive) and ending before `stop` (exclusive)
    pub fn range_rows(&self, start: &[u8], stop: Option<&[u8]>, max_rows: usize) -> RowRange {
        let data = self.data.read();
        let mut range = RowRange::default();
        let mut rows_seen = 0usize;

        let lower = Bound::Included(CellKey::first_of_row(start));
        for (key, value) in data.range((lower, Bound::Unbounded)) {
            if let Some(stop) = stop {
                if key.row.as_slice() >= stop {
                    break;
                }
            }

            let new_row = range.cells.last().map_or(true, |c| c.key.row != key.row);
            if new_row {
                if rows_seen == max_rows {
                    range.last_complete_row = range.cells.last().map(|c| c.key.row.clone());
                    break;
                }
                rows_seen += 1;
            }

            range.cells.push(Cell {
                key: key.clone(),
                value: value.clone(),
            });
        }

        range
    }

    /// Immutable copy of every cell, in canonical order (for flush)
    pub fn snapshot(&self) -> Vec<Cell> {
        let data = self.data.read();
        data.iter()
            .map(|(key, value)| Cell {
                key: key.clone(),
                value: value.clone(),
            })
            .collect()
    }

    /// Get approximate size in bytes
    pub fn size(&self) -> usize {
        self.size.load(Ordering::Relaxed)
    }

    /// Oldest timestamp of any cell inserted, `i64::MAX` if none
    pub fn min_timestamp(&self) -> i64 {
        self.min_timestamp.load(Ordering::Relaxed)
    }

    /// Get entry count (cell versions, tombstones included)
    pub fn entry_count(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Check if should flush (size >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.size() >= size_limit
    }
}

impl Default for MemTable {
    fn default() -> Self {
        Self::new()
    }
}
