//! Range scans
//!
//! A [`Scanner`] pulls rows in batches. Each refill takes a fresh snapshot
//! of the table's sources starting at the first row not yet returned, so a
//! long scan never pins memtables or segments for its whole lifetime and
//! always sees a consistent merge per row.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;

use crate::cell::RowResult;
use crate::error::Result;

use super::merge::{CellSource, MergingIterator, RowGroups};
use super::resolve::resolve_row;

/// Sorted sources covering a row range, captured at one instant
pub struct SourceBatch {
    /// Highest priority first
    pub sources: Vec<CellSource>,

    /// Rows after this key may be missing from the memory sources of this
    /// batch and must be read in a later batch
    pub complete_through: Option<Vec<u8>>,

    /// Families visible at snapshot time
    pub families: BTreeSet<String>,
}

/// Something a [`Scanner`] can read rows from
pub trait RowSource: Send + Sync {
    /// Snapshot sources for rows in `[start, stop)`, holding at least
    /// `max_rows` rows from memory when that many exist
    ///
    /// Fails if the table is no longer readable.
    fn snapshot_rows(&self, start: &[u8], stop: Option<&[u8]>, max_rows: usize)
        -> Result<SourceBatch>;
}

/// Row range and column filter of a scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    /// First row, inclusive
    pub start_row: Option<Vec<u8>>,
    /// Last row, exclusive
    pub stop_row: Option<Vec<u8>>,
    /// Only these families; all when `None`
    pub families: Option<Vec<String>>,
}

impl ScanOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(mut self, row: impl Into<Vec<u8>>) -> Self {
        self.start_row = Some(row.into());
        self
    }

    pub fn stop(mut self, row: impl Into<Vec<u8>>) -> Self {
        self.stop_row = Some(row.into());
        self
    }

    pub fn family(mut self, family: impl Into<String>) -> Self {
        self.families
            .get_or_insert_with(Vec::new)
            .push(family.into());
        self
    }
}

/// Lazy, ascending sequence of non-empty rows
///
/// Dropping a scanner at any point releases everything it holds.
pub struct Scanner {
    source: Arc<dyn RowSource>,
    /// Next row to read from (inclusive)
    cursor: Vec<u8>,
    stop: Option<Vec<u8>>,
    families: Option<Vec<String>>,
    batch_rows: usize,
    buffer: VecDeque<RowResult>,
    /// Last row handed to the caller
    last_returned: Option<Vec<u8>>,
    done: bool,
}

impl Scanner {
    pub fn new(source: Arc<dyn RowSource>, options: ScanOptions, batch_rows: usize) -> Self {
        Self {
            source,
            cursor: options.start_row.unwrap_or_default(),
            stop: options.stop_row,
            families: options.families,
            batch_rows: batch_rows.max(1),
            buffer: VecDeque::new(),
            last_returned: None,
            done: false,
        }
    }

    /// Start row that resumes this scan right after the last row returned
    pub fn resume_row(&self) -> Option<Vec<u8>> {
        self.last_returned.as_deref().map(row_successor)
    }

    fn refill(&mut self) -> Result<()> {
        let batch = self
            .source
            .snapshot_rows(&self.cursor, self.stop.as_deref(), self.batch_rows)?;
        let bound = batch.complete_through;

        let mut assembled = 0usize;
        let mut last_row: Option<Vec<u8>> = None;
        let mut more = false;
        let mut reached_stop = false;

        for group in RowGroups::new(MergingIterator::new(batch.sources)) {
            let (row, cells) = group?;

            if let Some(stop) = &self.stop {
                if row >= *stop {
                    reached_stop = true;
                    break;
                }
            }
            if bound.as_ref().map_or(false, |b| row > *b) || assembled == self.batch_rows {
                more = true;
                break;
            }

            let visible = resolve_row(&cells, &batch.families, self.families.as_deref());
            if !visible.is_empty() {
                self.buffer.push_back(RowResult::new(row.clone(), visible));
            }
            assembled += 1;
            last_row = Some(row);
        }

        // a truncated memory copy may hide rows past the end of this stream
        if !reached_stop && bound.is_some() {
            more = true;
        }

        if more {
            self.cursor = match (last_row, bound) {
                (Some(row), _) => row_successor(&row),
                (None, Some(bound)) => row_successor(&bound),
                (None, None) => {
                    self.done = true;
                    return Ok(());
                }
            };
        } else {
            self.done = true;
        }
        Ok(())
    }
}

impl Iterator for Scanner {
    type Item = Result<RowResult>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(row) = self.buffer.pop_front() {
                self.last_returned = Some(row.row().to_vec());
                return Some(Ok(row));
            }
            if self.done {
                return None;
            }
            if let Err(e) = self.refill() {
                self.done = true;
                return Some(Err(e));
            }
        }
    }
}

/// Smallest row key strictly greater than `row`
pub fn row_successor(row: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(row.len() + 1);
    next.extend_from_slice(row);
    next.push(0);
    next
}
