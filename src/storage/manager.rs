//! Segment Manager
//!
//! Owns the segment set of one table and publishes changes to it.
//!
//! ## Responsibilities
//! - Discover existing segments on startup, discarding unfinished ones
//! - Write memtable snapshots out as new segments
//! - Swap compaction inputs for their output in one step
//! - Hand readers a stable snapshot of the segment set

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cell::Cell;
use crate::error::Result;

use super::segment::{
    parse_file_number, segment_file_name, SegmentBuilder, SegmentMeta, SegmentReader,
    TEMP_EXTENSION,
};

/// Immutable view of a table's segments, newest (highest sequence) first
pub type SegmentSet = Arc<Vec<Arc<SegmentReader>>>;

/// Manages the segments of one table
///
/// ## Concurrency:
/// - `segments`: RwLock around an `Arc` snapshot; readers clone the `Arc`
///   and release the lock immediately, writers build a new vector and swap
/// - `file_numbers`: store-wide atomic counter shared by all tables
/// - All methods use `&self`
pub struct SegmentManager {
    /// Directory holding this table's segment files
    dir: PathBuf,

    /// Live segments ordered newest -> oldest
    segments: RwLock<SegmentSet>,

    /// Next file number, shared across the store
    file_numbers: Arc<AtomicU64>,
}

impl SegmentManager {
    /// Open or create the segment directory of a table
    ///
    /// On startup:
    /// 1. Create directory if it doesn't exist
    /// 2. Delete leftover `.tmp` files from interrupted writes
    /// 3. Open readers for each segment (loads row indexes into RAM)
    /// 4. Order by sequence descending
    /// 5. Move the shared file number counter past every number seen
    pub fn open(dir: &Path, file_numbers: Arc<AtomicU64>) -> Result<Self> {
        fs::create_dir_all(dir)?;

        let mut readers = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }

            if path.extension().map_or(false, |ext| ext == TEMP_EXTENSION) {
                tracing::warn!("Removing unfinished segment {}", path.display());
                fs::remove_file(&path)?;
                continue;
            }

            if let Some(number) = parse_file_number(&path) {
                readers.push(Arc::new(SegmentReader::open(&path)?));
                file_numbers.fetch_max(number + 1, Ordering::SeqCst);
            }
        }

        sort_newest_first(&mut readers);
        tracing::debug!("Opened {} segment(s) in {}", readers.len(), dir.display());

        Ok(Self {
            dir: dir.to_path_buf(),
            segments: RwLock::new(Arc::new(readers)),
            file_numbers,
        })
    }

    /// Current segment set; unaffected by later flushes or compactions
    pub fn snapshot(&self) -> SegmentSet {
        Arc::clone(&self.segments.read())
    }

    /// Write sorted cells as a new segment and publish it
    ///
    /// The new segment's sequence is its file number, so it ranks above
    /// every segment the table already has.
    pub fn flush(&self, cells: &[Cell]) -> Result<Arc<SegmentReader>> {
        let file_number = self.next_file_number();
        let meta = self.write(file_number, file_number, cells.iter().map(|c| Ok(c.clone())))?;
        let reader = Arc::new(SegmentReader::open(&meta.path)?);

        {
            let mut segments = self.segments.write();
            let mut next = segments.as_ref().clone();
            next.push(Arc::clone(&reader));
            sort_newest_first(&mut next);
            *segments = Arc::new(next);
        }

        tracing::debug!(
            "Flushed {} cells to segment {} (seq {})",
            meta.entry_count,
            meta.path.display(),
            meta.sequence
        );
        Ok(reader)
    }

    /// Write a segment without publishing it
    ///
    /// Cells must already be in strictly increasing key order.
    pub fn write<I>(&self, file_number: u64, sequence: u64, cells: I) -> Result<SegmentMeta>
    where
        I: IntoIterator<Item = Result<Cell>>,
    {
        let path = self.segment_path(file_number);
        let mut builder = SegmentBuilder::new(&path, sequence)?;
        for cell in cells {
            builder.add(&cell?)?;
        }
        builder.finish()
    }

    /// Replace `inputs` with `output` in one step
    ///
    /// Readers holding an older snapshot keep the inputs readable; their
    /// files are removed once the last snapshot drops.
    pub fn replace(&self, inputs: &[Arc<SegmentReader>], output: Option<Arc<SegmentReader>>) {
        let retired: HashSet<u64> = inputs.iter().map(|s| s.file_number()).collect();

        {
            let mut segments = self.segments.write();
            let mut next: Vec<_> = segments
                .iter()
                .filter(|s| !retired.contains(&s.file_number()))
                .cloned()
                .collect();
            next.extend(output);
            sort_newest_first(&mut next);
            *segments = Arc::new(next);
        }

        for input in inputs {
            input.mark_obsolete();
        }
    }

    /// Mark every segment for deletion (table dropped)
    pub fn mark_all_obsolete(&self) {
        let mut segments = self.segments.write();
        for segment in segments.iter() {
            segment.mark_obsolete();
        }
        *segments = Arc::new(Vec::new());
    }

    /// Reserve a store-wide unique file number
    pub fn next_file_number(&self) -> u64 {
        self.file_numbers.fetch_add(1, Ordering::SeqCst)
    }

    pub fn segment_count(&self) -> usize {
        self.segments.read().len()
    }

    /// Total size of all live segment files
    pub fn total_bytes(&self) -> u64 {
        self.segments.read().iter().map(|s| s.file_size()).sum()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a segment with the given file number
    pub fn segment_path(&self, file_number: u64) -> PathBuf {
        self.dir.join(segment_file_name(file_number))
    }
}

/// Sequence descending; file number breaks ties
fn sort_newest_first(segments: &mut [Arc<SegmentReader>]) {
    segments.sort_by(|a, b| {
        b.sequence()
            .cmp(&a.sequence())
            .then_with(|| b.file_number().cmp(&a.file_number()))
    });
}
