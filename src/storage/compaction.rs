//! Compaction
//!
//! Merges every segment of a table into one, keeping only what a read
//! could still observe.
//!
//! ## Rules (per row)
//! - Identical keys: the copy from the higher-sequence segment wins
//! - Each column keeps only its newest put, and only if no tombstone masks it
//! - Each tombstone scope keeps only its newest tombstone
//! - Tombstones older than the retention horizon are purged together with
//!   everything they mask; younger ones are carried forward
//!
//! ```text
//!   seg 9 ─┐
//!   seg 7 ─┼─▶ MergingIterator ─▶ RowGroups ─▶ compact_row ─▶ new segment
//!   seg 4 ─┘                                                 (seq 9)
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use crate::cell::{Cell, CellKind};
use crate::config::Config;
use crate::error::Result;
use crate::query::{CellSource, MergingIterator, RowGroups, Tombstones};

use super::segment::{SegmentBuilder, SegmentMeta, SegmentReader};
use super::SegmentManager;

/// Counters from one compaction run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CompactionStats {
    pub input_segments: usize,
    pub input_cells: u64,
    pub output_cells: u64,
    /// Older versions and masked puts removed
    pub dropped_versions: u64,
    /// Tombstones past the retention horizon removed
    pub purged_tombstones: u64,
}

/// Whether a table's segment set has reached a compaction trigger
///
/// Fires on segment count, or on total size once at least two segments
/// exist.
pub fn needs_compaction(segment_count: usize, total_bytes: u64, config: &Config) -> bool {
    segment_count >= config.compaction_segment_trigger
        || (segment_count >= 2 && total_bytes >= config.compaction_size_trigger)
}

/// Merge `inputs` into a single segment written through `manager`
///
/// `inputs` must be ordered newest first. The output takes the highest
/// input sequence so it ranks exactly where its newest input did. Returns
/// `None` for the output when nothing survives; the caller publishes the
/// result with [`SegmentManager::replace`].
pub fn compact_segments(
    manager: &SegmentManager,
    inputs: &[Arc<SegmentReader>],
    horizon: i64,
) -> Result<(Option<SegmentMeta>, CompactionStats)> {
    let mut stats = CompactionStats {
        input_segments: inputs.len(),
        input_cells: inputs.iter().map(|s| s.entry_count()).sum(),
        ..Default::default()
    };

    let sequence = inputs.iter().map(|s| s.sequence()).max().unwrap_or(0);
    let mut sources: Vec<CellSource> = Vec::with_capacity(inputs.len());
    for segment in inputs {
        sources.push(Box::new(segment.iter()?));
    }

    let path = manager.segment_path(manager.next_file_number());
    let mut builder = SegmentBuilder::new(&path, sequence)?;
    for row in RowGroups::new(MergingIterator::new(sources)) {
        let (_, cells) = row?;
        for cell in compact_row(&cells, horizon, &mut stats) {
            builder.add(&cell)?;
        }
    }
    stats.output_cells = builder.entry_count();

    if stats.output_cells == 0 {
        // dropping the builder discards its temp file
        return Ok((None, stats));
    }
    Ok((Some(builder.finish()?), stats))
}

/// Surviving cells of one row, in canonical order
pub fn compact_row(cells: &[Cell], horizon: i64, stats: &mut CompactionStats) -> Vec<Cell> {
    let tombstones = Tombstones::collect(cells);
    let mut kept = Vec::with_capacity(cells.len());
    let mut scopes: HashSet<(CellKind, &str, &[u8])> = HashSet::new();
    let mut last_column: Option<(&str, &[u8])> = None;

    for cell in cells {
        if cell.is_tombstone() {
            // first seen is the newest of its scope
            if !scopes.insert((cell.kind(), cell.family(), cell.qualifier())) {
                stats.dropped_versions += 1;
            } else if cell.timestamp() < horizon {
                stats.purged_tombstones += 1;
            } else {
                kept.push(cell.clone());
            }
            continue;
        }

        let column = (cell.family(), cell.qualifier());
        if last_column == Some(column) || tombstones.masks(cell) {
            last_column = Some(column);
            stats.dropped_versions += 1;
            continue;
        }
        last_column = Some(column);
        kept.push(cell.clone());
    }

    kept
}
