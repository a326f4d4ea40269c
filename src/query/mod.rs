//! Query Engine
//!
//! Reads merge every source of a table: the active memtable, frozen
//! memtables awaiting flush, and segments, in that priority order.
//!
//! ```text
//!  active ──┐
//!  frozen ──┤                     ┌──────────────┐
//!  seg 9  ──┼─▶ MergingIterator ─▶│ resolve_row  │─▶ newest live cell
//!  seg 4  ──┘   (k-way, dedup)    │ (tombstones) │   per column
//!                                 └──────────────┘
//! ```
//!
//! Point reads use the same merge restricted to one row; scans group the
//! merged stream into rows and refill in batches.

mod merge;
mod resolve;
mod scan;

use std::collections::BTreeSet;

use crate::cell::Cell;
use crate::error::Result;

pub use merge::{memory_source, CellSource, MergingIterator, RowGroups};
pub use resolve::{resolve_row, Tombstones};
pub use scan::{row_successor, RowSource, ScanOptions, Scanner, SourceBatch};

/// Merge the sources of a single row and resolve the visible cells
pub fn read_row(
    sources: Vec<CellSource>,
    schema: &BTreeSet<String>,
    requested: Option<&[String]>,
) -> Result<Vec<Cell>> {
    let cells = MergingIterator::new(sources).collect::<Result<Vec<Cell>>>()?;
    Ok(resolve_row(&cells, schema, requested))
}
