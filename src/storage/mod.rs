//! Storage Module
//!
//! Persistent, immutable sorted segments per table.
//!
//! ## Responsibilities
//! - Write memtable snapshots out as segments
//! - Point reads by row and ordered range reads
//! - Compaction of a table's segments into one
//!
//! ## Layout
//! ```text
//! <data_dir>/tables/
//! ├── 000001/                  one directory per table id
//! │   ├── segment_000003.seg
//! │   └── segment_000007.seg
//! └── 000002/
//!     └── segment_000005.seg
//! ```
//! File numbers are unique across the store. A segment's sequence (stored
//! in its header) orders it by recency within its table.

mod compaction;
mod manager;
mod segment;

pub use compaction::{compact_row, compact_segments, needs_compaction, CompactionStats};
pub use manager::{SegmentManager, SegmentSet};
pub use segment::{
    parse_file_number, segment_file_name, SegmentBuilder, SegmentIterator, SegmentMeta,
    SegmentReader,
};
