//! MemTable Module
//!
//! In-memory data structure for recent writes of one table.
//!
//! ## Responsibilities
//! - Fast reads and writes in memory
//! - Atomic application of a whole mutation batch
//! - Track size for flush triggers
//! - Ordered iteration for segment creation
//!
//! ## Data Structure Choice
//! BTreeMap keyed by [`CellKey`](crate::cell::CellKey) wrapped in RwLock:
//! - Ordered keys (required for segment generation and scans)
//! - A batch is inserted under one write lock, so no reader sees half of it
//! - Readers copy what they need under the read lock and release it, which
//!   gives every read a consistent, sorted view

mod table;

pub use table::{MemTable, RowRange};
