//! Cell Module
//!
//! Canonical ordering and data types shared by every layer.
//!
//! ## Ordering
//! ```text
//! (row asc, family asc, qualifier asc, timestamp desc, kind)
//! ```
//! The newest version of a column sorts first. Within one timestamp,
//! tombstones sort before puts.
//!
//! ## Tombstones
//! A tombstone at timestamp T masks every put in its scope whose timestamp
//! is <= T:
//! - `DeleteRow`: the whole row (empty family, empty qualifier)
//! - `DeleteFamily`: one family of the row (empty qualifier)
//! - `DeleteColumn`: one (family, qualifier)

mod key;
mod mutation;
mod row;
mod timestamp;

pub use key::{Cell, CellKey, CellKind};
pub use mutation::Mutation;
pub use row::RowResult;
pub use timestamp::{now_millis, TimestampOracle};

use crate::error::{Result, StoreError};

/// Timestamp placeholder meaning "assign at write time"
pub const LATEST_TIMESTAMP: i64 = i64::MAX;

/// Longest family name a segment entry can record
pub const MAX_FAMILY_NAME_LEN: usize = u16::MAX as usize;

/// Check that a column family name can be stored in the catalog and used
/// in cell keys. The empty name is reserved for row tombstones.
pub fn validate_family_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidArgument(
            "column family name must not be empty".to_string(),
        ));
    }
    if name.len() > MAX_FAMILY_NAME_LEN {
        return Err(StoreError::InvalidArgument(format!(
            "column family name of {} bytes exceeds {} bytes",
            name.len(),
            MAX_FAMILY_NAME_LEN
        )));
    }
    if name.contains(':') || name.chars().any(char::is_control) {
        return Err(StoreError::InvalidArgument(format!(
            "invalid column family name: {:?}",
            name
        )));
    }
    Ok(())
}
