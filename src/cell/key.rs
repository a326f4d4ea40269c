//! Cell keys and cells
//!
//! The ordering implemented here is the single source of truth for the
//! memtable, segment files, the merge iterator and compaction.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Type of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum CellKind {
    /// Masks every column of the row
    DeleteRow = 0,
    /// Masks every column of one family
    DeleteFamily = 1,
    /// Masks every version of one column
    DeleteColumn = 2,
    /// A live value
    Put = 3,
}

impl CellKind {
    /// Whether this kind marks a logical deletion
    pub fn is_tombstone(self) -> bool {
        self != CellKind::Put
    }

    /// Decode the on-disk tag
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CellKind::DeleteRow),
            1 => Some(CellKind::DeleteFamily),
            2 => Some(CellKind::DeleteColumn),
            3 => Some(CellKind::Put),
            _ => None,
        }
    }
}

/// Full ordering key of one cell version
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellKey {
    pub row: Vec<u8>,
    pub family: String,
    pub qualifier: Vec<u8>,
    pub timestamp: i64,
    pub kind: CellKind,
}

impl CellKey {
    /// Smallest possible key of `row`; seeking here lands on the row's
    /// first cell, whatever its kind.
    pub fn first_of_row(row: &[u8]) -> Self {
        Self {
            row: row.to_vec(),
            family: String::new(),
            qualifier: Vec::new(),
            timestamp: i64::MAX,
            kind: CellKind::DeleteRow,
        }
    }

    /// Approximate in-memory footprint of the key
    pub fn encoded_len(&self) -> usize {
        self.row.len() + self.family.len() + self.qualifier.len() + 8 + 1
    }

    /// Whether `self` and `other` address the same column
    pub fn same_column(&self, other: &CellKey) -> bool {
        self.row == other.row && self.family == other.family && self.qualifier == other.qualifier
    }
}

impl Ord for CellKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.row
            .cmp(&other.row)
            .then_with(|| self.family.as_bytes().cmp(other.family.as_bytes()))
            .then_with(|| self.qualifier.cmp(&other.qualifier))
            // Newest version first
            .then_with(|| other.timestamp.cmp(&self.timestamp))
            .then_with(|| self.kind.cmp(&other.kind))
    }
}

impl PartialOrd for CellKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A single versioned (row, family, qualifier, timestamp) -> value entry
///
/// Tombstones carry an empty value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cell {
    pub key: CellKey,
    pub value: Vec<u8>,
}

impl Cell {
    /// Create a live cell
    pub fn put(
        row: impl Into<Vec<u8>>,
        family: impl Into<String>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: i64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            key: CellKey {
                row: row.into(),
                family: family.into(),
                qualifier: qualifier.into(),
                timestamp,
                kind: CellKind::Put,
            },
            value: value.into(),
        }
    }

    /// Create a tombstone of the given kind
    pub fn tombstone(
        kind: CellKind,
        row: impl Into<Vec<u8>>,
        family: impl Into<String>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: i64,
    ) -> Self {
        debug_assert!(kind.is_tombstone());
        Self {
            key: CellKey {
                row: row.into(),
                family: family.into(),
                qualifier: qualifier.into(),
                timestamp,
                kind,
            },
            value: Vec::new(),
        }
    }

    pub fn row(&self) -> &[u8] {
        &self.key.row
    }

    pub fn family(&self) -> &str {
        &self.key.family
    }

    pub fn qualifier(&self) -> &[u8] {
        &self.key.qualifier
    }

    pub fn timestamp(&self) -> i64 {
        self.key.timestamp
    }

    pub fn kind(&self) -> CellKind {
        self.key.kind
    }

    pub fn value(&self) -> &[u8] {
        &self.value
    }

    pub fn is_tombstone(&self) -> bool {
        self.key.kind.is_tombstone()
    }

    /// Approximate in-memory footprint of the cell
    pub fn encoded_len(&self) -> usize {
        self.key.encoded_len() + self.value.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(row: &str, family: &str, qualifier: &str, ts: i64, kind: CellKind) -> CellKey {
        CellKey {
            row: row.as_bytes().to_vec(),
            family: family.to_string(),
            qualifier: qualifier.as_bytes().to_vec(),
            timestamp: ts,
            kind,
        }
    }

    #[test]
    fn test_newest_version_sorts_first() {
        let old = key("r", "f", "q", 1, CellKind::Put);
        let new = key("r", "f", "q", 2, CellKind::Put);
        assert!(new < old);
    }

    #[test]
    fn test_row_dominates_ordering() {
        let a = key("a", "z", "z", 0, CellKind::Put);
        let b = key("b", "a", "a", 100, CellKind::Put);
        assert!(a < b);
    }

    #[test]
    fn test_tombstone_sorts_before_put_at_same_timestamp() {
        let put = key("r", "f", "q", 5, CellKind::Put);
        let del = key("r", "f", "q", 5, CellKind::DeleteColumn);
        assert!(del < put);
    }

    #[test]
    fn test_first_of_row_is_minimal() {
        let first = CellKey::first_of_row(b"r");
        assert!(first <= key("r", "", "", i64::MAX, CellKind::DeleteRow));
        assert!(first < key("r", "a", "", i64::MAX, CellKind::DeleteFamily));
        assert!(first > key("q", "z", "z", 0, CellKind::Put));
    }

    #[test]
    fn test_kind_tag_round_trip() {
        for kind in [
            CellKind::DeleteRow,
            CellKind::DeleteFamily,
            CellKind::DeleteColumn,
            CellKind::Put,
        ] {
            assert_eq!(CellKind::from_u8(kind as u8), Some(kind));
        }
        assert_eq!(CellKind::from_u8(9), None);
    }
}
