//! Segment Module
//!
//! A segment is an immutable on-disk run of cells in canonical key order,
//! produced by flushing a memtable or by compacting other segments.
//!
//! ## File Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │ Header (22 bytes)                                                │
//! │   Magic: "CSEG" (4) | Version: u16 (2) | Count: u64 (8)          │
//! │   Sequence: u64 (8)                                              │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Data Block (variable)                                            │
//! │   [RowLen u32][FamLen u16][QualLen u32][Ts i64][Kind u8]         │
//! │   [ValLen u32][Row][Family][Qualifier][Value]                    │
//! │   ... one entry per cell, canonical order ...                    │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Row Index (variable)                                             │
//! │   [RowLen u32][Offset u64][Row]   (first entry of each row)      │
//! ├──────────────────────────────────────────────────────────────────┤
//! │ Footer (24 bytes)                                                │
//! │   IndexOffset: u64 (8) | MaxTimestamp: i64 (8)                   │
//! │   DataCRC: u32 (4) | IndexCRC: u32 (4)                           │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Files are written under a `.tmp` name and renamed into place once
//! complete, so a crash mid-flush never leaves a half segment that looks
//! valid.

mod builder;
mod iterator;
mod reader;

use std::io::{self, Read};
use std::path::{Path, PathBuf};

use bytes::{Buf, BufMut, BytesMut};

use crate::cell::{Cell, CellKey, CellKind};
use crate::error::{Result, StoreError};

pub use builder::SegmentBuilder;
pub use iterator::SegmentIterator;
pub use reader::SegmentReader;

// =============================================================================
// Shared Constants (used by builder, reader, iterator)
// =============================================================================

/// Magic bytes identifying a segment file
pub(crate) const MAGIC: &[u8; 4] = b"CSEG";

/// Current segment format version
pub(crate) const VERSION: u16 = 2;

/// Header size: Magic (4) + Version (2) + EntryCount (8) + Sequence (8)
pub(crate) const HEADER_SIZE: u64 = 22;

/// Footer size: IndexOffset (8) + MaxTimestamp (8) + DataCRC (4) + IndexCRC (4)
pub(crate) const FOOTER_SIZE: u64 = 24;

/// Fixed part of a data entry: RowLen (4) + FamLen (2) + QualLen (4)
/// + Timestamp (8) + Kind (1) + ValLen (4)
pub(crate) const ENTRY_HEADER_SIZE: usize = 23;

/// Extension of a complete segment file
pub const SEGMENT_EXTENSION: &str = "seg";

/// Extension of a segment still being written
pub const TEMP_EXTENSION: &str = "tmp";

// =============================================================================
// Segment Metadata
// =============================================================================

/// Description of a finished segment file
#[derive(Debug, Clone)]
pub struct SegmentMeta {
    /// Path to the segment file
    pub path: PathBuf,
    /// Store-wide unique number, also part of the file name
    pub file_number: u64,
    /// Recency rank within the table; higher wins ties on identical keys
    pub sequence: u64,
    /// Number of cells in the segment
    pub entry_count: u64,
    /// Smallest row (None for an empty segment)
    pub min_row: Option<Vec<u8>>,
    /// Largest row
    pub max_row: Option<Vec<u8>>,
    /// Newest cell timestamp (0 for an empty segment)
    pub max_timestamp: i64,
    /// File size in bytes
    pub file_size: u64,
}

/// "segment_000042.seg" for file number 42
pub fn segment_file_name(file_number: u64) -> String {
    format!("segment_{:06}.{}", file_number, SEGMENT_EXTENSION)
}

/// Parse the file number out of a segment path
pub fn parse_file_number(path: &Path) -> Option<u64> {
    if path.extension()? != SEGMENT_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_string_lossy();
    stem.strip_prefix("segment_")?.parse().ok()
}

// =============================================================================
// Entry codec
// =============================================================================

/// Append one cell to `buf` in the data block layout
///
/// Fails if a field is too long for its length prefix.
pub(crate) fn encode_entry(cell: &Cell, buf: &mut BytesMut) -> Result<()> {
    let key = &cell.key;
    let row_len = length_prefix::<u32>("row key", key.row.len())?;
    let family_len = length_prefix::<u16>("family name", key.family.len())?;
    let qualifier_len = length_prefix::<u32>("qualifier", key.qualifier.len())?;
    let value_len = length_prefix::<u32>("value", cell.value.len())?;

    buf.reserve(ENTRY_HEADER_SIZE + cell.encoded_len());
    buf.put_u32_le(row_len);
    buf.put_u16_le(family_len);
    buf.put_u32_le(qualifier_len);
    buf.put_i64_le(key.timestamp);
    buf.put_u8(key.kind as u8);
    buf.put_u32_le(value_len);
    buf.put_slice(&key.row);
    buf.put_slice(key.family.as_bytes());
    buf.put_slice(&key.qualifier);
    buf.put_slice(&cell.value);
    Ok(())
}

/// `len` converted to the integer type of its on-disk prefix
pub(crate) fn length_prefix<T: TryFrom<usize>>(what: &str, len: usize) -> Result<T> {
    T::try_from(len).map_err(|_| {
        StoreError::InvalidArgument(format!("{} of {} bytes is too long for a segment", what, len))
    })
}

/// Read one entry; returns the cell and the number of bytes consumed
///
/// `hasher` receives every byte read, for data block verification.
/// `remaining` is the number of data block bytes left from the current
/// position; an entry claiming more is corrupt.
pub(crate) fn read_entry<R: Read>(
    reader: &mut R,
    hasher: Option<&mut crc32fast::Hasher>,
    remaining: u64,
) -> Result<(Cell, u64)> {
    let mut header = [0u8; ENTRY_HEADER_SIZE];
    reader.read_exact(&mut header).map_err(truncation)?;

    let mut fixed = &header[..];
    let row_len = fixed.get_u32_le() as usize;
    let family_len = fixed.get_u16_le() as usize;
    let qualifier_len = fixed.get_u32_le() as usize;
    let timestamp = fixed.get_i64_le();
    let kind_byte = fixed.get_u8();
    let value_len = fixed.get_u32_le() as usize;

    let kind = CellKind::from_u8(kind_byte)
        .ok_or_else(|| StoreError::SegmentCorruption(format!("unknown cell kind {}", kind_byte)))?;

    let entry_len = ENTRY_HEADER_SIZE as u64
        + row_len as u64
        + family_len as u64
        + qualifier_len as u64
        + value_len as u64;
    if entry_len > remaining {
        return Err(StoreError::SegmentCorruption(format!(
            "entry of {} bytes runs past the data block ({} bytes left)",
            entry_len, remaining
        )));
    }
    let mut body = vec![0u8; row_len + family_len + qualifier_len + value_len];
    reader.read_exact(&mut body).map_err(truncation)?;

    if let Some(hasher) = hasher {
        hasher.update(&header);
        hasher.update(&body);
    }

    let value = body.split_off(row_len + family_len + qualifier_len);
    let qualifier = body.split_off(row_len + family_len);
    let family_bytes = body.split_off(row_len);
    let row = body;

    let family = String::from_utf8(family_bytes)
        .map_err(|_| StoreError::SegmentCorruption("family name is not UTF-8".to_string()))?;

    let cell = Cell {
        key: CellKey {
            row,
            family,
            qualifier,
            timestamp,
            kind,
        },
        value,
    };
    Ok((cell, entry_len))
}

fn truncation(e: io::Error) -> StoreError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        StoreError::SegmentCorruption("entry runs past end of file".to_string())
    } else {
        StoreError::Io(e)
    }
}
