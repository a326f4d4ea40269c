//! Segment Reader
//!
//! Opens segment files and locates rows through the in-memory row index.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, ErrorKind, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Buf;

use crate::cell::Cell;
use crate::error::{Result, StoreError};

use super::iterator::SegmentIterator;
use super::{parse_file_number, read_entry, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Read handle for one segment file
///
/// Shared through `Arc`. Every read opens its own file handle, so readers
/// never contend. Once a segment is replaced by compaction or its table is
/// dropped it is marked obsolete, and the file is deleted when the last
/// handle goes away.
#[derive(Debug)]
pub struct SegmentReader {
    path: PathBuf,
    file_number: u64,
    sequence: u64,
    entry_count: u64,
    /// Start of the row index, end of the data block
    index_offset: u64,
    max_timestamp: i64,
    data_crc: u32,
    file_size: u64,
    /// Row -> offset of its first entry
    index: BTreeMap<Vec<u8>, u64>,
    obsolete: AtomicBool,
}

impl SegmentReader {
    /// Open a segment and load its row index
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();
        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(corrupt(path, format!("file too small ({} bytes)", file_size)));
        }

        // Header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;
        let mut buf = &header[..];
        if &buf[..4] != MAGIC {
            return Err(corrupt(path, format!("bad magic {:?}", &header[0..4])));
        }
        buf.advance(4);
        let version = buf.get_u16_le();
        if version != VERSION {
            return Err(corrupt(path, format!("unsupported version {}", version)));
        }
        let entry_count = buf.get_u64_le();
        let sequence = buf.get_u64_le();

        // Footer
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;
        let mut buf = &footer[..];
        let index_offset = buf.get_u64_le();
        let max_timestamp = buf.get_i64_le();
        let data_crc = buf.get_u32_le();
        let index_crc = buf.get_u32_le();

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(corrupt(path, format!("index offset {} out of range", index_offset)));
        }

        // Row index
        file.seek(SeekFrom::Start(index_offset))?;
        let mut index_data = vec![0u8; (file_size - FOOTER_SIZE - index_offset) as usize];
        file.read_exact(&mut index_data)?;
        if crc32fast::hash(&index_data) != index_crc {
            return Err(corrupt(path, "row index checksum mismatch".to_string()));
        }
        let index = parse_index(path, &index_data, index_offset)?;

        Ok(Self {
            path: path.to_path_buf(),
            file_number: parse_file_number(path).unwrap_or(0),
            sequence,
            entry_count,
            index_offset,
            max_timestamp,
            data_crc,
            file_size,
            index,
            obsolete: AtomicBool::new(false),
        })
    }

    /// All cells of `row` in canonical order (empty if the row is absent)
    pub fn row(&self, row: &[u8]) -> Result<Vec<Cell>> {
        let offset = match self.index.get(row) {
            Some(&offset) => offset,
            None => return Ok(Vec::new()),
        };

        let mut reader = self.open_at(offset)?;
        let mut position = offset;
        let mut cells = Vec::new();
        while position < self.index_offset {
            let (cell, len) = read_entry(&mut reader, None, self.index_offset - position)?;
            if cell.row() != row {
                break;
            }
            position += len;
            cells.push(cell);
        }
        Ok(cells)
    }

    /// Iterate every cell, verifying the data checksum at the end
    pub fn iter(self: &Arc<Self>) -> Result<SegmentIterator> {
        let reader = self.open_at(HEADER_SIZE)?;
        Ok(SegmentIterator::new(
            Arc::clone(self),
            reader,
            HEADER_SIZE,
            None,
            true,
        ))
    }

    /// Iterate cells of rows in `[start, stop)`
    pub fn range(self: &Arc<Self>, start: &[u8], stop: Option<&[u8]>) -> Result<SegmentIterator> {
        let first = self
            .index
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .next()
            .map(|(_, &offset)| offset)
            .unwrap_or(self.index_offset);

        let reader = self.open_at(first)?;
        Ok(SegmentIterator::new(
            Arc::clone(self),
            reader,
            first,
            stop.map(|s| s.to_vec()),
            false,
        ))
    }

    /// Read the whole data block and check it against the stored checksum
    pub fn verify(&self) -> Result<()> {
        let mut reader = self.open_at(HEADER_SIZE)?;
        let mut hasher = crc32fast::Hasher::new();
        let mut position = HEADER_SIZE;
        let mut count = 0u64;
        while position < self.index_offset {
            let remaining = self.index_offset - position;
            let (_, len) = read_entry(&mut reader, Some(&mut hasher), remaining)?;
            position += len;
            count += 1;
        }
        if hasher.finalize() != self.data_crc || count != self.entry_count {
            return Err(corrupt(&self.path, "data block checksum mismatch".to_string()));
        }
        Ok(())
    }

    /// False only if `row` is definitely outside `[min_row, max_row]`
    pub fn might_contain_row(&self, row: &[u8]) -> bool {
        match (self.min_row(), self.max_row()) {
            (Some(min), Some(max)) => row >= min && row <= max,
            _ => false,
        }
    }

    /// Whether any row of this segment can fall in `[start, stop)`
    pub fn overlaps(&self, start: &[u8], stop: Option<&[u8]>) -> bool {
        match (self.min_row(), self.max_row()) {
            (Some(min), Some(max)) => max >= start && stop.map_or(true, |stop| min < stop),
            _ => false,
        }
    }

    pub fn min_row(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    pub fn max_row(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_number(&self) -> u64 {
        self.file_number
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Newest cell timestamp in the segment (0 if empty)
    pub fn max_timestamp(&self) -> i64 {
        self.max_timestamp
    }

    pub fn row_count(&self) -> usize {
        self.index.len()
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub(super) fn data_end(&self) -> u64 {
        self.index_offset
    }

    pub(super) fn data_crc(&self) -> u32 {
        self.data_crc
    }

    /// Schedule the file for deletion once no reader holds it
    pub fn mark_obsolete(&self) {
        self.obsolete.store(true, Ordering::Release);
    }

    pub fn is_obsolete(&self) -> bool {
        self.obsolete.load(Ordering::Acquire)
    }

    fn open_at(&self, offset: u64) -> Result<BufReader<File>> {
        let mut file = File::open(&self.path)?;
        file.seek(SeekFrom::Start(offset))?;
        Ok(BufReader::new(file))
    }
}

impl Drop for SegmentReader {
    fn drop(&mut self) {
        if !self.is_obsolete() {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Deleted obsolete segment {}", self.path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to delete obsolete segment {}: {}",
                self.path.display(),
                e
            ),
        }
    }
}

/// Parse `[row_len u32][offset u64][row]` records
fn parse_index(path: &Path, mut data: &[u8], index_offset: u64) -> Result<BTreeMap<Vec<u8>, u64>> {
    let mut index = BTreeMap::new();
    while data.has_remaining() {
        if data.remaining() < 12 {
            return Err(corrupt(path, "truncated row index entry".to_string()));
        }
        let row_len = data.get_u32_le() as usize;
        let offset = data.get_u64_le();
        if data.remaining() < row_len {
            return Err(corrupt(path, "truncated row key in index".to_string()));
        }
        if offset < HEADER_SIZE || offset >= index_offset {
            return Err(corrupt(path, format!("row offset {} out of range", offset)));
        }
        let row = data[..row_len].to_vec();
        data.advance(row_len);
        index.insert(row, offset);
    }
    Ok(index)
}

fn corrupt(path: &Path, reason: String) -> StoreError {
    StoreError::SegmentCorruption(format!("{}: {}", path.display(), reason))
}
