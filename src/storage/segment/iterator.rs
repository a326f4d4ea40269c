//! Segment Iterator
//!
//! Sequential iteration over the cells of one segment.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use crate::cell::Cell;
use crate::error::{Result, StoreError};

use super::{read_entry, SegmentReader};

/// Iterator over segment cells in canonical order
///
/// Owns its file handle and a reference to the segment, so it stays valid
/// even after the segment has been compacted away.
pub struct SegmentIterator {
    segment: Arc<SegmentReader>,
    reader: BufReader<File>,
    /// Current position in the file
    offset: u64,
    /// Rows at or past this key end the iteration
    stop: Option<Vec<u8>>,
    /// Present when iterating the whole data block
    hasher: Option<crc32fast::Hasher>,
    done: bool,
}

impl SegmentIterator {
    pub(super) fn new(
        segment: Arc<SegmentReader>,
        reader: BufReader<File>,
        offset: u64,
        stop: Option<Vec<u8>>,
        verify: bool,
    ) -> Self {
        Self {
            segment,
            reader,
            offset,
            stop,
            hasher: verify.then(crc32fast::Hasher::new),
            done: false,
        }
    }

    pub fn segment(&self) -> &Arc<SegmentReader> {
        &self.segment
    }

    fn finish_checksum(&mut self) -> Result<()> {
        if let Some(hasher) = self.hasher.take() {
            if hasher.finalize() != self.segment.data_crc() {
                return Err(StoreError::SegmentCorruption(format!(
                    "{}: data block checksum mismatch",
                    self.segment.path().display()
                )));
            }
        }
        Ok(())
    }
}

impl Iterator for SegmentIterator {
    type Item = Result<Cell>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        if self.offset >= self.segment.data_end() {
            self.done = true;
            return match self.finish_checksum() {
                Ok(()) => None,
                Err(e) => Some(Err(e)),
            };
        }

        let remaining = self.segment.data_end() - self.offset;
        let (cell, len) = match read_entry(&mut self.reader, self.hasher.as_mut(), remaining) {
            Ok(entry) => entry,
            Err(e) => {
                self.done = true;
                return Some(Err(e));
            }
        };
        self.offset += len;

        if let Some(stop) = &self.stop {
            if cell.row() >= stop.as_slice() {
                self.done = true;
                return None;
            }
        }

        Some(Ok(cell))
    }
}
