//! WAL Reader
//!
//! Handles reading entries from one WAL file.

use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;

use crate::error::{Result, StoreError};

use super::entry::{FrameHeader, HEADER_SIZE};
use super::WalEntry;

/// Reads entries from a WAL file
pub struct WalReader {
    reader: BufReader<File>,
    /// End of the last frame that decoded cleanly
    valid_offset: u64,
}

impl WalReader {
    /// Open a WAL file for reading
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            valid_offset: 0,
        })
    }

    /// Read the next entry from the WAL
    ///
    /// Returns `Ok(None)` at a clean end of file, and `WalCorruption` for a
    /// torn tail or a checksum mismatch.
    pub fn next_entry(&mut self) -> Result<Option<WalEntry>> {
        let mut header_bytes = [0u8; HEADER_SIZE];
        match read_fully(&mut self.reader, &mut header_bytes)? {
            0 => return Ok(None),
            n if n < HEADER_SIZE => {
                return Err(StoreError::WalCorruption(format!(
                    "torn header at offset {} ({} of {} bytes)",
                    self.valid_offset, n, HEADER_SIZE
                )));
            }
            _ => {}
        }

        let header = FrameHeader::decode(&header_bytes)?;
        let mut payload = vec![0u8; header.len as usize];
        let n = read_fully(&mut self.reader, &mut payload)?;
        if n < payload.len() {
            return Err(StoreError::WalCorruption(format!(
                "torn entry at LSN {}: {} of {} payload bytes",
                header.lsn,
                n,
                payload.len()
            )));
        }

        let entry = WalEntry::from_payload(header, &payload)?;
        self.valid_offset += (HEADER_SIZE + payload.len()) as u64;
        Ok(Some(entry))
    }

    /// Offset just past the last good entry
    pub fn valid_offset(&self) -> u64 {
        self.valid_offset
    }

    /// Iterate over entries until end of file or the first bad frame
    pub fn entries(self) -> WalIterator {
        WalIterator {
            reader: self,
            done: false,
        }
    }
}

/// Read until `buf` is full or EOF; returns the number of bytes read
fn read_fully(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(filled)
}

/// Iterator over WAL entries
pub struct WalIterator {
    reader: WalReader,
    done: bool,
}

impl Iterator for WalIterator {
    type Item = Result<WalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
