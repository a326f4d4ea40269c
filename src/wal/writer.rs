//! WAL Writer
//!
//! Handles appending entries to one WAL file.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::config::WalSyncStrategy;
use crate::error::Result;

use super::{WalEntry, WalRecord};

/// Writes entries to a single WAL file
pub struct WalWriter {
    path: PathBuf,
    file: File,
    /// LSN the next append will receive
    next_lsn: u64,
    sync_strategy: WalSyncStrategy,
    /// Entries written since the last fsync
    uncommitted: usize,
    /// End of the last complete frame
    offset: u64,
    /// Makes the next fsync fail
    #[cfg(test)]
    fail_next_sync: bool,
}

impl WalWriter {
    /// Open or create a WAL file; the first append gets `next_lsn`
    pub fn open(path: &Path, sync_strategy: WalSyncStrategy, next_lsn: u64) -> Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(path)?;
        let offset = file.seek(SeekFrom::End(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            next_lsn,
            sync_strategy,
            uncommitted: 0,
            offset,
            #[cfg(test)]
            fail_next_sync: false,
        })
    }

    /// Append a record and return its LSN
    ///
    /// With `EveryWrite` the record is on stable storage when this returns.
    /// If the write or its fsync fails the file is cut back to the previous
    /// frame boundary, so a failed append never reappears on replay and a
    /// later append does not land behind a torn frame.
    pub fn append(&mut self, record: &WalRecord) -> Result<u64> {
        let lsn = self.next_lsn;
        let frame = WalEntry::encode(lsn, record)?;

        let must_sync = match self.sync_strategy {
            WalSyncStrategy::EveryWrite => true,
            WalSyncStrategy::EveryNEntries { count } => self.uncommitted + 1 >= count,
        };

        let written = self.write_frame(&frame).and_then(|()| {
            if must_sync {
                self.sync()
            } else {
                Ok(())
            }
        });
        if let Err(e) = written {
            if let Err(cut) = self.rewind() {
                tracing::error!(
                    "WAL {} left with a torn frame after failed append: {}",
                    self.path.display(),
                    cut
                );
            }
            return Err(e);
        }

        self.offset += frame.len() as u64;
        self.next_lsn += 1;
        if !must_sync {
            self.uncommitted += 1;
        }

        Ok(lsn)
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<()> {
        self.file.write_all(frame)?;
        self.file.flush()?;
        Ok(())
    }

    fn rewind(&mut self) -> Result<()> {
        self.file.set_len(self.offset)?;
        self.file.seek(SeekFrom::Start(self.offset))?;
        self.file.sync_data()?;
        Ok(())
    }

    /// Force sync to disk
    pub fn sync(&mut self) -> Result<()> {
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_sync) {
            let err = std::io::Error::new(std::io::ErrorKind::Other, "injected fsync failure");
            return Err(err.into());
        }
        self.file.sync_data()?;
        self.uncommitted = 0;
        Ok(())
    }

    /// LSN the next append will receive
    pub fn current_lsn(&self) -> u64 {
        self.next_lsn
    }

    /// Entries written since the last fsync
    pub fn uncommitted_count(&self) -> usize {
        self.uncommitted
    }

    /// Bytes of complete frames in the file
    pub fn size(&self) -> u64 {
        self.offset
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }
}
