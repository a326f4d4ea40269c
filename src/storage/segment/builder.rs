//! Segment Builder
//!
//! Writes cells in canonical order to a new segment file.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use bytes::{BufMut, BytesMut};

use crate::cell::{Cell, CellKey};
use crate::error::{Result, StoreError};

use super::{
    encode_entry, length_prefix, parse_file_number, SegmentMeta, MAGIC, TEMP_EXTENSION, VERSION,
};

/// Builder for new segments
///
/// Data goes to `<path>.tmp`; [`finish`](Self::finish) syncs and renames it
/// to `path`. Dropping an unfinished builder removes the temp file.
pub struct SegmentBuilder {
    path: PathBuf,
    tmp_path: PathBuf,
    writer: Option<BufWriter<File>>,
    sequence: u64,
    entry_count: u64,
    /// Current write position
    current_offset: u64,
    /// Row -> offset of the row's first entry
    index: Vec<(Vec<u8>, u64)>,
    /// Key of the last cell added, for order checking
    last_key: Option<CellKey>,
    max_timestamp: i64,
    data_hasher: crc32fast::Hasher,
    /// Reused encode buffer
    scratch: BytesMut,
    /// Set once the file has been renamed into place
    finished: bool,
}

impl SegmentBuilder {
    /// Start a segment with the given recency sequence
    pub fn new(path: &Path, sequence: u64) -> Result<Self> {
        let tmp_path = path.with_extension(format!("seg.{}", TEMP_EXTENSION));
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp_path)?;

        let mut writer = BufWriter::new(file);

        // entry count is patched in finish()
        let mut header = BytesMut::with_capacity(super::HEADER_SIZE as usize);
        header.put_slice(MAGIC);
        header.put_u16_le(VERSION);
        header.put_u64_le(0);
        header.put_u64_le(sequence);
        writer.write_all(&header)?;

        Ok(Self {
            path: path.to_path_buf(),
            tmp_path,
            writer: Some(writer),
            sequence,
            entry_count: 0,
            current_offset: super::HEADER_SIZE,
            index: Vec::new(),
            last_key: None,
            max_timestamp: 0,
            data_hasher: crc32fast::Hasher::new(),
            scratch: BytesMut::new(),
            finished: false,
        })
    }

    /// Add a cell; cells must arrive in strictly increasing key order
    pub fn add(&mut self, cell: &Cell) -> Result<()> {
        if let Some(last) = &self.last_key {
            if *last >= cell.key {
                return Err(StoreError::InvalidArgument(format!(
                    "segment cells out of order at row {:?}",
                    String::from_utf8_lossy(&cell.key.row)
                )));
            }
        }

        self.scratch.clear();
        encode_entry(cell, &mut self.scratch)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| StoreError::InvalidArgument("segment already finished".to_string()))?;
        writer.write_all(&self.scratch)?;
        self.data_hasher.update(&self.scratch);

        let new_row = self
            .index
            .last()
            .map_or(true, |(row, _)| row.as_slice() != cell.row());
        if new_row {
            self.index.push((cell.row().to_vec(), self.current_offset));
        }

        self.current_offset += self.scratch.len() as u64;
        self.entry_count += 1;
        self.max_timestamp = self.max_timestamp.max(cell.timestamp());
        self.last_key = Some(cell.key.clone());
        Ok(())
    }

    /// Number of cells added so far
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Write index and footer, sync, and move the file into place
    pub fn finish(mut self) -> Result<SegmentMeta> {
        let index_offset = self.current_offset;

        let mut index_block = BytesMut::new();
        for (row, offset) in &self.index {
            index_block.put_u32_le(length_prefix::<u32>("row key", row.len())?);
            index_block.put_u64_le(*offset);
            index_block.put_slice(row);
        }
        let index_crc = crc32fast::hash(&index_block);
        let data_crc = self.data_hasher.clone().finalize();

        let mut footer = BytesMut::with_capacity(super::FOOTER_SIZE as usize);
        footer.put_u64_le(index_offset);
        footer.put_i64_le(self.max_timestamp);
        footer.put_u32_le(data_crc);
        footer.put_u32_le(index_crc);

        let mut writer = self
            .writer
            .take()
            .ok_or_else(|| StoreError::InvalidArgument("segment already finished".to_string()))?;
        writer.write_all(&index_block)?;
        writer.write_all(&footer)?;
        writer.flush()?;

        let mut file = writer
            .into_inner()
            .map_err(|e| StoreError::Io(e.into_error()))?;
        file.seek(SeekFrom::Start(6))?; // after magic + version
        file.write_all(&self.entry_count.to_le_bytes())?;
        file.sync_all()?;
        let file_size = file.metadata()?.len();
        drop(file);

        fs::rename(&self.tmp_path, &self.path)?;
        self.finished = true;
        if let Some(dir) = self.path.parent() {
            sync_dir(dir);
        }

        Ok(SegmentMeta {
            file_number: parse_file_number(&self.path).unwrap_or(0),
            path: self.path.clone(),
            sequence: self.sequence,
            entry_count: self.entry_count,
            min_row: self.index.first().map(|(row, _)| row.clone()),
            max_row: self.index.last().map(|(row, _)| row.clone()),
            max_timestamp: self.max_timestamp,
            file_size,
        })
    }
}

impl Drop for SegmentBuilder {
    fn drop(&mut self) {
        if !self.finished {
            self.writer.take();
            let _ = fs::remove_file(&self.tmp_path);
        }
    }
}

/// Persist a rename; failures only cost durability of the directory entry
fn sync_dir(dir: &Path) {
    if let Ok(handle) = File::open(dir) {
        let _ = handle.sync_all();
    }
}
