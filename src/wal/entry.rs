//! WAL Entry definitions
//!
//! Defines the structure of individual WAL log entries.

use serde::{Deserialize, Serialize};

use crate::cell::Mutation;
use crate::error::{Result, StoreError};

/// Frame header size: LSN (8) + CRC (4) + Len (4)
pub const HEADER_SIZE: usize = 16;

/// Largest payload a frame may claim; anything bigger is treated as garbage
pub const MAX_PAYLOAD_SIZE: u32 = 256 * 1024 * 1024;

/// A single entry in the WAL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalEntry {
    /// Log Sequence Number - monotonically increasing
    pub lsn: u64,

    /// The logged mutation
    pub record: WalRecord,
}

/// Payload of a WAL entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalRecord {
    /// Catalog id of the table the mutation belongs to. Ids are never
    /// reused, so records of a dropped table are skipped on replay even if a
    /// table with the same name exists again.
    pub table_id: u64,

    /// The row batch, with timestamps already assigned
    pub mutation: Mutation,
}

/// Decoded frame header
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    pub lsn: u64,
    pub crc: u32,
    pub len: u32,
}

impl FrameHeader {
    pub fn decode(bytes: &[u8; HEADER_SIZE]) -> Result<Self> {
        let lsn = u64::from_le_bytes(bytes[0..8].try_into().expect("8-byte slice"));
        let crc = u32::from_le_bytes(bytes[8..12].try_into().expect("4-byte slice"));
        let len = u32::from_le_bytes(bytes[12..16].try_into().expect("4-byte slice"));

        if len > MAX_PAYLOAD_SIZE {
            return Err(StoreError::WalCorruption(format!(
                "entry at LSN {} claims {} bytes",
                lsn, len
            )));
        }

        Ok(Self { lsn, crc, len })
    }
}

impl WalEntry {
    pub fn new(lsn: u64, record: WalRecord) -> Self {
        Self { lsn, record }
    }

    /// Encode as `[LSN][CRC][Len][bincode payload]`
    pub fn serialize(&self) -> Result<Vec<u8>> {
        Self::encode(self.lsn, &self.record)
    }

    /// Encode a frame without taking ownership of the record
    pub fn encode(lsn: u64, record: &WalRecord) -> Result<Vec<u8>> {
        let payload = bincode::serialize(record)?;
        if payload.len() > MAX_PAYLOAD_SIZE as usize {
            return Err(StoreError::InvalidArgument(format!(
                "WAL record of {} bytes exceeds the {} byte limit",
                payload.len(),
                MAX_PAYLOAD_SIZE
            )));
        }
        let crc = Self::compute_crc(lsn, &payload);

        let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len());
        frame.extend_from_slice(&lsn.to_le_bytes());
        frame.extend_from_slice(&crc.to_le_bytes());
        frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Decode one complete frame
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(StoreError::WalCorruption(format!(
                "frame too short: {} bytes",
                bytes.len()
            )));
        }

        let header_bytes: &[u8; HEADER_SIZE] = bytes[..HEADER_SIZE]
            .try_into()
            .expect("header slice has fixed length");
        let header = FrameHeader::decode(header_bytes)?;

        let payload = &bytes[HEADER_SIZE..];
        if payload.len() != header.len as usize {
            return Err(StoreError::WalCorruption(format!(
                "entry at LSN {} truncated: expected {} bytes, got {}",
                header.lsn,
                header.len,
                payload.len()
            )));
        }

        Self::from_payload(header, payload)
    }

    /// Verify the checksum and decode the payload
    pub fn from_payload(header: FrameHeader, payload: &[u8]) -> Result<Self> {
        let computed = Self::compute_crc(header.lsn, payload);
        if computed != header.crc {
            return Err(StoreError::WalCorruption(format!(
                "CRC mismatch at LSN {}: stored {:#010x}, computed {:#010x}",
                header.lsn, header.crc, computed
            )));
        }

        let record: WalRecord = bincode::deserialize(payload)
            .map_err(|e| StoreError::WalCorruption(format!("undecodable record: {}", e)))?;

        Ok(Self {
            lsn: header.lsn,
            record,
        })
    }

    /// CRC32 over the LSN and the payload
    pub fn compute_crc(lsn: u64, payload: &[u8]) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&lsn.to_le_bytes());
        hasher.update(payload);
        hasher.finalize()
    }
}
