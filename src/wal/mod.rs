//! Write-ahead log
//!
//! Every mutation batch is appended here, as one record, before it
//! reaches a memtable. The log is a directory of numbered files; a freeze
//! rotates to a new file and a flush deletes files whose records all live
//! in segments.
//!
//! ```text
//! wal/
//!   wal_000003.log   ┌─────────┬─────────┬─────────┬───────────────────┐
//!   wal_000004.log   │ LSN u64 │ CRC u32 │ len u32 │ bincode WalRecord │ ...
//!   wal_000005.log ← └─────────┴─────────┴─────────┴───────────────────┘
//!                    active
//! ```
//! The CRC covers the LSN and the payload. Recovery reads files in id
//! order and truncates a torn tail at the first bad frame.

mod entry;
mod log;
mod reader;
mod recovery;
mod writer;

pub use entry::{FrameHeader, WalEntry, WalRecord, HEADER_SIZE, MAX_PAYLOAD_SIZE};
pub use log::{Replay, WriteAheadLog};
pub use reader::{WalIterator, WalReader};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::WalWriter;
