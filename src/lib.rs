//! # cellstore
//!
//! An embeddable, single-node wide-column store:
//! - Tables with column families, enabled/disabled lifecycle
//! - Atomic multi-column mutations per row
//! - Write-Ahead Logging (WAL) for durability, crash recovery
//! - Point reads and ordered range scans over versioned cells
//! - Immutable sorted segments with background compaction
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │              Admin (schema)      Engine (data)              │
//! └──────────────┬───────────────────────────┬──────────────────┘
//!                │                           │
//!         ┌──────▼──────┐      validate      │
//!         │   Catalog   │◀───────────────────┤
//!         │catalog.json │                    │
//!         └─────────────┘       ┌────────────┴────────────┐
//!                               │                         │
//!                               ▼                         ▼
//!                        ┌─────────────┐          ┌─────────────┐
//!                        │     WAL     │          │  MemTables  │
//!                        │  (Append)   │          │ (per table) │
//!                        └─────────────┘          └──────┬──────┘
//!                                                        │ flush
//!                                                        ▼
//!                    ┌─────────────┐  merge      ┌─────────────┐
//!                    │ Query (k-way│◀────────────│  Segments   │
//!                    │   merge)    │             │ + compaction│
//!                    └─────────────┘             └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod cell;
pub mod catalog;
pub mod wal;
pub mod memtable;
pub mod storage;
pub mod query;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::{Config, WalSyncStrategy};
pub use catalog::{TableDescriptor, TableState};
pub use cell::{Cell, CellKind, Mutation, RowResult};
pub use engine::{Admin, Engine};
pub use query::{ScanOptions, Scanner};
pub use storage::CompactionStats;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of cellstore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
