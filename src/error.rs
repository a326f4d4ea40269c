//! Error types for cellstore
//!
//! Provides a unified error type for all operations.
//!
//! Absent rows are not errors: reads of a missing row return an empty
//! result. Errors are reserved for schema violations, lifecycle violations
//! and I/O failures.

use thiserror::Error;

use crate::catalog::TableState;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for cellstore operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Schema / Catalog Errors
    // -------------------------------------------------------------------------
    #[error("Table not found: {0}")]
    TableNotFound(String),

    #[error("Table already exists: {0}")]
    TableAlreadyExists(String),

    #[error("Column family '{family}' already exists in table '{table}'")]
    FamilyAlreadyExists { table: String, family: String },

    #[error("Column family '{family}' does not exist in table '{table}'")]
    InvalidFamily { table: String, family: String },

    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Table is disabled: {0}")]
    TableDisabled(String),

    #[error("Table is enabled, disable it first: {0}")]
    TableEnabled(String),

    #[error("Table '{table}' is already {state}")]
    InvalidStateTransition { table: String, state: TableState },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("WAL corruption detected: {0}")]
    WalCorruption(String),

    #[error("Segment corruption detected: {0}")]
    SegmentCorruption(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl StoreError {
    /// Whether the error came from the storage medium rather than from
    /// validating the request. Only these are worth retrying.
    pub fn is_io(&self) -> bool {
        matches!(self, StoreError::Io(_))
    }
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}
