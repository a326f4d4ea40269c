//! Mutation batches
//!
//! A mutation is a set of cells sharing one row key. The engine logs it as
//! one WAL record and applies it under one memtable write lock, so readers
//! observe either all of its cells or none.

use serde::{Deserialize, Serialize};

use super::{Cell, CellKind, LATEST_TIMESTAMP};
use crate::error::{Result, StoreError};

/// Atomic batch of cells for one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mutation {
    row: Vec<u8>,
    cells: Vec<Cell>,
}

impl Mutation {
    /// Start an empty batch for `row`
    pub fn new(row: impl Into<Vec<u8>>) -> Self {
        Self {
            row: row.into(),
            cells: Vec::new(),
        }
    }

    /// Write `value` at the write-time timestamp
    pub fn put(
        self,
        family: impl Into<String>,
        qualifier: impl Into<Vec<u8>>,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        self.put_at(family, qualifier, LATEST_TIMESTAMP, value)
    }

    /// Write `value` with an explicit timestamp
    pub fn put_at(
        mut self,
        family: impl Into<String>,
        qualifier: impl Into<Vec<u8>>,
        timestamp: i64,
        value: impl Into<Vec<u8>>,
    ) -> Self {
        let cell = Cell::put(self.row.clone(), family, qualifier, timestamp, value);
        self.cells.push(cell);
        self
    }

    /// Delete every version of one column
    pub fn delete_column(mut self, family: impl Into<String>, qualifier: impl Into<Vec<u8>>) -> Self {
        let cell = Cell::tombstone(
            CellKind::DeleteColumn,
            self.row.clone(),
            family,
            qualifier,
            LATEST_TIMESTAMP,
        );
        self.cells.push(cell);
        self
    }

    /// Delete every column of one family
    pub fn delete_family(mut self, family: impl Into<String>) -> Self {
        let cell = Cell::tombstone(
            CellKind::DeleteFamily,
            self.row.clone(),
            family,
            Vec::new(),
            LATEST_TIMESTAMP,
        );
        self.cells.push(cell);
        self
    }

    /// Delete the whole row
    pub fn delete_row(mut self) -> Self {
        let cell = Cell::tombstone(
            CellKind::DeleteRow,
            self.row.clone(),
            String::new(),
            Vec::new(),
            LATEST_TIMESTAMP,
        );
        self.cells.push(cell);
        self
    }

    /// Family tombstones for many rows, logged and applied as one batch
    ///
    /// Used when a family is removed from a table. The batch has no row of
    /// its own.
    pub(crate) fn family_sweep<I>(family: &str, rows: I) -> Self
    where
        I: IntoIterator<Item = Vec<u8>>,
    {
        let cells = rows
            .into_iter()
            .map(|row| {
                Cell::tombstone(CellKind::DeleteFamily, row, family, Vec::new(), LATEST_TIMESTAMP)
            })
            .collect();
        Self {
            row: Vec::new(),
            cells,
        }
    }

    pub fn row(&self) -> &[u8] {
        &self.row
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn into_cells(self) -> Vec<Cell> {
        self.cells
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Families referenced by the batch (row tombstones reference none)
    pub fn families(&self) -> impl Iterator<Item = &str> {
        self.cells
            .iter()
            .filter(|c| c.kind() != CellKind::DeleteRow)
            .map(|c| c.family())
    }

    /// Approximate in-memory footprint of the batch
    pub fn encoded_len(&self) -> usize {
        self.cells.iter().map(Cell::encoded_len).sum()
    }

    /// Structural checks that do not need the schema
    pub(crate) fn validate(&self) -> Result<()> {
        if self.cells.is_empty() {
            return Err(StoreError::InvalidArgument(
                "mutation contains no cells".to_string(),
            ));
        }
        for cell in &self.cells {
            if cell.timestamp() < 0 {
                return Err(StoreError::InvalidArgument(format!(
                    "negative timestamp {} in mutation",
                    cell.timestamp()
                )));
            }
        }
        Ok(())
    }

    /// Replace every `LATEST_TIMESTAMP` placeholder with `now`
    pub(crate) fn assign_timestamps(&mut self, now: i64) {
        for cell in &mut self.cells {
            if cell.key.timestamp == LATEST_TIMESTAMP {
                cell.key.timestamp = now;
            }
        }
    }
}
