//! Row results returned by get and scan

use super::Cell;

/// The live cells of one row, in canonical order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowResult {
    row: Vec<u8>,
    cells: Vec<Cell>,
}

impl RowResult {
    pub fn new(row: Vec<u8>, cells: Vec<Cell>) -> Self {
        Self { row, cells }
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

    /// Value of one column, if live
    pub fn value(&self, family: &str, qualifier: &[u8]) -> Option<&[u8]> {
        self.cells
            .iter()
            .find(|c| c.family() == family && c.qualifier() == qualifier)
            .map(Cell::value)
    }
}
