//! Row resolution
//!
//! Turns every stored cell of one row (puts and tombstones from all
//! sources, already merged) into the visible result: the newest put per
//! column that no tombstone masks.
//!
//! A tombstone at timestamp T masks puts with timestamp <= T in its scope:
//! - DeleteRow: every column of the row
//! - DeleteFamily: every column of one family
//! - DeleteColumn: one column

use std::collections::{BTreeSet, HashMap};

use crate::cell::{Cell, CellKind};

/// Newest tombstone timestamp per scope within one row
#[derive(Debug, Default)]
pub struct Tombstones<'a> {
    row: Option<i64>,
    families: HashMap<&'a str, i64>,
    columns: HashMap<(&'a str, &'a [u8]), i64>,
}

impl<'a> Tombstones<'a> {
    /// Collect the tombstones among `cells`
    pub fn collect(cells: &'a [Cell]) -> Self {
        let mut tombstones = Self::default();
        for cell in cells {
            let ts = cell.timestamp();
            match cell.kind() {
                CellKind::DeleteRow => {
                    tombstones.row = Some(tombstones.row.map_or(ts, |t| t.max(ts)));
                }
                CellKind::DeleteFamily => {
                    let entry = tombstones.families.entry(cell.family()).or_insert(ts);
                    *entry = (*entry).max(ts);
                }
                CellKind::DeleteColumn => {
                    let entry = tombstones
                        .columns
                        .entry((cell.family(), cell.qualifier()))
                        .or_insert(ts);
                    *entry = (*entry).max(ts);
                }
                CellKind::Put => {}
            }
        }
        tombstones
    }

    /// Whether some tombstone hides `cell`
    pub fn masks(&self, cell: &Cell) -> bool {
        let ts = cell.timestamp();
        self.row.map_or(false, |t| ts <= t)
            || self
                .families
                .get(cell.family())
                .map_or(false, |&t| ts <= t)
            || self
                .columns
                .get(&(cell.family(), cell.qualifier()))
                .map_or(false, |&t| ts <= t)
    }

    pub fn is_empty(&self) -> bool {
        self.row.is_none() && self.families.is_empty() && self.columns.is_empty()
    }
}

/// Visible cells of one row
///
/// `cells` must be every cell of a single row in canonical order with
/// duplicates already removed. Only families in `schema` are returned, and
/// only those in `requested` when it is given. The result is ordered by
/// (family, qualifier) with one put per column.
pub fn resolve_row(
    cells: &[Cell],
    schema: &BTreeSet<String>,
    requested: Option<&[String]>,
) -> Vec<Cell> {
    let tombstones = Tombstones::collect(cells);
    let mut visible = Vec::new();
    let mut last_column: Option<(&str, &[u8])> = None;

    for cell in cells {
        if cell.is_tombstone() {
            continue;
        }

        // Older versions of a column follow its newest put directly
        let column = (cell.family(), cell.qualifier());
        if last_column == Some(column) {
            continue;
        }
        last_column = Some(column);

        if !schema.contains(cell.family()) {
            continue;
        }
        if let Some(requested) = requested {
            if !requested.iter().any(|f| f == cell.family()) {
                continue;
            }
        }
        if tombstones.masks(cell) {
            continue;
        }
        visible.push(cell.clone());
    }

    visible
}
