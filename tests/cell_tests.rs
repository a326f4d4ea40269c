//! Tests for the cell encoding layer
//!
//! These tests verify:
//! - Canonical key ordering (row, family, qualifier, timestamp desc, kind)
//! - Mutation batch construction
//! - Row results and name validation

use cellstore::cell::{validate_family_name, CellKey, TimestampOracle, LATEST_TIMESTAMP};
use cellstore::{Cell, CellKind, Mutation, RowResult};

// =============================================================================
// Ordering Tests
// =============================================================================

#[test]
fn test_cells_sort_into_canonical_order() {
    let mut cells = vec![
        Cell::put("tom", "grade", "", 5, "1"),
        Cell::put("amy", "course", "math", 1, "90"),
        Cell::put("tom", "course", "art", 3, "80"),
        Cell::put("tom", "course", "art", 9, "85"),
        Cell::tombstone(CellKind::DeleteRow, "tom", "", "", 2),
    ];
    cells.sort_by(|a, b| a.key.cmp(&b.key));

    let order: Vec<(&[u8], &str, i64)> = cells
        .iter()
        .map(|c| (c.row(), c.family(), c.timestamp()))
        .collect();
    assert_eq!(
        order,
        vec![
            (&b"amy"[..], "course", 1),
            (&b"tom"[..], "", 2),
            (&b"tom"[..], "course", 9),
            (&b"tom"[..], "course", 3),
            (&b"tom"[..], "grade", 5),
        ]
    );
}

#[test]
fn test_rows_compare_bytewise() {
    let short = CellKey::first_of_row(b"ab");
    let long = CellKey::first_of_row(b"ab\x00");
    let high = CellKey::first_of_row(&[0xff]);

    assert!(short < long);
    assert!(long < high);
}

#[test]
fn test_delete_kinds_sort_before_put_at_same_timestamp() {
    let put = Cell::put("r", "f", "q", 10, "v");
    let column = Cell::tombstone(CellKind::DeleteColumn, "r", "f", "q", 10);

    assert!(column.key < put.key);
    assert!(CellKind::DeleteRow < CellKind::DeleteFamily);
    assert!(CellKind::DeleteFamily < CellKind::DeleteColumn);
    assert!(CellKind::DeleteColumn < CellKind::Put);
}

#[test]
fn test_same_column() {
    let a = Cell::put("r", "f", "q", 1, "a");
    let b = Cell::put("r", "f", "q", 2, "b");
    let c = Cell::put("r", "f", "other", 1, "c");

    assert!(a.key.same_column(&b.key));
    assert!(!a.key.same_column(&c.key));
}

// =============================================================================
// Mutation Tests
// =============================================================================

#[test]
fn test_mutation_defaults_to_latest_timestamp() {
    let m = Mutation::new("tom")
        .put("grade", "", "1")
        .put("course", "math", "85");

    assert_eq!(m.row(), b"tom");
    assert_eq!(m.len(), 2);
    assert!(m.cells().iter().all(|c| c.timestamp() == LATEST_TIMESTAMP));
}

#[test]
fn test_mutation_tombstone_shapes() {
    let m = Mutation::new("r")
        .delete_row()
        .delete_family("f")
        .delete_column("f", "q");

    let cells = m.cells();
    assert_eq!(cells[0].kind(), CellKind::DeleteRow);
    assert_eq!(cells[0].family(), "");
    assert_eq!(cells[1].kind(), CellKind::DeleteFamily);
    assert_eq!(cells[1].qualifier(), b"");
    assert_eq!(cells[2].kind(), CellKind::DeleteColumn);
    assert!(cells.iter().all(|c| c.is_tombstone() && c.value().is_empty()));
}

#[test]
fn test_mutation_families_skip_row_delete() {
    let m = Mutation::new("r").delete_row().put("a", "q", "v").delete_family("b");
    let families: Vec<&str> = m.families().collect();
    assert_eq!(families, vec!["a", "b"]);
}

// =============================================================================
// Row Result Tests
// =============================================================================

#[test]
fn test_row_result_value_lookup() {
    let row = RowResult::new(
        b"tom".to_vec(),
        vec![
            Cell::put("tom", "course", "art", 3, "80"),
            Cell::put("tom", "grade", "", 5, "1"),
        ],
    );

    assert_eq!(row.row(), b"tom");
    assert_eq!(row.len(), 2);
    assert_eq!(row.value("course", b"art"), Some(&b"80"[..]));
    assert_eq!(row.value("grade", b""), Some(&b"1"[..]));
    assert_eq!(row.value("course", b"math"), None);
}

// =============================================================================
// Validation and Timestamps
// =============================================================================

#[test]
fn test_family_name_validation() {
    assert!(validate_family_name("grade").is_ok());
    assert!(validate_family_name("").is_err());
    assert!(validate_family_name("course:math").is_err());
}

#[test]
fn test_timestamp_oracle_is_monotonic_across_threads() {
    use std::sync::Arc;

    let oracle = Arc::new(TimestampOracle::new());
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let oracle = Arc::clone(&oracle);
            std::thread::spawn(move || (0..500).map(|_| oracle.next()).collect::<Vec<_>>())
        })
        .collect();

    let mut all: Vec<i64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    let count = all.len();
    all.sort_unstable();
    all.dedup();
    assert_eq!(all.len(), count, "timestamps must never repeat");
}
