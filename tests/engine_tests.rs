//! Integration tests for the Engine
//!
//! These tests verify:
//! - The basic table workflow (create, put, get, scan, delete, drop)
//! - Schema and lifecycle errors
//! - Durability: WAL recovery, flush, WAL retirement, compaction
//! - Failed flushes keep data in memory and in the WAL until a retry works
//! - Family alteration without resurrection of old cells
//! - Concurrent writers, atomic batches, disable quiescing

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use cellstore::{Cell, Config, Engine, Mutation, ScanOptions, StoreError};
use tempfile::TempDir;

/// Engine without a background thread, so flushes happen only on request
fn open_engine(dir: &TempDir) -> Engine {
    Engine::open(
        Config::builder()
            .data_dir(dir.path())
            .background_threads_enabled(false)
            .build(),
    )
    .unwrap()
}

fn scores_table(engine: &Engine) {
    engine
        .admin()
        .create_table("scores", &["grade", "course"])
        .unwrap();
}

fn describe(cells: &[Cell]) -> Vec<(String, String, String)> {
    cells
        .iter()
        .map(|c| {
            (
                c.family().to_string(),
                String::from_utf8_lossy(c.qualifier()).into_owned(),
                String::from_utf8_lossy(c.value()).into_owned(),
            )
        })
        .collect()
}

fn triple(family: &str, qualifier: &str, value: &str) -> (String, String, String) {
    (family.to_string(), qualifier.to_string(), value.to_string())
}

// =============================================================================
// Basic Workflow
// =============================================================================

#[test]
fn test_scores_workflow() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let admin = engine.admin();

    assert!(!admin.table_exists("scores"));
    scores_table(&engine);
    assert!(admin.table_exists("scores"));
    assert_eq!(admin.list_tables(), vec!["scores"]);

    let desc = admin.describe_table("scores").unwrap();
    assert_eq!(desc.family_names(), vec!["course", "grade"]);

    engine
        .put(
            "scores",
            b"tom",
            [("grade", "", "5"), ("course", "math", "97"), ("course", "art", "87")],
        )
        .unwrap();
    engine
        .put("scores", b"amy", [("grade", "", "4"), ("course", "math", "89")])
        .unwrap();

    let tom = engine.get("scores", b"tom").unwrap();
    assert_eq!(
        describe(&tom),
        vec![
            triple("course", "art", "87"),
            triple("course", "math", "97"),
            triple("grade", "", "5"),
        ]
    );

    let courses = engine.get_families("scores", b"tom", &["course"]).unwrap();
    assert_eq!(courses.len(), 2);
    assert!(courses.iter().all(|c| c.family() == "course"));

    let rows: Vec<Vec<u8>> = engine
        .scan("scores", None, None)
        .unwrap()
        .map(|r| r.unwrap().row().to_vec())
        .collect();
    assert_eq!(rows, vec![b"amy".to_vec(), b"tom".to_vec()]);

    engine.delete("scores", b"tom", None, None).unwrap();
    assert!(engine.get("scores", b"tom").unwrap().is_empty());
    assert_eq!(engine.scan("scores", None, None).unwrap().count(), 1);

    admin.disable_table("scores").unwrap();
    admin.drop_table("scores").unwrap();
    assert!(!admin.table_exists("scores"));
    assert!(matches!(
        admin.describe_table("scores"),
        Err(StoreError::TableNotFound(_))
    ));
}

#[test]
fn test_get_missing_row_is_empty() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    assert!(engine.get("scores", b"nobody").unwrap().is_empty());
}

#[test]
fn test_overwrite_returns_newest_value() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    for value in ["1", "2", "3"] {
        engine.put("scores", b"tom", [("grade", "", value)]).unwrap();
    }

    let cells = engine.get("scores", b"tom").unwrap();
    assert_eq!(cells.len(), 1);
    assert_eq!(cells[0].value(), b"3");
}

#[test]
fn test_explicit_older_timestamp_does_not_win() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    engine.put("scores", b"tom", [("grade", "", "current")]).unwrap();
    engine
        .mutate("scores", Mutation::new("tom").put_at("grade", "", 1, "ancient"))
        .unwrap();

    let cells = engine.get("scores", b"tom").unwrap();
    assert_eq!(cells[0].value(), b"current");
}

// =============================================================================
// Deletes
// =============================================================================

#[test]
fn test_delete_column_and_family() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    engine
        .put(
            "scores",
            b"tom",
            [("grade", "", "5"), ("course", "math", "97"), ("course", "art", "87")],
        )
        .unwrap();

    engine
        .delete("scores", b"tom", Some("course"), Some(&b"math"[..]))
        .unwrap();
    assert_eq!(
        describe(&engine.get("scores", b"tom").unwrap()),
        vec![triple("course", "art", "87"), triple("grade", "", "5")]
    );

    engine.delete("scores", b"tom", Some("course"), None).unwrap();
    assert_eq!(
        describe(&engine.get("scores", b"tom").unwrap()),
        vec![triple("grade", "", "5")]
    );
}

#[test]
fn test_put_after_delete_is_visible() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
    engine.delete("scores", b"tom", None, None).unwrap();
    engine.put("scores", b"tom", [("grade", "", "6")]).unwrap();

    let cells = engine.get("scores", b"tom").unwrap();
    assert_eq!(describe(&cells), vec![triple("grade", "", "6")]);
}

#[test]
fn test_delete_survives_flush() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
    engine.flush().unwrap();
    engine.delete("scores", b"tom", None, None).unwrap();
    engine.flush().unwrap();

    assert_eq!(engine.segment_count("scores").unwrap(), 2);
    assert!(engine.get("scores", b"tom").unwrap().is_empty());
}

// =============================================================================
// Schema and Lifecycle Errors
// =============================================================================

#[test]
fn test_write_to_missing_table() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);

    assert!(matches!(
        engine.put("nope", b"r", [("cf", "q", "v")]),
        Err(StoreError::TableNotFound(_))
    ));
    assert!(matches!(
        engine.get("nope", b"r"),
        Err(StoreError::TableNotFound(_))
    ));
}

#[test]
fn test_invalid_family_rejects_whole_batch() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    let result = engine.put("scores", b"tom", [("grade", "", "5"), ("bogus", "q", "v")]);
    assert!(matches!(result, Err(StoreError::InvalidFamily { .. })));
    assert!(engine.get("scores", b"tom").unwrap().is_empty());
    assert_eq!(engine.memtable_entry_count("scores").unwrap(), 0);

    assert!(matches!(
        engine.get_families("scores", b"tom", &["bogus"]),
        Err(StoreError::InvalidFamily { .. })
    ));
}

#[test]
fn test_malformed_requests() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    assert!(matches!(
        engine.mutate("scores", Mutation::new("tom")),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.delete("scores", b"tom", None, Some(&b"q"[..])),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(matches!(
        engine.admin().create_table("empty", &[]),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn test_oversized_family_name_rejected() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let family = "f".repeat(70_000);

    assert!(matches!(
        engine.admin().create_table("wide", &[family.as_str()]),
        Err(StoreError::InvalidArgument(_))
    ));
    assert!(!engine.admin().table_exists("wide"));

    scores_table(&engine);
    engine.admin().disable_table("scores").unwrap();
    assert!(matches!(
        engine.admin().add_family("scores", &family),
        Err(StoreError::InvalidArgument(_))
    ));
}

#[test]
fn test_disabled_table_rejects_data_operations() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);
    engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();

    engine.admin().disable_table("scores").unwrap();
    assert!(!engine.admin().is_table_enabled("scores").unwrap());

    assert!(matches!(
        engine.put("scores", b"tom", [("grade", "", "6")]),
        Err(StoreError::TableDisabled(_))
    ));
    assert!(matches!(
        engine.get("scores", b"tom"),
        Err(StoreError::TableDisabled(_))
    ));
    assert!(matches!(
        engine.scan("scores", None, None),
        Err(StoreError::TableDisabled(_))
    ));

    engine.admin().enable_table("scores").unwrap();
    let cells = engine.get("scores", b"tom").unwrap();
    assert_eq!(cells[0].value(), b"5");
}

#[test]
fn test_drop_enabled_table_fails() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    assert!(matches!(
        engine.admin().drop_table("scores"),
        Err(StoreError::TableEnabled(_))
    ));
    assert!(engine.admin().table_exists("scores"));
}

#[test]
fn test_drop_removes_table_data() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);
    engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
    engine.flush().unwrap();

    let table_dir = engine.table_dir("scores").unwrap();
    assert!(table_dir.exists());

    engine.admin().disable_table("scores").unwrap();
    engine.admin().drop_table("scores").unwrap();
    assert!(!table_dir.exists());
}

#[test]
fn test_recreated_table_starts_empty() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let admin = engine.admin();

    scores_table(&engine);
    engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
    admin.disable_table("scores").unwrap();
    admin.drop_table("scores").unwrap();

    scores_table(&engine);
    assert!(engine.get("scores", b"tom").unwrap().is_empty());
}

// =============================================================================
// Durability
// =============================================================================

#[test]
fn test_unflushed_writes_recovered_from_wal() {
    let dir = TempDir::new().unwrap();
    {
        let engine = open_engine(&dir);
        scores_table(&engine);
        engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
        engine.put("scores", b"amy", [("course", "math", "89")]).unwrap();
        engine.delete("scores", b"amy", None, None).unwrap();
        // dropped without close: only the WAL has the data
    }

    let engine = open_engine(&dir);
    let tom = engine.get("scores", b"tom").unwrap();
    assert_eq!(tom[0].value(), b"5");
    assert!(engine.get("scores", b"amy").unwrap().is_empty());

    // recovery flushed the replayed data and retired the old log files
    assert_eq!(engine.segment_count("scores").unwrap(), 1);
    assert_eq!(engine.memtable_entry_count("scores").unwrap(), 0);
    assert_eq!(engine.wal_file_count().unwrap(), 1);
}

#[test]
fn test_close_and_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let engine = open_engine(&dir);
        scores_table(&engine);
        engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
        engine.admin().disable_table("scores").unwrap();
        engine.close().unwrap();
    }

    let engine = open_engine(&dir);
    let admin = engine.admin();
    assert!(!admin.is_table_enabled("scores").unwrap());
    admin.enable_table("scores").unwrap();
    assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"5");
}

#[test]
fn test_torn_wal_tail_is_ignored() {
    let dir = TempDir::new().unwrap();
    {
        let engine = open_engine(&dir);
        scores_table(&engine);
        engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
    }

    let wal_dir = dir.path().join("wal");
    let mut logs: Vec<_> = std::fs::read_dir(&wal_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    logs.sort();
    let last = logs.last().unwrap();
    let mut bytes = std::fs::read(last).unwrap();
    bytes.extend_from_slice(&[0xde, 0xad, 0xbe]);
    std::fs::write(last, bytes).unwrap();

    let engine = open_engine(&dir);
    assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"5");
    engine.put("scores", b"amy", [("grade", "", "4")]).unwrap();
    assert_eq!(engine.get("scores", b"amy").unwrap().len(), 1);
}

#[test]
fn test_writes_after_restart_beat_future_timestamps() {
    let dir = TempDir::new().unwrap();
    let future = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_millis() as i64
        + 3_600_000;
    {
        let engine = open_engine(&dir);
        scores_table(&engine);
        // amy reaches a segment, tom stays in the WAL only
        engine
            .mutate("scores", Mutation::new("amy").put_at("grade", "", future, "ahead"))
            .unwrap();
        engine.flush().unwrap();
        engine
            .mutate("scores", Mutation::new("tom").put_at("grade", "", future + 1, "ahead"))
            .unwrap();
    }

    let engine = open_engine(&dir);
    engine.put("scores", b"amy", [("grade", "", "now")]).unwrap();
    engine.put("scores", b"tom", [("grade", "", "now")]).unwrap();
    assert_eq!(engine.get("scores", b"amy").unwrap()[0].value(), b"now");
    assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"now");
}

#[test]
fn test_failed_flush_keeps_memtable_and_wal() {
    let dir = TempDir::new().unwrap();
    {
        let engine = open_engine(&dir);
        scores_table(&engine);
        engine.put("scores", b"tom", [("grade", "", "5")]).unwrap();
        let wal_files = engine.wal_file_count().unwrap();

        let table_dir = engine.table_dir("scores").unwrap();
        std::fs::remove_dir_all(&table_dir).unwrap();

        assert!(engine.flush().is_err());
        assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"5");
        assert_eq!(engine.memtable_entry_count("scores").unwrap(), 1);
        assert_eq!(engine.segment_count("scores").unwrap(), 0);
        assert!(engine.wal_file_count().unwrap() >= wal_files);

        std::fs::create_dir_all(&table_dir).unwrap();
        engine.flush().unwrap();
        assert_eq!(engine.memtable_entry_count("scores").unwrap(), 0);
        assert_eq!(engine.segment_count("scores").unwrap(), 1);
        assert_eq!(engine.wal_file_count().unwrap(), 1);
        engine.close().unwrap();
    }

    let engine = open_engine(&dir);
    assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"5");
}

#[test]
fn test_dropped_table_not_resurrected_after_restart() {
    let dir = TempDir::new().unwrap();
    {
        let engine = open_engine(&dir);
        scores_table(&engine);
        engine.put("scores", b"tom", [("grade", "", "old")]).unwrap();
        engine.admin().disable_table("scores").unwrap();
        engine.admin().drop_table("scores").unwrap();

        scores_table(&engine);
        engine.put("scores", b"amy", [("grade", "", "new")]).unwrap();
    }

    let engine = open_engine(&dir);
    assert!(engine.get("scores", b"tom").unwrap().is_empty());
    assert_eq!(engine.get("scores", b"amy").unwrap()[0].value(), b"new");
}

#[test]
fn test_flush_moves_data_to_segments_and_retires_wal() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    for i in 0..50 {
        engine
            .put("scores", format!("row{:03}", i).as_bytes(), [("grade", "", "x")])
            .unwrap();
    }
    assert_eq!(engine.memtable_entry_count("scores").unwrap(), 50);
    assert!(engine.memtable_size("scores").unwrap() > 0);

    engine.flush().unwrap();

    assert_eq!(engine.memtable_entry_count("scores").unwrap(), 0);
    assert_eq!(engine.memtable_size("scores").unwrap(), 0);
    assert_eq!(engine.segment_count("scores").unwrap(), 1);
    assert_eq!(engine.wal_file_count().unwrap(), 1);
    assert_eq!(engine.scan("scores", None, None).unwrap().count(), 50);
}

#[test]
fn test_flush_of_empty_store_is_noop() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    engine.flush().unwrap();
    assert_eq!(engine.segment_count("scores").unwrap(), 0);
    assert_eq!(engine.wal_file_count().unwrap(), 1);
}

#[test]
fn test_reads_merge_memtable_and_segments() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    engine
        .put("scores", b"tom", [("grade", "", "5"), ("course", "math", "70")])
        .unwrap();
    engine.flush().unwrap();
    engine.put("scores", b"tom", [("course", "math", "97")]).unwrap();

    assert_eq!(
        describe(&engine.get("scores", b"tom").unwrap()),
        vec![triple("course", "math", "97"), triple("grade", "", "5")]
    );
}

#[test]
fn test_compaction_preserves_visible_state() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    for round in 0..4 {
        engine
            .put(
                "scores",
                b"tom",
                [("course", "math", format!("{}", 90 + round).as_str())],
            )
            .unwrap();
        engine
            .put(
                "scores",
                format!("student{}", round).as_bytes(),
                [("grade", "", "1")],
            )
            .unwrap();
        engine.flush().unwrap();
    }
    engine.delete("scores", b"student0", None, None).unwrap();
    engine.flush().unwrap();
    assert_eq!(engine.segment_count("scores").unwrap(), 5);

    let before: Vec<_> = engine
        .scan("scores", None, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    let stats = engine.compact("scores").unwrap();
    assert_eq!(stats.input_segments, 5);
    assert_eq!(stats.dropped_versions, 4);
    assert_eq!(engine.segment_count("scores").unwrap(), 1);

    let after: Vec<_> = engine
        .scan("scores", None, None)
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(before, after);
    assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"93");

    // compacted data survives a restart
    drop(engine);
    let engine = open_engine(&dir);
    assert_eq!(engine.segment_count("scores").unwrap(), 1);
    assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"93");
}

#[test]
fn test_compaction_keeps_tombstone_masking_unflushed_older_write() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(
        Config::builder()
            .data_dir(dir.path())
            .background_threads_enabled(false)
            .tombstone_retention(Duration::ZERO)
            .build(),
    )
    .unwrap();
    scores_table(&engine);

    engine
        .mutate("scores", Mutation::new("tom").put_at("grade", "", 5, "first"))
        .unwrap();
    engine.flush().unwrap();
    engine.delete("scores", b"tom", None, None).unwrap();
    engine.flush().unwrap();

    // written after the delete, timestamped before it
    engine
        .mutate("scores", Mutation::new("tom").put_at("grade", "", 6, "late"))
        .unwrap();
    assert!(engine.get("scores", b"tom").unwrap().is_empty());

    thread::sleep(Duration::from_millis(5));
    engine.compact("scores").unwrap();
    assert!(engine.get("scores", b"tom").unwrap().is_empty());

    // once everything is in segments the tombstone can go
    engine.flush().unwrap();
    let stats = engine.compact("scores").unwrap();
    assert_eq!(stats.purged_tombstones, 1);
    assert!(engine.get("scores", b"tom").unwrap().is_empty());
    assert_eq!(engine.scan("scores", None, None).unwrap().count(), 0);
}

#[test]
fn test_compacting_without_segments_does_nothing() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    let stats = engine.compact("scores").unwrap();
    assert_eq!(stats.input_segments, 0);
}

// =============================================================================
// Family Alteration
// =============================================================================

#[test]
fn test_removed_family_does_not_resurrect() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    let admin = engine.admin();
    scores_table(&engine);

    engine
        .put("scores", b"tom", [("grade", "", "5"), ("course", "math", "97")])
        .unwrap();
    engine.flush().unwrap();
    engine.put("scores", b"amy", [("course", "art", "80")]).unwrap();

    admin.disable_table("scores").unwrap();
    admin.remove_family("scores", "course").unwrap();
    admin.enable_table("scores").unwrap();

    assert_eq!(
        describe(&engine.get("scores", b"tom").unwrap()),
        vec![triple("grade", "", "5")]
    );
    assert!(matches!(
        engine.put("scores", b"tom", [("course", "math", "1")]),
        Err(StoreError::InvalidFamily { .. })
    ));

    admin.disable_table("scores").unwrap();
    admin.add_family("scores", "course").unwrap();
    admin.enable_table("scores").unwrap();

    assert_eq!(engine.get("scores", b"tom").unwrap().len(), 1);
    assert!(engine.get("scores", b"amy").unwrap().is_empty());

    engine.put("scores", b"amy", [("course", "art", "99")]).unwrap();
    assert_eq!(
        describe(&engine.get("scores", b"amy").unwrap()),
        vec![triple("course", "art", "99")]
    );
}

#[test]
fn test_alter_requires_disabled_table() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    assert!(matches!(
        engine.admin().add_family("scores", "extra"),
        Err(StoreError::TableEnabled(_))
    ));
    assert!(matches!(
        engine.admin().remove_family("scores", "grade"),
        Err(StoreError::TableEnabled(_))
    ));
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn test_concurrent_writers_and_atomic_batches() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(open_engine(&dir));
    scores_table(&engine);
    let stop = Arc::new(AtomicBool::new(false));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for i in 0..100 {
                    let row = format!("w{}-{:03}", t, i);
                    engine
                        .put(
                            "scores",
                            row.as_bytes(),
                            [("grade", "", "1"), ("course", "a", "2"), ("course", "b", "3")],
                        )
                        .unwrap();
                    if i % 40 == 0 {
                        engine.flush().unwrap();
                    }
                }
            })
        })
        .collect();

    let reader = {
        let engine = Arc::clone(&engine);
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            while !stop.load(Ordering::Relaxed) {
                for row in engine.scan("scores", None, None).unwrap() {
                    let row = row.unwrap();
                    assert_eq!(row.len(), 3, "partial batch visible");
                }
            }
        })
    };

    for w in writers {
        w.join().unwrap();
    }
    stop.store(true, Ordering::Relaxed);
    reader.join().unwrap();

    assert_eq!(engine.scan("scores", None, None).unwrap().count(), 400);
}

#[test]
fn test_disable_waits_for_admitted_writes() {
    let dir = TempDir::new().unwrap();
    let engine = Arc::new(open_engine(&dir));
    scores_table(&engine);
    let stop = Arc::new(AtomicBool::new(false));
    let accepted = Arc::new(AtomicUsize::new(0));

    let writers: Vec<_> = (0..4)
        .map(|t| {
            let engine = Arc::clone(&engine);
            let stop = Arc::clone(&stop);
            let accepted = Arc::clone(&accepted);
            thread::spawn(move || {
                let mut i = 0;
                while !stop.load(Ordering::Relaxed) {
                    let row = format!("w{}-{:06}", t, i);
                    match engine.put("scores", row.as_bytes(), [("grade", "", "1")]) {
                        Ok(()) => {
                            accepted.fetch_add(1, Ordering::SeqCst);
                        }
                        Err(StoreError::TableDisabled(_)) => {}
                        Err(e) => panic!("unexpected error: {}", e),
                    }
                    i += 1;
                }
            })
        })
        .collect();

    thread::sleep(Duration::from_millis(50));
    engine.admin().disable_table("scores").unwrap();
    assert!(matches!(
        engine.put("scores", b"late", [("grade", "", "1")]),
        Err(StoreError::TableDisabled(_))
    ));
    thread::sleep(Duration::from_millis(20));

    stop.store(true, Ordering::Relaxed);
    for w in writers {
        w.join().unwrap();
    }

    // every accepted write landed, every rejected one left no trace
    engine.admin().enable_table("scores").unwrap();
    let visible = engine.scan("scores", None, None).unwrap().count();
    assert_eq!(visible, accepted.load(Ordering::SeqCst));
    assert!(visible > 0);
}

// =============================================================================
// Background Worker
// =============================================================================

#[test]
fn test_background_worker_flushes_full_memtables() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(
        Config::builder()
            .data_dir(dir.path())
            .memtable_size_limit(4 * 1024)
            .background_interval(Duration::from_millis(20))
            .build(),
    )
    .unwrap();
    scores_table(&engine);

    let value = "v".repeat(256);
    for i in 0..64 {
        engine
            .put("scores", format!("row{:03}", i).as_bytes(), [("grade", "", value.as_str())])
            .unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.segment_count("scores").unwrap() == 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(engine.segment_count("scores").unwrap() > 0);
    assert_eq!(engine.scan("scores", None, None).unwrap().count(), 64);

    engine.close().unwrap();
}

#[test]
fn test_background_worker_recovers_after_failed_flush() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(
        Config::builder()
            .data_dir(dir.path())
            .memtable_size_limit(4 * 1024)
            .background_interval(Duration::from_millis(20))
            .retry_backoff(Duration::from_millis(10), Duration::from_millis(50))
            .build(),
    )
    .unwrap();
    scores_table(&engine);
    let table_dir = engine.table_dir("scores").unwrap();
    std::fs::remove_dir_all(&table_dir).unwrap();

    // every row alone passes the limit, so no memtable is left below it
    let value = "v".repeat(8 * 1024);
    for i in 0..8 {
        engine
            .put("scores", format!("row{:03}", i).as_bytes(), [("grade", "", value.as_str())])
            .unwrap();
    }

    // the worker froze the memtable and keeps failing to write it out
    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.wal_file_count().unwrap() < 2 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    thread::sleep(Duration::from_millis(100));
    assert_eq!(engine.segment_count("scores").unwrap(), 0);
    assert_eq!(engine.scan("scores", None, None).unwrap().count(), 8);

    std::fs::create_dir_all(&table_dir).unwrap();
    let deadline = Instant::now() + Duration::from_secs(10);
    while (engine.segment_count("scores").unwrap() == 0
        || engine.memtable_entry_count("scores").unwrap() > 0)
        && Instant::now() < deadline
    {
        thread::sleep(Duration::from_millis(20));
    }
    assert!(engine.segment_count("scores").unwrap() >= 1);
    assert_eq!(engine.memtable_entry_count("scores").unwrap(), 0);
    assert_eq!(engine.scan("scores", None, None).unwrap().count(), 8);

    engine.close().unwrap();
}

#[test]
fn test_background_worker_compacts_past_trigger() {
    let dir = TempDir::new().unwrap();
    let engine = Engine::open(
        Config::builder()
            .data_dir(dir.path())
            .compaction_segment_trigger(3)
            .background_interval(Duration::from_millis(20))
            .build(),
    )
    .unwrap();
    scores_table(&engine);

    for i in 0..3 {
        engine
            .put("scores", b"tom", [("grade", "", format!("{}", i).as_str())])
            .unwrap();
        engine.flush().unwrap();
    }

    let deadline = Instant::now() + Duration::from_secs(10);
    while engine.segment_count("scores").unwrap() > 1 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(20));
    }
    assert_eq!(engine.segment_count("scores").unwrap(), 1);
    assert_eq!(engine.get("scores", b"tom").unwrap()[0].value(), b"2");
}

// =============================================================================
// Scan Options
// =============================================================================

#[test]
fn test_scan_with_family_filter() {
    let dir = TempDir::new().unwrap();
    let engine = open_engine(&dir);
    scores_table(&engine);

    engine
        .put("scores", b"tom", [("grade", "", "5"), ("course", "math", "97")])
        .unwrap();
    engine.put("scores", b"amy", [("grade", "", "4")]).unwrap();

    let rows: Vec<_> = engine
        .scan_with("scores", ScanOptions::new().family("course"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    // rows without cells in the family are skipped
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].row(), b"tom");
    assert_eq!(rows[0].value("course", b"math"), Some(&b"97"[..]));
    assert_eq!(rows[0].value("grade", b""), None);
}
