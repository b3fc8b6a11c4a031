//! End-to-end of the local snapshot path: layout → staged COPY → commit →
//! footer verification → upload.

use chrono::NaiveDate;
use object_store::memory::InMemory;
use pgsnap_db::{ParquetOptions, Relation, Session};
use pgsnap_sinks::{parquet_row_count, ObjectSink, SnapshotLayout, StagedFile};
use std::sync::Arc;
use tempfile::tempdir;

fn session_with_rows(rows: usize) -> Session {
    let session = Session::open_in_memory().unwrap();
    session
        .execute_batch(&format!(
            "CREATE TABLE fact_orders AS SELECT range AS id, range * 2 AS amount FROM range({})",
            rows
        ))
        .unwrap();
    session
}

#[test]
fn test_staged_copy_commit_and_verify() {
    let root = tempdir().unwrap();
    let layout = SnapshotLayout::new(root.path(), "prod", "sales", "public").unwrap();
    let at = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let target = layout.target("fact_orders", at).unwrap();
    layout.ensure_table_dir(&target).unwrap();

    let session = session_with_rows(1234);
    let mut staged = StagedFile::new(&target.path).unwrap();
    session
        .copy_to_parquet(
            &Relation::new("memory", "main", "fact_orders"),
            staged.temp_path(),
            &ParquetOptions::default(),
        )
        .unwrap();
    assert!(!target.path.exists(), "final path must not appear before commit");

    staged.commit().unwrap();
    drop(staged);

    assert!(target.path.exists());
    assert_eq!(parquet_row_count(&target.path).unwrap(), 1234);

    let leftovers: Vec<_> = std::fs::read_dir(&target.dir)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect();
    assert_eq!(leftovers, vec!["20240601120000-full.parquet".to_string()]);
}

#[test]
fn test_failed_copy_leaves_no_files() {
    let root = tempdir().unwrap();
    let layout = SnapshotLayout::new(root.path(), "prod", "sales", "public").unwrap();
    let at = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap();
    let target = layout.target("missing", at).unwrap();
    layout.ensure_table_dir(&target).unwrap();

    let session = session_with_rows(1);
    let staged = StagedFile::new(&target.path).unwrap();
    let result = session.copy_to_parquet(
        &Relation::new("memory", "main", "missing"),
        staged.temp_path(),
        &ParquetOptions::default(),
    );
    assert!(result.is_err());
    drop(staged);

    assert_eq!(std::fs::read_dir(&target.dir).unwrap().count(), 0);
}

#[test]
fn test_committed_snapshot_uploads_under_object_key() {
    let root = tempdir().unwrap();
    let layout = SnapshotLayout::new(root.path(), "prod", "sales", "public").unwrap();
    let at = NaiveDate::from_ymd_opt(2024, 6, 1)
        .unwrap()
        .and_hms_opt(12, 30, 5)
        .unwrap();
    let target = layout.target("fact_orders", at).unwrap();
    layout.ensure_table_dir(&target).unwrap();

    let session = session_with_rows(10);
    let mut staged = StagedFile::new(&target.path).unwrap();
    session
        .copy_to_parquet(
            &Relation::new("memory", "main", "fact_orders"),
            staged.temp_path(),
            &ParquetOptions::default(),
        )
        .unwrap();
    staged.commit().unwrap();

    let sink = ObjectSink::from_store(Arc::new(InMemory::new()), "lake").unwrap();
    let uploaded = sink.upload_file(&target.path, &target.object_key).unwrap();

    assert_eq!(
        uploaded.location(),
        "lake/prod/public/fact_orders/20240601123005-full.parquet"
    );
    assert_eq!(
        uploaded.bytes,
        std::fs::metadata(&target.path).unwrap().len()
    );
}
