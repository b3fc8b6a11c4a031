//! COPY-to-Parquet behavior against local DuckDB tables.
//!
//! The in-memory catalog stands in for an attached PostgreSQL database: the
//! COPY path is identical once a relation is addressable as
//! `catalog.schema.table`.

use pgsnap_db::{ParquetCompression, ParquetOptions, Relation, Session};
use tempfile::tempdir;

fn seeded_session() -> Session {
    let session = Session::open_in_memory().unwrap();
    session
        .execute_batch(
            "CREATE TABLE orders AS \
             SELECT range AS id, 'order-' || range AS label FROM range(250);\
             CREATE TABLE \"Order Items\" (\"Item Id\" INTEGER, qty INTEGER);\
             INSERT INTO \"Order Items\" VALUES (1, 2), (2, 5);",
        )
        .unwrap();
    session
}

fn scalar_i64(session: &Session, sql: &str) -> i64 {
    session
        .connection()
        .query_row(sql, [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_copy_writes_all_rows() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("orders.parquet");
    let session = seeded_session();

    session
        .copy_to_parquet(
            &Relation::new("memory", "main", "orders"),
            &dest,
            &ParquetOptions::default(),
        )
        .unwrap();

    assert!(dest.exists());
    let count = scalar_i64(
        &session,
        &format!("SELECT COUNT(*) FROM read_parquet('{}')", dest.display()),
    );
    assert_eq!(count, 250);
}

#[test]
fn test_copy_honors_row_group_size_and_codec() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("orders.parquet");
    let session = seeded_session();

    let options = ParquetOptions {
        compression: ParquetCompression::Zstd,
        row_group_size: 100,
    };
    session
        .copy_to_parquet(&Relation::new("memory", "main", "orders"), &dest, &options)
        .unwrap();

    let row_groups = scalar_i64(
        &session,
        &format!(
            "SELECT COUNT(DISTINCT row_group_id) FROM parquet_metadata('{}')",
            dest.display()
        ),
    );
    assert_eq!(row_groups, 3);

    let codec: String = session
        .connection()
        .query_row(
            &format!(
                "SELECT DISTINCT compression FROM parquet_metadata('{}')",
                dest.display()
            ),
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(codec.to_ascii_uppercase(), "ZSTD");
}

#[test]
fn test_copy_quotes_mixed_case_names() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("order_items.parquet");
    let session = seeded_session();

    session
        .copy_to_parquet(
            &Relation::new("memory", "main", "Order Items"),
            &dest,
            &ParquetOptions::default(),
        )
        .unwrap();

    let qty = scalar_i64(
        &session,
        &format!("SELECT SUM(qty) FROM read_parquet('{}')", dest.display()),
    );
    assert_eq!(qty, 7);
}

#[test]
fn test_copy_missing_relation_fails() {
    let dir = tempdir().unwrap();
    let dest = dir.path().join("missing.parquet");
    let session = seeded_session();

    let result = session.copy_to_parquet(
        &Relation::new("memory", "main", "does_not_exist"),
        &dest,
        &ParquetOptions::default(),
    );
    assert!(result.is_err());
    assert!(!dest.exists());
}
