//! Engine layer for pgsnap.
//!
//! Wraps an in-memory DuckDB session that attaches a PostgreSQL database
//! read-only, discovers the base tables of one schema and copies each of
//! them out as a Parquet file.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pgsnap_db::{ExtensionSource, ParquetOptions, PostgresAttach, Relation, Session};
//!
//! let session = Session::open_in_memory()?;
//! session.install_postgres(&ExtensionSource::resolve("./duckdb/postgres_scanner.duckdb_extension"))?;
//! session.attach_postgres(&PostgresAttach::new(conn_str, "sales", "public"))?;
//!
//! for table in session.list_base_tables("sales", "public")? {
//!     let relation = Relation::new("sales", "public", &table);
//!     session.copy_to_parquet(&relation, &dest, &ParquetOptions::default())?;
//! }
//! ```

mod error;
pub mod lock;
mod options;
mod session;
pub mod sql;

pub use error::{DbError, Result};
pub use lock::{read_holder, try_lock_exclusive, LockError, LockHolder, SnapshotLockGuard};
pub use options::{ParquetCompression, ParquetOptions, DEFAULT_ROW_GROUP_SIZE};
pub use session::{ExtensionSource, PostgresAttach, Session};
pub use sql::Relation;
