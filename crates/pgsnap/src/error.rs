use pgsnap_db::{DbError, LockError};
use pgsnap_sinks::SinkError;
use std::path::PathBuf;
use thiserror::Error;

/// Failures that stop a run before or between tables.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to list tables: {0}")]
    ListTables(#[source] DbError),

    #[error(transparent)]
    Bucket(SinkError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Layout(SinkError),
}

/// Failure of a single table; recorded in the report, never fatal.
#[derive(Debug, Error)]
pub(crate) enum TableError {
    #[error(transparent)]
    Db(#[from] DbError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Row count mismatch in {path}: engine wrote {engine}, file footer has {footer}")]
    RowCountMismatch {
        path: PathBuf,
        engine: u64,
        footer: u64,
    },
}
