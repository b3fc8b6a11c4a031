//! Error types for the engine layer.

use crate::lock::LockError;
use crate::sql::redact_conninfo;
use thiserror::Error;

/// Engine operation result type.
pub type Result<T> = std::result::Result<T, DbError>;

/// Engine errors.
#[derive(Error, Debug)]
pub enum DbError {
    /// DuckDB error (open, prepare, execute)
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// IO error (file system operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// DuckDB error whose message had credentials masked
    #[error("DuckDB error: {0}")]
    Engine(String),

    /// Installing or loading the postgres extension failed
    #[error("Extension error: {0}")]
    Extension(String),

    /// Attaching the source database failed
    #[error("Attach error: {0}")]
    Attach(String),

    /// Snapshot directory lock could not be taken
    #[error(transparent)]
    Lock(#[from] LockError),
}

impl DbError {
    /// Create an extension error.
    pub fn extension(msg: impl Into<String>) -> Self {
        Self::Extension(msg.into())
    }

    /// Create an attach error.
    pub fn attach(msg: impl Into<String>) -> Self {
        Self::Attach(msg.into())
    }

    /// Mask any conninfo password the engine echoed into the message.
    pub fn redacted(self) -> Self {
        match self {
            DbError::DuckDb(e) => DbError::Engine(redact_conninfo(&e.to_string())),
            DbError::Engine(msg) => DbError::Engine(redact_conninfo(&msg)),
            DbError::Extension(msg) => DbError::Extension(redact_conninfo(&msg)),
            DbError::Attach(msg) => DbError::Attach(redact_conninfo(&msg)),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_redacted_engine_error() {
        let err = DbError::from(duckdb::Error::InvalidParameterName(
            "Unable to connect to Postgres at host=db password=hunter2 user=u".to_string(),
        ))
        .redacted();
        let message = err.to_string();
        assert!(matches!(err, DbError::Engine(_)));
        assert!(!message.contains("hunter2"));
        assert!(message.contains("host=db password=*** user=u"));
    }

    #[test]
    fn test_redacted_keeps_other_errors() {
        let err = DbError::from(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
        assert!(matches!(err.redacted(), DbError::Io(_)));
    }
}
