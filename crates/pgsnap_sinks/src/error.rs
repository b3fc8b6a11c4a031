use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by snapshot layout, staging and upload.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Invalid {kind} name '{value}': {reason}")]
    InvalidSegment {
        kind: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("{message}: {path}")]
    Io {
        message: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read Parquet footer: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Bucket '{0}' does not exist")]
    BucketMissing(String),

    #[error("Cannot reach bucket '{bucket}': {source}")]
    BucketUnreachable {
        bucket: String,
        #[source]
        source: object_store::Error,
    },

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Object store configuration error: {0}")]
    Config(String),
}

pub type SinkResult<T> = std::result::Result<T, SinkError>;

impl SinkError {
    pub(crate) fn io(
        message: impl Into<String>,
        path: impl Into<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        SinkError::Io {
            message: message.into(),
            path: path.into(),
            source,
        }
    }

    /// The bucket a bucket check failed on.
    pub fn bucket(&self) -> Option<&str> {
        match self {
            SinkError::BucketMissing(bucket) | SinkError::BucketUnreachable { bucket, .. } => {
                Some(bucket)
            }
            _ => None,
        }
    }
}
