//! On-disk and in-bucket layout of snapshot files.
//!
//! ```text
//! {root}/{instance}/{database}/{schema}/{table}/{YYYYMMDDHHMMSS}-full.parquet
//! {bucket}/{instance}/{schema}/{table}/{YYYYMMDDHHMMSS}-full.parquet
//! ```
//!
//! Object keys leave the database name out; existing buckets are laid out
//! that way.

use crate::error::{SinkError, SinkResult};
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

const SNAPSHOT_SUFFIX: &str = "-full.parquet";
const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Snapshot file name for a full export taken at `at`.
pub fn snapshot_filename(at: NaiveDateTime) -> String {
    format!("{}{}", at.format(TIMESTAMP_FORMAT), SNAPSHOT_SUFFIX)
}

/// Reject names that would not stay a single path segment.
pub fn validate_segment(kind: &'static str, value: &str) -> SinkResult<()> {
    let reason = if value.is_empty() {
        Some("must not be empty")
    } else if value == "." || value == ".." {
        Some("must not be a relative path component")
    } else if value.contains(|c: char| c == '/' || c == '\\') {
        Some("must not contain path separators")
    } else if value.contains('\0') {
        Some("must not contain NUL")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(SinkError::InvalidSegment {
            kind,
            value: value.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// Where one table's snapshot goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotTarget {
    pub table: String,
    pub dir: PathBuf,
    pub filename: String,
    pub path: PathBuf,
    pub object_key: String,
}

/// Snapshot tree for one `instance/database/schema`.
#[derive(Debug, Clone)]
pub struct SnapshotLayout {
    root: PathBuf,
    instance: String,
    database: String,
    schema: String,
}

impl SnapshotLayout {
    pub fn new(
        root: impl Into<PathBuf>,
        instance: &str,
        database: &str,
        schema: &str,
    ) -> SinkResult<Self> {
        validate_segment("instance", instance)?;
        validate_segment("database", database)?;
        validate_segment("schema", schema)?;
        Ok(Self {
            root: root.into(),
            instance: instance.to_string(),
            database: database.to_string(),
            schema: schema.to_string(),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `{root}/{instance}/{database}/{schema}`
    pub fn schema_dir(&self) -> PathBuf {
        self.root
            .join(&self.instance)
            .join(&self.database)
            .join(&self.schema)
    }

    /// `{root}/{instance}/{database}/{schema}/{table}`
    pub fn table_dir(&self, table: &str) -> SinkResult<PathBuf> {
        validate_segment("table", table)?;
        Ok(self.schema_dir().join(table))
    }

    /// `{instance}/{schema}/{table}/{filename}`
    pub fn object_key(&self, table: &str, filename: &str) -> String {
        format!("{}/{}/{}/{}", self.instance, self.schema, table, filename)
    }

    /// Resolve every location for a snapshot of `table` taken at `at`.
    pub fn target(&self, table: &str, at: NaiveDateTime) -> SinkResult<SnapshotTarget> {
        let dir = self.table_dir(table)?;
        let filename = snapshot_filename(at);
        Ok(SnapshotTarget {
            table: table.to_string(),
            path: dir.join(&filename),
            object_key: self.object_key(table, &filename),
            dir,
            filename,
        })
    }

    /// Create the table directory (idempotent).
    pub fn ensure_table_dir(&self, target: &SnapshotTarget) -> SinkResult<()> {
        std::fs::create_dir_all(&target.dir).map_err(|e| {
            SinkError::io("Failed to create snapshot directory", &target.dir, e)
        })
    }
}
