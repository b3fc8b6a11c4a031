//! Snapshot sinks.
//!
//! Each exported table ends up as one Parquet file under the mounted
//! snapshot volume and, optionally, as one object in an S3-compatible bucket.
//! Sinks handle:
//! - Directory layout and snapshot file naming
//! - Staged writes with atomic promotion
//! - Footer verification of committed files
//! - Object upload

mod error;
mod layout;
mod object;
mod staged;

pub use error::{SinkError, SinkResult};
pub use layout::{snapshot_filename, validate_segment, SnapshotLayout, SnapshotTarget};
pub use object::{ObjectSink, ObjectStoreSettings, UploadedObject};
pub use staged::{parquet_row_count, StagedFile};
