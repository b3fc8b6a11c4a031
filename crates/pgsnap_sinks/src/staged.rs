//! Staged snapshot files.
//!
//! The engine writes to `.{filename}.tmp` next to the final path; `commit`
//! renames it into place so readers of the mount only ever see complete files.

use crate::error::{SinkError, SinkResult};
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

pub struct StagedFile {
    temp_path: PathBuf,
    final_path: PathBuf,
    committed: bool,
}

impl StagedFile {
    pub fn new(final_path: impl Into<PathBuf>) -> SinkResult<Self> {
        let final_path = final_path.into();
        let filename = final_path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| SinkError::InvalidSegment {
                kind: "file",
                value: final_path.display().to_string(),
                reason: "must end in a UTF-8 file name",
            })?;
        let temp_path = final_path.with_file_name(format!(".{}.tmp", filename));

        // Leftover from a crashed run
        if temp_path.exists() {
            std::fs::remove_file(&temp_path)
                .map_err(|e| SinkError::io("Failed to remove stale temp file", &temp_path, e))?;
            warn!("Removed stale temp file: {}", temp_path.display());
        }

        Ok(Self {
            temp_path,
            final_path,
            committed: false,
        })
    }

    /// Path the engine should write to.
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Promote the temp file to its final name.
    pub fn commit(&mut self) -> SinkResult<&Path> {
        std::fs::rename(&self.temp_path, &self.final_path).map_err(|e| {
            SinkError::io(
                format!("Failed to rename {}", self.temp_path.display()),
                &self.final_path,
                e,
            )
        })?;
        self.committed = true;
        info!("Committed snapshot: {}", self.final_path.display());
        Ok(&self.final_path)
    }

    /// Discard the temp file.
    pub fn rollback(&mut self) {
        if !self.committed && self.temp_path.exists() {
            match std::fs::remove_file(&self.temp_path) {
                Ok(()) => warn!("Rolled back temp file: {}", self.temp_path.display()),
                Err(e) => warn!(
                    "Failed to remove temp file {}: {}",
                    self.temp_path.display(),
                    e
                ),
            }
        }
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        self.rollback();
    }
}

/// Row count recorded in a Parquet file's footer.
pub fn parquet_row_count(path: &Path) -> SinkResult<u64> {
    let file =
        File::open(path).map_err(|e| SinkError::io("Failed to open snapshot file", path, e))?;
    let reader = SerializedFileReader::new(file)?;
    let rows = reader.metadata().file_metadata().num_rows();
    Ok(rows.max(0) as u64)
}
