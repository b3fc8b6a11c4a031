//! Single-writer lock on a schema's snapshot directory.
//!
//! Two exporters writing the same `instance/database/schema` tree would race
//! on table directories. The lock is an advisory `fs2` lock on `.pgsnap.lock`
//! inside the schema directory; while held, the file records who holds it so
//! a refused run can name the other process.

use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const LOCK_FILE_NAME: &str = ".pgsnap.lock";

/// Process recorded in a held lock file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockHolder {
    pub pid: u32,
    pub started_at: DateTime<Utc>,
}

impl fmt::Display for LockHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {} since {}", self.pid, self.started_at.to_rfc3339())
    }
}

#[derive(Debug, Error)]
pub enum LockError {
    #[error("Snapshot directory {} is locked by {}", .dir.display(), holder_label(.holder))]
    Locked {
        dir: PathBuf,
        holder: Option<LockHolder>,
    },

    #[error("Failed to open lock file {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to lock {}: {source}", .path.display())]
    Acquire {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

fn holder_label(holder: &Option<LockHolder>) -> String {
    match holder {
        Some(holder) => holder.to_string(),
        None => "another process".to_string(),
    }
}

/// Held lock; released (and the holder record cleared) on drop.
pub struct SnapshotLockGuard {
    file: File,
    path: PathBuf,
}

impl SnapshotLockGuard {
    pub fn lock_path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SnapshotLockGuard {
    fn drop(&mut self) {
        if let Err(e) = self.file.set_len(0) {
            warn!("Failed to clear lock holder in {}: {}", self.path.display(), e);
        }
        if let Err(e) = FileExt::unlock(&self.file) {
            warn!("Failed to release {}: {}", self.path.display(), e);
        }
        debug!("Released snapshot lock: {}", self.path.display());
    }
}

impl fmt::Debug for SnapshotLockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotLockGuard")
            .field("path", &self.path)
            .finish()
    }
}

pub fn lock_path_for(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE_NAME)
}

/// Holder recorded in `dir`'s lock file, if any.
pub fn read_holder(dir: &Path) -> Option<LockHolder> {
    let content = fs::read_to_string(lock_path_for(dir)).ok()?;
    serde_json::from_str(content.trim()).ok()
}

/// Take the lock on `dir` without waiting, creating the directory if needed.
pub fn try_lock_exclusive(dir: &Path) -> Result<SnapshotLockGuard, LockError> {
    let path = lock_path_for(dir);
    let open_err = |source| LockError::Open {
        path: path.clone(),
        source,
    };

    fs::create_dir_all(dir).map_err(open_err)?;
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(&path)
        .map_err(open_err)?;

    // Fully qualified: newer std has an inherent File::try_lock_exclusive
    if let Err(e) = FileExt::try_lock_exclusive(&file) {
        if e.kind() != io::ErrorKind::WouldBlock {
            return Err(LockError::Acquire { path, source: e });
        }
        let mut content = String::new();
        let holder = file
            .read_to_string(&mut content)
            .ok()
            .and_then(|_| serde_json::from_str(content.trim()).ok());
        debug!(holder = ?holder, "Snapshot directory already locked");
        return Err(LockError::Locked {
            dir: dir.to_path_buf(),
            holder,
        });
    }

    let holder = LockHolder {
        pid: std::process::id(),
        started_at: Utc::now(),
    };
    if let Err(e) = record_holder(&mut file, &holder) {
        warn!("Failed to record lock holder in {}: {}", path.display(), e);
    }

    info!("Acquired snapshot lock: {}", path.display());
    Ok(SnapshotLockGuard { file, path })
}

fn record_holder(file: &mut File, holder: &LockHolder) -> io::Result<()> {
    let payload = serde_json::to_vec(holder).map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(&payload)?;
    file.flush()
}
