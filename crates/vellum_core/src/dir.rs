//! Store directory management.
//!
//! This module handles the file system layout for a persistent store:
//!
//! ```text
//! <base_dir>/
//! ├─ LOCK           # advisory lock for single-writer access
//! ├─ snapshot.json  # last committed snapshot (id → fields)
//! └─ wal.log        # JSON-lines WAL appended since the snapshot
//! ```
//!
//! The LOCK file ensures only one store instance writes to a directory at a
//! time; two instances sharing a directory would silently corrupt each
//! other's WAL.

use crate::error::{Error, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File names within the store directory.
const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "snapshot.json";
const SNAPSHOT_TEMP: &str = "snapshot.tmp";
const WAL_FILE: &str = "wal.log";

/// Manages the store directory structure and file locking.
///
/// Holding a `StoreDir` means holding the exclusive lock on the directory;
/// the lock is released when the value is dropped.
#[derive(Debug)]
pub struct StoreDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and acquires its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another instance holds the lock (returns [`Error::StoreLocked`])
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> Result<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(Error::invalid_argument(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        if !path.is_dir() {
            return Err(Error::invalid_argument(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(Error::StoreLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }

    /// Returns the path to the temporary file used for atomic snapshot writes.
    #[must_use]
    pub fn snapshot_temp_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_TEMP)
    }

    /// Returns the path to the WAL file.
    #[must_use]
    pub fn wal_path(&self) -> PathBuf {
        self.path.join(WAL_FILE)
    }
}
