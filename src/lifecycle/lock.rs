//! lifecycle::lock
//!
//! Exclusive state-root lock for mutating runs.
//!
//! # Architecture
//!
//! The drift index, snapshot store, and lockfile writer all assume a
//! single active process per state root. The state lock enforces that:
//! the executor and lock-update hold it for the whole mutating run.
//!
//! Acquisition is non-blocking. While held, the lock file records who
//! owns the state root (`user@host, pid N, since <time>`), so a second
//! `pf` invocation fails with a contention error that names the holder
//! instead of a bare "resource busy". The record is cleared again on
//! release; a non-empty record without a live OS lock just means a
//! previous run crashed, and the next acquire overwrites it.
//!
//! # Invariants
//!
//! - Held for the entire non-dry-run execution and lock-update
//! - Released on drop, so a panicking run cannot wedge the state root
//! - A contention error carries the recorded owner when one is readable

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use chrono::Utc;
use fs2::FileExt;
use thiserror::Error;

use crate::core::paths::StatePaths;

/// Errors from state locking.
#[derive(Debug, Error)]
pub enum StateLockError {
    /// Another process holds the state root. `owner` is the identity
    /// the holder recorded at acquisition time, when readable.
    #[error("state root {} is in use by {}", root.display(), owner)]
    Contended {
        /// The contended state root.
        root: PathBuf,
        /// Recorded identity of the current holder.
        owner: String,
    },

    /// Releasing the OS lock failed; the state root may still appear
    /// busy to other processes until this process exits.
    #[error("failed to release state lock: {0}")]
    ReleaseFailed(String),

    /// I/O error preparing, acquiring, or stamping the lock file.
    #[error("state lock i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// An exclusive lock on the state root.
///
/// Dropping the guard releases the lock (best effort); call
/// [`StateLock::release`] to observe unlock failures.
#[derive(Debug)]
pub struct StateLock {
    path: PathBuf,
    file: Option<File>,
}

impl StateLock {
    /// Acquire the state-root lock, creating the state root if needed.
    ///
    /// Non-blocking: when another process holds the lock this returns
    /// [`StateLockError::Contended`] immediately, naming the recorded
    /// holder when the lock file is readable.
    pub fn acquire(paths: &StatePaths) -> Result<Self, StateLockError> {
        fs::create_dir_all(paths.state_root())?;
        let path = paths.lock_path();

        let file = File::options()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        if let Err(err) = file.try_lock_exclusive() {
            if err.kind() == ErrorKind::WouldBlock {
                return Err(StateLockError::Contended {
                    root: paths.state_root().to_path_buf(),
                    owner: read_owner(&path),
                });
            }
            return Err(err.into());
        }

        let mut lock = Self {
            path,
            file: Some(file),
        };
        lock.stamp_owner()?;
        Ok(lock)
    }

    /// Try to acquire the lock, returning `None` when contended.
    pub fn try_acquire(paths: &StatePaths) -> Result<Option<Self>, StateLockError> {
        match Self::acquire(paths) {
            Ok(lock) => Ok(Some(lock)),
            Err(StateLockError::Contended { .. }) => Ok(None),
            Err(err) => Err(err),
        }
    }

    /// Record this process as the holder, for contention diagnostics.
    fn stamp_owner(&mut self) -> Result<(), StateLockError> {
        let Some(file) = &self.file else {
            return Ok(());
        };
        let record = format!("{}, since {}\n", owner_identity(), Utc::now().to_rfc3339());
        file.set_len(0)?;
        let mut writer = file;
        writer.write_all(record.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Whether this guard still holds the lock.
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Release the lock before the guard is dropped.
    ///
    /// Unlike the drop path, this surfaces unlock failures as
    /// [`StateLockError::ReleaseFailed`]. Safe to call more than once.
    pub fn release(&mut self) -> Result<(), StateLockError> {
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        // Clear the owner record while the lock is still held, so a
        // reader never sees a stale identity on an unlocked file.
        let _ = file.set_len(0);
        fs2::FileExt::unlock(&file).map_err(|e| StateLockError::ReleaseFailed(e.to_string()))
    }
}

impl Drop for StateLock {
    fn drop(&mut self) {
        // Best effort: a failed unlock here resolves itself when the
        // process exits and the OS drops its advisory locks.
        let _ = self.release();
    }
}

/// Identity recorded in the lock file: `user@host, pid N`.
fn owner_identity() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    let host = std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "unknown".to_string());
    format!("{user}@{host}, pid {}", std::process::id())
}

/// Read the holder recorded in a contended lock file.
fn read_owner(path: &std::path::Path) -> String {
    match fs::read_to_string(path) {
        Ok(record) if !record.trim().is_empty() => record.trim().to_string(),
        _ => "another preflight process".to_string(),
    }
}
