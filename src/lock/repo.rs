//! lock::repo
//!
//! Lockfile persistence.
//!
//! # Design
//!
//! The lockfile lives beside the configuration file (`preflight.yaml`
//! pins to `preflight.lock`) in a deterministic TOML form: fixed field
//! order, packages sorted by (provider, name). Saves go through a temp
//! file and rename so a crashed run never leaves a half-written lock.
//!
//! A missing file is a distinct [`LockRepoError::NotFound`] sentinel:
//! in Intent mode it means "start empty", in Locked/Frozen mode it is a
//! fatal pipeline error.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::lifecycle::store::write_atomic;

use super::lockfile::Lockfile;

/// Errors from lockfile persistence.
#[derive(Debug, Error)]
pub enum LockRepoError {
    /// The lockfile does not exist.
    #[error("lockfile not found: {0}")]
    NotFound(PathBuf),

    /// I/O error reading or writing the lockfile.
    #[error("lockfile i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The file exists but is not a valid lockfile.
    #[error("lockfile parse error for {path}: {message}")]
    Invalid {
        /// The offending file.
        path: PathBuf,
        /// Parse failure description.
        message: String,
    },

    /// Serialization failure while saving.
    #[error("lockfile encode error: {0}")]
    Encode(#[from] toml::ser::Error),
}

/// Lockfile storage abstraction.
pub trait LockRepo {
    /// Load a lockfile. Missing files yield [`LockRepoError::NotFound`].
    fn load(&self, path: &Path) -> Result<Lockfile, LockRepoError>;

    /// Persist a lockfile atomically.
    fn save(&self, path: &Path, lockfile: &Lockfile) -> Result<(), LockRepoError>;
}

/// File-backed lockfile storage.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileLockRepo;

impl FileLockRepo {
    /// Create a repo.
    pub fn new() -> Self {
        Self
    }
}

impl LockRepo for FileLockRepo {
    fn load(&self, path: &Path) -> Result<Lockfile, LockRepoError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(LockRepoError::NotFound(path.to_path_buf()));
            }
            Err(err) => return Err(err.into()),
        };
        toml::from_str(&text).map_err(|err| LockRepoError::Invalid {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }

    fn save(&self, path: &Path, lockfile: &Lockfile) -> Result<(), LockRepoError> {
        let text = toml::to_string_pretty(lockfile)?;
        write_atomic(path, text.as_bytes())?;
        Ok(())
    }
}
