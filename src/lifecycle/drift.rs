//! lifecycle::drift
//!
//! Drift detection: recorded file baselines vs the live system.
//!
//! # Architecture
//!
//! After a step successfully applies a file, the engine records a
//! [`FileState`] baseline: the file's content hash, the time, and the
//! configuration layer that owned the change. A later drift check hashes
//! the file again and classifies the divergence:
//!
//! - `None` - hashes match
//! - `Manual` - content changed out-of-band
//! - `Missing` - the file was deleted
//! - `Permission` - the file cannot be read
//!
//! Symlinks are hashed by their target path, not the target's contents,
//! so retargeting a link registers as drift.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::paths::StatePaths;

use super::snapshot::hex_digest;
use super::store::{canonical_key, IndexStore, StoreError};

/// Errors from drift operations.
#[derive(Debug, Error)]
pub enum DriftError {
    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// I/O error while hashing a file.
    #[error("drift i/o error for {path}: {source}")]
    Io {
        /// The file that failed.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },

    /// The path has no recorded baseline.
    #[error("path is not tracked: {0}")]
    NotTracked(PathBuf),
}

/// Recorded baseline for one applied file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileState {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the file contents at apply time.
    pub content_hash: String,
    /// When the baseline was recorded.
    pub recorded_at: DateTime<Utc>,
    /// The configuration layer that produced the applied change.
    pub source_layer: String,
}

/// Classification of one file's divergence from its baseline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriftKind {
    /// No divergence.
    None,
    /// Content was changed out-of-band.
    Manual,
    /// The file was deleted.
    Missing,
    /// The file cannot be read.
    Permission,
}

/// Result of checking one tracked path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Drift {
    /// Canonical absolute path.
    pub path: PathBuf,
    /// Hash recorded at last successful apply.
    pub expected_hash: String,
    /// Current hash, when the file is readable.
    pub current_hash: Option<String>,
    /// Divergence classification.
    pub kind: DriftKind,
    /// The configuration layer that owns the file.
    pub source_layer: String,
}

impl Drift {
    /// Whether this drift represents an actual divergence.
    pub fn is_drifted(&self) -> bool {
        self.kind != DriftKind::None
    }
}

/// Drift baseline store under the state root.
#[derive(Debug, Clone)]
pub struct DriftStore {
    index: IndexStore<FileState>,
}

impl DriftStore {
    /// Create a store over the given state paths.
    pub fn new(paths: &StatePaths) -> Self {
        Self {
            index: IndexStore::new(paths.drift_index()),
        }
    }

    /// Record (or refresh) the baseline for a just-applied path.
    pub fn record_applied(
        &self,
        path: &Path,
        source_layer: &str,
    ) -> Result<FileState, DriftError> {
        let key = canonical_key(path).map_err(|source| DriftError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let hash = hash_path(path)
            .map_err(|source| DriftError::Io {
                path: path.to_path_buf(),
                source,
            })?
            .ok_or_else(|| DriftError::Io {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "applied file does not exist",
                ),
            })?;

        let state = FileState {
            path: PathBuf::from(&key),
            content_hash: hash,
            recorded_at: Utc::now(),
            source_layer: source_layer.to_string(),
        };
        self.index.upsert(&key, state.clone())?;
        Ok(state)
    }

    /// Stop tracking a path. Returns whether it was tracked.
    pub fn untrack(&self, path: &Path) -> Result<bool, DriftError> {
        let key = canonical_key(path).map_err(|source| DriftError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.index.remove(&key)?)
    }

    /// All recorded baselines, sorted by path.
    pub fn tracked(&self) -> Result<Vec<FileState>, DriftError> {
        Ok(self.index.load()?.into_values().collect())
    }

    /// Check one tracked path against its baseline.
    ///
    /// # Errors
    ///
    /// [`DriftError::NotTracked`] when the path has no baseline.
    pub fn check(&self, path: &Path) -> Result<Drift, DriftError> {
        let key = canonical_key(path).map_err(|source| DriftError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let state = self
            .index
            .get(&key)?
            .ok_or_else(|| DriftError::NotTracked(path.to_path_buf()))?;
        Ok(check_state(&state))
    }

    /// Check every tracked path.
    pub fn check_all(&self) -> Result<Vec<Drift>, DriftError> {
        Ok(self
            .index
            .load()?
            .values()
            .map(check_state)
            .collect())
    }

    /// Check the tracked subset of the given paths. Untracked paths are
    /// ignored.
    pub fn check_paths(&self, paths: &[PathBuf]) -> Result<Vec<Drift>, DriftError> {
        let entries = self.index.load()?;
        let mut drifts = Vec::new();
        for path in paths {
            let key = canonical_key(path).map_err(|source| DriftError::Io {
                path: path.clone(),
                source,
            })?;
            if let Some(state) = entries.get(&key) {
                drifts.push(check_state(state));
            }
        }
        Ok(drifts)
    }
}

fn check_state(state: &FileState) -> Drift {
    let (current_hash, kind) = match hash_path(&state.path) {
        Ok(Some(hash)) => {
            let kind = if hash == state.content_hash {
                DriftKind::None
            } else {
                DriftKind::Manual
            };
            (Some(hash), kind)
        }
        Ok(None) => (None, DriftKind::Missing),
        Err(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
            (None, DriftKind::Permission)
        }
        Err(_) => (None, DriftKind::Missing),
    };
    Drift {
        path: state.path.clone(),
        expected_hash: state.content_hash.clone(),
        current_hash,
        kind,
        source_layer: state.source_layer.clone(),
    }
}

/// SHA-256 of a path's content: file bytes for regular files, the target
/// path for symlinks. `Ok(None)` when the path does not exist.
pub fn hash_path(path: &Path) -> std::io::Result<Option<String>> {
    let metadata = match fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err),
    };

    if metadata.file_type().is_symlink() {
        let target = fs::read_link(path)?;
        return Ok(Some(hex_digest(target.display().to_string().as_bytes())));
    }

    let bytes = fs::read(path)?;
    Ok(Some(hex_digest(&bytes)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _state: TempDir,
        files: TempDir,
        store: DriftStore,
    }

    fn fixture() -> Fixture {
        let state = TempDir::new().unwrap();
        let files = TempDir::new().unwrap();
        let store = DriftStore::new(&StatePaths::new(state.path()));
        Fixture {
            _state: state,
            files,
            store,
        }
    }

    #[test]
    fn record_and_check_clean() {
        let fx = fixture();
        let file = fx.files.path().join("zshrc");
        fs::write(&file, b"export EDITOR=nvim\n").unwrap();

        let state = fx.store.record_applied(&file, "base").unwrap();
        assert_eq!(state.source_layer, "base");

        let drift = fx.store.check(&file).unwrap();
        assert_eq!(drift.kind, DriftKind::None);
        assert!(!drift.is_drifted());
        assert_eq!(drift.current_hash.as_deref(), Some(state.content_hash.as_str()));
    }

    #[test]
    fn manual_edit_detected() {
        let fx = fixture();
        let file = fx.files.path().join("gitconfig");
        fs::write(&file, b"[user]\nname = alice\n").unwrap();
        fx.store.record_applied(&file, "base").unwrap();

        fs::write(&file, b"[user]\nname = mallory\n").unwrap();
        let drift = fx.store.check(&file).unwrap();
        assert_eq!(drift.kind, DriftKind::Manual);
        assert!(drift.is_drifted());
    }

    #[test]
    fn deleted_file_is_missing() {
        let fx = fixture();
        let file = fx.files.path().join("vimrc");
        fs::write(&file, b"set number\n").unwrap();
        fx.store.record_applied(&file, "base").unwrap();

        fs::remove_file(&file).unwrap();
        let drift = fx.store.check(&file).unwrap();
        assert_eq!(drift.kind, DriftKind::Missing);
        assert!(drift.current_hash.is_none());
    }

    #[test]
    fn untracked_path_errors() {
        let fx = fixture();
        let err = fx
            .store
            .check(&fx.files.path().join("never-applied"))
            .unwrap_err();
        assert!(matches!(err, DriftError::NotTracked(_)));
    }

    #[test]
    fn untrack_removes_baseline() {
        let fx = fixture();
        let file = fx.files.path().join("f");
        fs::write(&file, b"x").unwrap();
        fx.store.record_applied(&file, "base").unwrap();

        assert!(fx.store.untrack(&file).unwrap());
        assert!(!fx.store.untrack(&file).unwrap());
        assert!(fx.store.tracked().unwrap().is_empty());
    }

    #[test]
    fn check_all_covers_every_baseline() {
        let fx = fixture();
        let clean = fx.files.path().join("clean");
        let edited = fx.files.path().join("edited");
        fs::write(&clean, b"one").unwrap();
        fs::write(&edited, b"two").unwrap();
        fx.store.record_applied(&clean, "base").unwrap();
        fx.store.record_applied(&edited, "work").unwrap();

        fs::write(&edited, b"changed").unwrap();
        let drifts = fx.store.check_all().unwrap();
        assert_eq!(drifts.len(), 2);
        let drifted: Vec<_> = drifts.iter().filter(|d| d.is_drifted()).collect();
        assert_eq!(drifted.len(), 1);
        assert_eq!(drifted[0].source_layer, "work");
    }

    #[test]
    fn check_paths_intersects() {
        let fx = fixture();
        let tracked = fx.files.path().join("tracked");
        fs::write(&tracked, b"x").unwrap();
        fx.store.record_applied(&tracked, "base").unwrap();

        let untracked = fx.files.path().join("untracked");
        let drifts = fx
            .store
            .check_paths(&[tracked.clone(), untracked])
            .unwrap();
        assert_eq!(drifts.len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn symlink_hashed_by_target_path() {
        let fx = fixture();
        let target_a = fx.files.path().join("a");
        let target_b = fx.files.path().join("b");
        fs::write(&target_a, b"same").unwrap();
        fs::write(&target_b, b"same").unwrap();

        let link = fx.files.path().join("link");
        std::os::unix::fs::symlink(&target_a, &link).unwrap();
        fx.store.record_applied(&link, "base").unwrap();

        // Retargeting the link drifts even though contents are identical.
        fs::remove_file(&link).unwrap();
        std::os::unix::fs::symlink(&target_b, &link).unwrap();
        let drift = fx.store.check(&link).unwrap();
        assert_eq!(drift.kind, DriftKind::Manual);
    }

    #[test]
    fn record_refreshes_baseline() {
        let fx = fixture();
        let file = fx.files.path().join("f");
        fs::write(&file, b"one").unwrap();
        fx.store.record_applied(&file, "base").unwrap();

        fs::write(&file, b"two").unwrap();
        fx.store.record_applied(&file, "base").unwrap();
        let drift = fx.store.check(&file).unwrap();
        assert_eq!(drift.kind, DriftKind::None);
    }
}
