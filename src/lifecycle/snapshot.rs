//! lifecycle::snapshot
//!
//! Pre-modification snapshots for rollback.
//!
//! # Architecture
//!
//! Before the executor lets a step overwrite files, it captures their
//! current bytes into a content-addressed snapshot:
//!
//! - `snapshots/<id>/manifest` - JSON manifest mapping each path to its
//!   content hash, or to a tombstone when the path did not exist
//! - `snapshots/<id>/blobs/<sha256>` - the captured bytes
//!
//! Restoring a snapshot overwrites each path with its captured bytes and
//! deletes paths recorded as tombstones, reproducing the pre-apply state
//! exactly.
//!
//! # Invariants
//!
//! - Snapshot ids are unique per capture
//! - A manifest is only written after all of its blobs
//! - Restore of a tombstone deletes the current file

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use uuid::Uuid;

use crate::core::paths::StatePaths;

use super::store::{canonical_key, write_atomic};

/// Errors from snapshot operations.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// I/O error while capturing or restoring.
    #[error("snapshot i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest serialization error.
    #[error("snapshot json error: {0}")]
    Json(#[from] serde_json::Error),

    /// No snapshot with the given id.
    #[error("snapshot not found: {0}")]
    NotFound(String),

    /// A manifest references a blob that is missing on disk.
    #[error("snapshot {id} is missing blob {hash}")]
    MissingBlob {
        /// The snapshot id.
        id: String,
        /// The missing blob hash.
        hash: String,
    },
}

/// Identifier of one captured snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotId(String);

impl SnapshotId {
    fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create an id from an existing string (e.g. operator input).
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// The string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One path's record within a snapshot manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEntry {
    /// Content hash of the captured bytes, or `None` for a tombstone
    /// (the path did not exist when the snapshot was taken).
    pub hash: Option<String>,
}

impl SnapshotEntry {
    /// Whether this entry records an absent path.
    pub fn is_tombstone(&self) -> bool {
        self.hash.is_none()
    }
}

/// A snapshot's manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotManifest {
    /// Snapshot id.
    pub id: String,
    /// Capture time.
    pub taken_at: DateTime<Utc>,
    /// Optional parent snapshot (chained captures of the same run).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Captured paths keyed by canonical absolute path.
    pub entries: BTreeMap<String, SnapshotEntry>,
}

/// Content-addressed snapshot storage under the state root.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    paths: StatePaths,
}

impl SnapshotStore {
    /// Create a store over the given state paths.
    pub fn new(paths: StatePaths) -> Self {
        Self { paths }
    }

    /// Capture the current contents of the given paths.
    ///
    /// Missing paths are recorded as tombstones so a later restore can
    /// delete files the apply created. Returns the new snapshot's id.
    pub fn take(&self, paths: &[PathBuf]) -> Result<SnapshotId, SnapshotError> {
        self.take_with_parent(paths, None)
    }

    /// Capture with an explicit parent snapshot reference.
    pub fn take_with_parent(
        &self,
        paths: &[PathBuf],
        parent: Option<&SnapshotId>,
    ) -> Result<SnapshotId, SnapshotError> {
        let id = SnapshotId::generate();
        let mut entries = BTreeMap::new();

        for path in paths {
            let key = canonical_key(path)?;
            let entry = match fs::symlink_metadata(path) {
                Ok(_) => {
                    let bytes = fs::read(path)?;
                    let hash = hex_digest(&bytes);
                    let blob = self.paths.snapshot_blob(id.as_str(), &hash);
                    if !blob.exists() {
                        write_atomic(&blob, &bytes)?;
                    }
                    SnapshotEntry { hash: Some(hash) }
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    SnapshotEntry { hash: None }
                }
                Err(err) => return Err(err.into()),
            };
            entries.insert(key, entry);
        }

        let manifest = SnapshotManifest {
            id: id.as_str().to_string(),
            taken_at: Utc::now(),
            parent: parent.map(|p| p.as_str().to_string()),
            entries,
        };
        let bytes = serde_json::to_vec_pretty(&manifest)?;
        write_atomic(&self.paths.snapshot_manifest(id.as_str()), &bytes)?;

        Ok(id)
    }

    /// Load a snapshot's manifest.
    pub fn manifest(&self, id: &SnapshotId) -> Result<SnapshotManifest, SnapshotError> {
        let path = self.paths.snapshot_manifest(id.as_str());
        match fs::read(&path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SnapshotError::NotFound(id.as_str().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Restore every path in the snapshot to its captured state.
    ///
    /// Tombstoned paths are deleted; captured paths are overwritten with
    /// the snapshot content. The snapshot itself is retained (prune is a
    /// separate operation).
    pub fn restore(&self, id: &SnapshotId) -> Result<(), SnapshotError> {
        let manifest = self.manifest(id)?;

        for (key, entry) in &manifest.entries {
            let target = Path::new(key);
            match &entry.hash {
                None => match fs::remove_file(target) {
                    Ok(()) => {}
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                    Err(err) => return Err(err.into()),
                },
                Some(hash) => {
                    let blob = self.paths.snapshot_blob(id.as_str(), hash);
                    let bytes = fs::read(&blob).map_err(|err| {
                        if err.kind() == std::io::ErrorKind::NotFound {
                            SnapshotError::MissingBlob {
                                id: id.as_str().to_string(),
                                hash: hash.clone(),
                            }
                        } else {
                            err.into()
                        }
                    })?;
                    if let Some(parent) = target.parent() {
                        fs::create_dir_all(parent)?;
                    }
                    fs::write(target, bytes)?;
                }
            }
        }

        Ok(())
    }

    /// List all snapshot manifests, oldest first.
    pub fn list(&self) -> Result<Vec<SnapshotManifest>, SnapshotError> {
        let dir = self.paths.snapshots_dir();
        let mut manifests = Vec::new();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(manifests),
            Err(err) => return Err(err.into()),
        };
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = SnapshotId::from_string(entry.file_name().to_string_lossy().to_string());
            match self.manifest(&id) {
                Ok(manifest) => manifests.push(manifest),
                // A directory without a manifest is an interrupted capture.
                Err(SnapshotError::NotFound(_)) => continue,
                Err(err) => return Err(err),
            }
        }
        manifests.sort_by(|a, b| a.taken_at.cmp(&b.taken_at).then(a.id.cmp(&b.id)));
        Ok(manifests)
    }

    /// Delete one snapshot and its blobs.
    pub fn prune(&self, id: &SnapshotId) -> Result<(), SnapshotError> {
        let dir = self.paths.snapshot_dir(id.as_str());
        match fs::remove_dir_all(&dir) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                Err(SnapshotError::NotFound(id.as_str().to_string()))
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// Lowercase hex SHA-256 of a byte slice.
pub(crate) fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    struct Fixture {
        _state: TempDir,
        files: TempDir,
        store: SnapshotStore,
    }

    fn fixture() -> Fixture {
        let state = TempDir::new().unwrap();
        let files = TempDir::new().unwrap();
        let store = SnapshotStore::new(StatePaths::new(state.path()));
        Fixture {
            _state: state,
            files,
            store,
        }
    }

    #[test]
    fn round_trip_restores_original_bytes() {
        let fx = fixture();
        let file = fx.files.path().join("zshrc");
        fs::write(&file, b"old contents").unwrap();

        let id = fx.store.take(&[file.clone()]).unwrap();
        fs::write(&file, b"overwritten").unwrap();

        fx.store.restore(&id).unwrap();
        assert_eq!(fs::read(&file).unwrap(), b"old contents");
    }

    #[test]
    fn tombstone_deletes_created_file() {
        let fx = fixture();
        let file = fx.files.path().join("new-file");

        let id = fx.store.take(&[file.clone()]).unwrap();
        fs::write(&file, b"created by apply").unwrap();

        fx.store.restore(&id).unwrap();
        assert!(!file.exists());
    }

    #[test]
    fn restore_mixed_existing_and_tombstone() {
        let fx = fixture();
        let existing = fx.files.path().join("a");
        let absent = fx.files.path().join("b");
        fs::write(&existing, b"old-a").unwrap();

        let id = fx.store.take(&[existing.clone(), absent.clone()]).unwrap();
        fs::write(&existing, b"new-a").unwrap();
        fs::write(&absent, b"new-b").unwrap();

        fx.store.restore(&id).unwrap();
        assert_eq!(fs::read(&existing).unwrap(), b"old-a");
        assert!(!absent.exists());
    }

    #[test]
    fn manifest_records_tombstones() {
        let fx = fixture();
        let absent = fx.files.path().join("missing");
        let id = fx.store.take(&[absent.clone()]).unwrap();

        let manifest = fx.store.manifest(&id).unwrap();
        assert_eq!(manifest.entries.len(), 1);
        let entry = manifest.entries.values().next().unwrap();
        assert!(entry.is_tombstone());
    }

    #[test]
    fn restore_unknown_id_fails() {
        let fx = fixture();
        let err = fx
            .store
            .restore(&SnapshotId::from_string("nope"))
            .unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[test]
    fn list_and_prune() {
        let fx = fixture();
        let file = fx.files.path().join("f");
        fs::write(&file, b"x").unwrap();

        let id1 = fx.store.take(&[file.clone()]).unwrap();
        let id2 = fx.store.take(&[file.clone()]).unwrap();

        assert_eq!(fx.store.list().unwrap().len(), 2);

        fx.store.prune(&id1).unwrap();
        let remaining = fx.store.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, id2.as_str());
    }

    #[test]
    fn identical_content_shares_blob_hash() {
        let fx = fixture();
        let a = fx.files.path().join("a");
        let b = fx.files.path().join("b");
        fs::write(&a, b"same").unwrap();
        fs::write(&b, b"same").unwrap();

        let id = fx.store.take(&[a, b]).unwrap();
        let manifest = fx.store.manifest(&id).unwrap();
        let hashes: Vec<_> = manifest
            .entries
            .values()
            .map(|e| e.hash.clone().unwrap())
            .collect();
        assert_eq!(hashes[0], hashes[1]);
    }
}
