//! lifecycle::store
//!
//! Indexed key-value store for state-root records.
//!
//! # Design
//!
//! A store is a single JSON file holding a sorted map from canonical
//! absolute path to a record. Every mutation rewrites the file through a
//! temp-file-and-rename so readers never observe a partial state.
//!
//! The index key is the canonical absolute path of the tracked file.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error reading or writing the index file.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("store json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write bytes to a path atomically: write a sibling temp file, fsync,
/// then rename over the destination. Parent directories are created.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    {
        let mut file = File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path)
}

/// Canonical index key for a path: the absolute form of the path as a
/// string. The file does not need to exist.
pub(crate) fn canonical_key(path: &Path) -> std::io::Result<String> {
    let absolute = std::path::absolute(path)?;
    Ok(absolute.display().to_string())
}

/// A JSON-backed index of records keyed by canonical path.
///
/// The store is stateless between calls: each operation loads the index,
/// applies the change, and atomically rewrites it. This keeps the
/// on-disk file the single source of truth for the (single-process)
/// engine.
#[derive(Debug, Clone)]
pub struct IndexStore<T> {
    path: PathBuf,
    _record: PhantomData<fn() -> T>,
}

impl<T: Serialize + DeserializeOwned> IndexStore<T> {
    /// Create a store backed by the given index file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _record: PhantomData,
        }
    }

    /// The index file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load all entries. A missing index file is an empty store.
    pub fn load(&self) -> Result<BTreeMap<String, T>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(err) => Err(err.into()),
        }
    }

    /// Persist all entries atomically.
    pub fn save(&self, entries: &BTreeMap<String, T>) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(entries)?;
        write_atomic(&self.path, &bytes)?;
        Ok(())
    }

    /// Look up one entry by key.
    pub fn get(&self, key: &str) -> Result<Option<T>, StoreError> {
        Ok(self.load()?.remove(key))
    }

    /// Insert or replace one entry.
    pub fn upsert(&self, key: &str, value: T) -> Result<(), StoreError> {
        let mut entries = self.load()?;
        entries.insert(key.to_string(), value);
        self.save(&entries)
    }

    /// Remove one entry. Returns whether it was present.
    pub fn remove(&self, key: &str) -> Result<bool, StoreError> {
        let mut entries = self.load()?;
        let removed = entries.remove(key).is_some();
        if removed {
            self.save(&entries)?;
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(temp: &TempDir) -> IndexStore<String> {
        IndexStore::new(temp.path().join("drift").join("index"))
    }

    #[test]
    fn missing_index_is_empty() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn upsert_and_get() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.upsert("/home/dev/.zshrc", "abc".to_string()).unwrap();
        assert_eq!(
            store.get("/home/dev/.zshrc").unwrap(),
            Some("abc".to_string())
        );
        assert_eq!(store.get("/home/dev/.vimrc").unwrap(), None);
    }

    #[test]
    fn upsert_replaces() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.upsert("/f", "one".to_string()).unwrap();
        store.upsert("/f", "two".to_string()).unwrap();
        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries.get("/f"), Some(&"two".to_string()));
    }

    #[test]
    fn remove_entry() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.upsert("/f", "one".to_string()).unwrap();
        assert!(store.remove("/f").unwrap());
        assert!(!store.remove("/f").unwrap());
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn entries_sorted_by_key() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);

        store.upsert("/z", "z".to_string()).unwrap();
        store.upsert("/a", "a".to_string()).unwrap();
        let keys: Vec<String> = store.load().unwrap().into_keys().collect();
        assert_eq!(keys, vec!["/a".to_string(), "/z".to_string()]);
    }

    #[test]
    fn no_temp_file_left_behind() {
        let temp = TempDir::new().unwrap();
        let store = store_in(&temp);
        store.upsert("/f", "one".to_string()).unwrap();
        assert!(store.path().exists());
        assert!(!store.path().with_extension("tmp").exists());
    }

    #[test]
    fn canonical_key_absolute_passthrough() {
        let key = canonical_key(Path::new("/home/dev/.zshrc")).unwrap();
        assert_eq!(key, "/home/dev/.zshrc");
    }
}
