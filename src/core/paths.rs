//! core::paths
//!
//! Centralized path routing for Preflight storage locations.
//!
//! # Architecture
//!
//! All state-root storage locations are routed through [`StatePaths`].
//! No code outside this module should compute `state_root.join(...)`
//! paths directly; the layout below is the single source of truth.
//!
//! # Storage Layout
//!
//! All state is stored under `<state_root>` (default `~/.preflight`):
//! - `lock` - Exclusive cross-process lock file
//! - `drift/index` - Tracked file states for drift detection
//! - `snapshots/<id>/manifest` - Snapshot manifests
//! - `snapshots/<id>/blobs/<hash>` - Content-addressed snapshot bodies
//!
//! The lockfile lives beside the configuration file, not under the state
//! root: `preflight.yaml` pins to `preflight.lock`.
//!
//! # Example
//!
//! ```
//! use preflight::core::paths::StatePaths;
//! use std::path::{Path, PathBuf};
//!
//! let paths = StatePaths::new("/home/dev/.preflight");
//! assert_eq!(paths.lock_path(), PathBuf::from("/home/dev/.preflight/lock"));
//! assert_eq!(
//!     paths.drift_index(),
//!     PathBuf::from("/home/dev/.preflight/drift/index")
//! );
//! assert_eq!(
//!     StatePaths::lockfile_path_for(Path::new("/cfg/preflight.yaml")),
//!     PathBuf::from("/cfg/preflight.lock")
//! );
//! ```

use std::path::{Path, PathBuf};

/// Centralized path routing for Preflight state storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    state_root: PathBuf,
}

impl StatePaths {
    /// Create paths rooted at an explicit state directory.
    pub fn new(state_root: impl Into<PathBuf>) -> Self {
        Self {
            state_root: state_root.into(),
        }
    }

    /// The default state root, `~/.preflight`, when a home directory is
    /// discoverable.
    pub fn default_root() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".preflight"))
    }

    /// Paths rooted at the default state root.
    pub fn for_default_root() -> Option<Self> {
        Self::default_root().map(Self::new)
    }

    /// The state root directory.
    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    /// The cross-process lock file.
    pub fn lock_path(&self) -> PathBuf {
        self.state_root.join("lock")
    }

    /// The drift storage directory.
    pub fn drift_dir(&self) -> PathBuf {
        self.state_root.join("drift")
    }

    /// The drift index file (path -> recorded file state).
    pub fn drift_index(&self) -> PathBuf {
        self.drift_dir().join("index")
    }

    /// The snapshots directory.
    pub fn snapshots_dir(&self) -> PathBuf {
        self.state_root.join("snapshots")
    }

    /// The directory of one snapshot.
    pub fn snapshot_dir(&self, id: &str) -> PathBuf {
        self.snapshots_dir().join(id)
    }

    /// A snapshot's manifest file.
    pub fn snapshot_manifest(&self, id: &str) -> PathBuf {
        self.snapshot_dir(id).join("manifest")
    }

    /// The blob directory of one snapshot.
    pub fn snapshot_blobs_dir(&self, id: &str) -> PathBuf {
        self.snapshot_dir(id).join("blobs")
    }

    /// A content-addressed blob within a snapshot.
    pub fn snapshot_blob(&self, id: &str, hash: &str) -> PathBuf {
        self.snapshot_blobs_dir(id).join(hash)
    }

    /// The lockfile path for a configuration file: same directory, same
    /// stem, `.lock` suffix.
    pub fn lockfile_path_for(config_path: &Path) -> PathBuf {
        config_path.with_extension("lock")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_under_root() {
        let paths = StatePaths::new("/state");
        assert_eq!(paths.state_root(), Path::new("/state"));
        assert_eq!(paths.lock_path(), PathBuf::from("/state/lock"));
        assert_eq!(paths.drift_index(), PathBuf::from("/state/drift/index"));
        assert_eq!(
            paths.snapshot_manifest("abc"),
            PathBuf::from("/state/snapshots/abc/manifest")
        );
        assert_eq!(
            paths.snapshot_blob("abc", "deadbeef"),
            PathBuf::from("/state/snapshots/abc/blobs/deadbeef")
        );
    }

    #[test]
    fn lockfile_beside_config() {
        assert_eq!(
            StatePaths::lockfile_path_for(Path::new("/cfg/preflight.yaml")),
            PathBuf::from("/cfg/preflight.lock")
        );
        assert_eq!(
            StatePaths::lockfile_path_for(Path::new("machine.yml")),
            PathBuf::from("machine.lock")
        );
    }

    #[test]
    fn default_root_is_dot_preflight() {
        if let Some(root) = StatePaths::default_root() {
            assert!(root.ends_with(".preflight"));
        }
    }
}
