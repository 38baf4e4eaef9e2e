//! lifecycle
//!
//! File lifecycle services: pre-modification snapshots, drift baselines,
//! and the advisory patch generator.
//!
//! # Architecture
//!
//! The executor (and file-touching providers) interact with these
//! services through a single [`Lifecycle`] handle carried in the run
//! context rather than a global:
//!
//! - `before_apply` snapshots the files a step is about to mutate
//! - `after_apply` records a drift baseline for each applied file
//! - `restore` rolls a snapshot back
//!
//! # Storage
//!
//! Everything lives under the state root (default `~/.preflight`); see
//! [`crate::core::paths::StatePaths`] for the layout.

pub mod drift;
pub mod lock;
pub mod patch;
pub mod snapshot;
pub mod store;

pub use drift::{Drift, DriftError, DriftKind, DriftStore, FileState};
pub use lock::{StateLock, StateLockError};
pub use patch::{Patch, PatchGenerator, PatchOp};
pub use snapshot::{SnapshotError, SnapshotId, SnapshotManifest, SnapshotStore};
pub use store::StoreError;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::paths::StatePaths;

/// Errors from lifecycle operations.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Snapshot capture or restore failed.
    #[error("snapshot failed: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Drift recording failed.
    #[error("drift recording failed: {0}")]
    Drift(#[from] DriftError),
}

/// Handle to the snapshot and drift services for one state root.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    snapshots: SnapshotStore,
    drift: DriftStore,
}

impl Lifecycle {
    /// Create lifecycle services over a state root.
    pub fn new(paths: StatePaths) -> Self {
        Self {
            drift: DriftStore::new(&paths),
            snapshots: SnapshotStore::new(paths),
        }
    }

    /// Lifecycle services over the default state root (`~/.preflight`),
    /// when a home directory is discoverable.
    pub fn open_default() -> Option<Self> {
        StatePaths::for_default_root().map(Self::new)
    }

    /// Snapshot the given paths before a step mutates them.
    ///
    /// Returns `None` when the step touches no files.
    pub fn before_apply(&self, paths: &[PathBuf]) -> Result<Option<SnapshotId>, LifecycleError> {
        if paths.is_empty() {
            return Ok(None);
        }
        Ok(Some(self.snapshots.take(paths)?))
    }

    /// Snapshot a single path before modification.
    pub fn before_modify(&self, path: &Path) -> Result<SnapshotId, LifecycleError> {
        Ok(self.snapshots.take(&[path.to_path_buf()])?)
    }

    /// Record a drift baseline for a successfully applied path.
    pub fn after_apply(&self, path: &Path, source_layer: &str) -> Result<(), LifecycleError> {
        self.drift.record_applied(path, source_layer)?;
        Ok(())
    }

    /// Restore a snapshot taken by [`Lifecycle::before_apply`].
    pub fn restore(&self, id: &SnapshotId) -> Result<(), LifecycleError> {
        Ok(self.snapshots.restore(id)?)
    }

    /// The underlying snapshot store.
    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    /// The underlying drift store.
    pub fn drift(&self) -> &DriftStore {
        &self.drift
    }
}
