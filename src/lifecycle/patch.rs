//! lifecycle::patch
//!
//! Advisory configuration patches derived from drift.
//!
//! # Design
//!
//! When a tracked file drifts, the divergence can be folded back into the
//! configuration instead of being overwritten on the next apply. This
//! module maps drifts to advisory [`Patch`] values pointing at the owning
//! layer file and the provider's natural YAML path.
//!
//! Patches are never applied here; emitting them is the writer's job.
//!
//! - `Manual` drift -> `Modify` (the layer's entry should absorb the edit)
//! - `Missing` drift -> `Remove` (the entry should be dropped)
//! - Clean paths produce no patch

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::drift::{Drift, DriftKind};

/// The kind of configuration edit a patch proposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchOp {
    /// Add a new entry.
    Add,
    /// Modify an existing entry.
    Modify,
    /// Remove an existing entry.
    Remove,
}

/// One proposed configuration edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Patch {
    /// The layer file the edit targets.
    pub layer_path: PathBuf,
    /// Dotted YAML path of the affected entry (e.g. `files.link.zshrc`).
    pub yaml_path: String,
    /// Proposed operation.
    pub op: PatchOp,
    /// Previous value description, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old: Option<String>,
    /// New value description, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new: Option<String>,
    /// Where the patch came from (tracked path and drift kind).
    pub provenance: String,
}

/// Derives advisory patches from drift reports.
#[derive(Debug, Clone)]
pub struct PatchGenerator {
    config_root: PathBuf,
}

impl PatchGenerator {
    /// Create a generator for the given config root.
    pub fn new(config_root: impl Into<PathBuf>) -> Self {
        Self {
            config_root: config_root.into(),
        }
    }

    /// Produce patches for every drifted entry. Clean entries and drifts
    /// whose layer cannot own a file (empty source layer) are skipped.
    pub fn generate(&self, drifts: &[Drift]) -> Vec<Patch> {
        let mut patches = Vec::new();
        for drift in drifts {
            if drift.source_layer.is_empty() {
                continue;
            }
            let op = match drift.kind {
                DriftKind::None | DriftKind::Permission => continue,
                DriftKind::Manual => PatchOp::Modify,
                DriftKind::Missing => PatchOp::Remove,
            };
            patches.push(Patch {
                layer_path: self.layer_file(&drift.source_layer),
                yaml_path: yaml_path_for(&drift.path),
                op,
                old: Some(short_hash(&drift.expected_hash)),
                new: drift.current_hash.as_deref().map(short_hash),
                provenance: format!("drift:{}:{}", kind_label(drift.kind), drift.path.display()),
            });
        }
        patches
    }

    /// Candidate file for a layer: `layers/<layer>.yaml` preferred,
    /// `<layer>.yaml` in the config root as fallback. The preferred path
    /// is returned even when neither exists yet.
    fn layer_file(&self, layer: &str) -> PathBuf {
        let preferred = self.config_root.join("layers").join(format!("{layer}.yaml"));
        if preferred.exists() {
            return preferred;
        }
        let fallback = self.config_root.join(format!("{layer}.yaml"));
        if fallback.exists() {
            return fallback;
        }
        preferred
    }
}

/// The provider-natural YAML path for a tracked file: the `files`
/// provider owns every tracked path today, keyed by file name.
fn yaml_path_for(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    format!("files.link.{name}")
}

fn short_hash(hash: &str) -> String {
    format!("sha256:{}", &hash[..hash.len().min(12)])
}

fn kind_label(kind: DriftKind) -> &'static str {
    match kind {
        DriftKind::None => "none",
        DriftKind::Manual => "manual",
        DriftKind::Missing => "missing",
        DriftKind::Permission => "permission",
    }
}
