//! lock::resolver
//!
//! Version resolution under the three reproducibility modes.
//!
//! # Architecture
//!
//! Providers ask the resolver to turn an intent declaration
//! `(provider, name, desired)` into an effective version. The verdict is
//! a [`Resolution`] carrying provenance, drift information, and any
//! error in-band: a failed resolution never aborts compilation. Callers
//! decide whether a failed resolution turns into a failed step.
//!
//! | Mode   | Behavior |
//! |--------|----------|
//! | Intent | Echo the desired version (or `"latest"`). |
//! | Locked | A lock entry wins; otherwise fall back to desired and mark updated. |
//! | Frozen | A missing entry is a failed resolution. |

use serde::{Deserialize, Serialize};

use super::lockfile::{LockMode, Lockfile};

/// Where a resolved version came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// The configured (desired) version.
    Config,
    /// A lockfile entry.
    Lock,
    /// The literal `"latest"` placeholder.
    Latest,
    /// Fallback to the desired version because no lock entry existed.
    Fallback,
}

/// The resolver's verdict for one `(provider, name, desired)` triple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Provider name.
    pub provider: String,
    /// Package name.
    pub name: String,
    /// Effective version to install.
    pub version: String,
    /// Provenance of the effective version.
    pub source: ResolutionSource,
    /// Whether a lock entry drove the resolution.
    pub locked: bool,
    /// The locked version, when an entry exists.
    pub locked_version: Option<String>,
    /// The version the provider reports as currently available, when
    /// known.
    pub available_version: Option<String>,
    /// Locked and available versions are both known and differ.
    pub drifted: bool,
    /// The lock entry will change on the next lock-update.
    pub updated: bool,
    /// The resolution failed (e.g. frozen mode with no entry).
    pub failed: bool,
    /// Failure description, when failed.
    pub error: Option<String>,
}

impl Resolution {
    fn base(provider: &str, name: &str) -> Self {
        Self {
            provider: provider.to_string(),
            name: name.to_string(),
            version: "latest".to_string(),
            source: ResolutionSource::Latest,
            locked: false,
            locked_version: None,
            available_version: None,
            drifted: false,
            updated: false,
            failed: false,
            error: None,
        }
    }
}

/// Maps intent declarations to effective versions.
///
/// Consumed by the compiler and handed to providers through the compile
/// context.
pub trait VersionResolver {
    /// Resolve one package. Failures are reported in-band on the
    /// returned [`Resolution`].
    fn resolve(&self, provider: &str, name: &str, desired: &str) -> Resolution;
}

/// Lockfile-backed resolver implementing the three modes.
#[derive(Debug, Clone, Default)]
pub struct LockResolver {
    mode: LockMode,
    lockfile: Option<Lockfile>,
    available: std::collections::BTreeMap<(String, String), String>,
}

impl LockResolver {
    /// Create a resolver for a mode and an optional loaded lockfile.
    ///
    /// A `None` lockfile under Locked or Frozen mode yields failed
    /// resolutions; the pipeline normally refuses to start in that
    /// situation, but the resolver stays total either way.
    pub fn new(mode: LockMode, lockfile: Option<Lockfile>) -> Self {
        Self {
            mode,
            lockfile,
            available: Default::default(),
        }
    }

    /// Record the version a provider reports as currently available,
    /// enabling drift detection on resolutions.
    pub fn with_available(
        mut self,
        provider: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        self.available
            .insert((provider.into(), name.into()), version.into());
        self
    }

    /// The resolver's mode.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    fn finish(&self, mut resolution: Resolution) -> Resolution {
        let key = (resolution.provider.clone(), resolution.name.clone());
        resolution.available_version = self.available.get(&key).cloned();
        resolution.drifted = matches!(
            (&resolution.locked_version, &resolution.available_version),
            (Some(locked), Some(available)) if locked != available
        );
        resolution
    }
}

impl VersionResolver for LockResolver {
    fn resolve(&self, provider: &str, name: &str, desired: &str) -> Resolution {
        let desired = if desired.is_empty() { "latest" } else { desired };
        let mut resolution = Resolution::base(provider, name);
        let entry = self
            .lockfile
            .as_ref()
            .and_then(|lockfile| lockfile.get(provider, name));
        resolution.locked_version = entry.map(|e| e.version.clone());

        match self.mode {
            LockMode::Intent => {
                resolution.version = desired.to_string();
                resolution.source = if desired == "latest" {
                    ResolutionSource::Latest
                } else {
                    ResolutionSource::Config
                };
            }
            LockMode::Locked => match entry {
                Some(entry) => {
                    resolution.version = entry.version.clone();
                    resolution.source = ResolutionSource::Lock;
                    resolution.locked = true;
                }
                None => {
                    resolution.version = desired.to_string();
                    resolution.source = ResolutionSource::Fallback;
                    resolution.updated = true;
                    if self.lockfile.is_none() {
                        resolution.failed = true;
                        resolution.error = Some("lockfile not found".to_string());
                    }
                }
            },
            LockMode::Frozen => match entry {
                Some(entry) => {
                    resolution.version = entry.version.clone();
                    resolution.source = ResolutionSource::Lock;
                    resolution.locked = true;
                }
                None => {
                    resolution.version = desired.to_string();
                    resolution.source = ResolutionSource::Fallback;
                    resolution.failed = true;
                    resolution.error = Some("missing lock".to_string());
                }
            },
        }

        self.finish(resolution)
    }
}
