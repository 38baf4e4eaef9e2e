//! lock::lockfile
//!
//! The lockfile value: resolved package versions with integrity hashes.
//!
//! # Architecture
//!
//! A lockfile pins `(provider, name)` pairs to concrete versions so a
//! configuration replays identically on another machine (or the same
//! machine later). Each entry carries an integrity hash over the
//! canonical identity string `provider:name@version`:
//!
//! ```text
//! integrity = "sha256:" + hex(sha256("brew:ripgrep@14.1.0"))
//! ```
//!
//! The schema's `algorithm:hexdigest` shape is forward-compatible with
//! hashing artifact bytes instead of the identity string.
//!
//! # Invariants
//!
//! - Provider and name are non-empty
//! - Version is non-empty (`"latest"` when unknown)
//! - `packages()` iterates sorted by (provider, name)
//! - Re-locking an unchanged entry preserves its `locked_at`, so two
//!   lock-updates on identical inputs produce byte-identical files

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Lockfile schema version.
pub const LOCKFILE_VERSION: u32 = 1;

/// Errors from lockfile mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LockfileError {
    /// A package entry had an empty provider or name.
    #[error("invalid package entry: {0}")]
    InvalidPackage(String),
}

/// Reproducibility mode.
///
/// The three modes differ only at a handful of decision points in the
/// resolver; they are a flag, not a type hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LockMode {
    /// No pinning: the resolver echoes the configured version. Lockfile
    /// writes are opportunistic.
    #[default]
    Intent,
    /// Pinned when a lock entry exists, falls back to the configured
    /// version otherwise.
    Locked,
    /// Pinned always; a missing entry is a failed resolution.
    Frozen,
}

impl LockMode {
    /// Whether this mode requires a lockfile to exist.
    pub fn requires_lockfile(&self) -> bool {
        matches!(self, LockMode::Locked | LockMode::Frozen)
    }

    /// Whether lock-update may write entries in this mode.
    pub fn allows_writes(&self) -> bool {
        !matches!(self, LockMode::Frozen)
    }
}

impl std::fmt::Display for LockMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            LockMode::Intent => "intent",
            LockMode::Locked => "locked",
            LockMode::Frozen => "frozen",
        };
        write!(f, "{label}")
    }
}

impl std::str::FromStr for LockMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "intent" => Ok(LockMode::Intent),
            "locked" => Ok(LockMode::Locked),
            "frozen" => Ok(LockMode::Frozen),
            other => Err(format!("unknown mode '{other}' (intent|locked|frozen)")),
        }
    }
}

/// Machine identity recorded at lockfile creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineInfo {
    /// Operating system identifier.
    pub os: String,
    /// CPU architecture.
    pub arch: String,
    /// Host name fingerprint.
    pub host: String,
}

impl MachineInfo {
    /// Identity of the current machine.
    pub fn current() -> Self {
        let host = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("COMPUTERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            host,
        }
    }
}

/// One pinned package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageLock {
    /// Provider name.
    pub provider: String,
    /// Package name within the provider's namespace.
    pub name: String,
    /// Pinned version.
    pub version: String,
    /// Integrity hash (`algorithm:hexdigest`).
    pub integrity: String,
    /// When the entry was (last) written with this version.
    pub locked_at: DateTime<Utc>,
}

/// The lockfile value.
///
/// Loaded, optionally mutated by lock-update, and saved atomically by
/// [`crate::lock::repo::FileLockRepo`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "LockfileDoc", into = "LockfileDoc")]
pub struct Lockfile {
    mode: LockMode,
    machine: MachineInfo,
    packages: BTreeMap<(String, String), PackageLock>,
}

impl Lockfile {
    /// Create an empty lockfile for the current machine.
    pub fn new(mode: LockMode) -> Self {
        Self {
            mode,
            machine: MachineInfo::current(),
            packages: BTreeMap::new(),
        }
    }

    /// Create an empty lockfile with explicit machine info.
    pub fn with_machine(mode: LockMode, machine: MachineInfo) -> Self {
        Self {
            mode,
            machine,
            packages: BTreeMap::new(),
        }
    }

    /// The reproducibility mode recorded in the file.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Machine identity at creation.
    pub fn machine(&self) -> &MachineInfo {
        &self.machine
    }

    /// Return a copy with a different mode.
    pub fn with_mode(mut self, mode: LockMode) -> Self {
        self.mode = mode;
        self
    }

    /// Look up a package entry.
    pub fn get(&self, provider: &str, name: &str) -> Option<&PackageLock> {
        self.packages
            .get(&(provider.to_string(), name.to_string()))
    }

    /// Pin a package version, computing its integrity hash.
    ///
    /// An empty version falls back to the literal `"latest"`. When the
    /// entry already holds the same version, its `locked_at` timestamp is
    /// preserved so repeated updates stay byte-identical.
    pub fn set_package(
        &mut self,
        provider: &str,
        name: &str,
        version: &str,
    ) -> Result<&PackageLock, LockfileError> {
        if provider.is_empty() {
            return Err(LockfileError::InvalidPackage("empty provider".to_string()));
        }
        if name.is_empty() {
            return Err(LockfileError::InvalidPackage("empty name".to_string()));
        }
        let version = if version.is_empty() { "latest" } else { version };
        let integrity = integrity_for(provider, name, version);
        let key = (provider.to_string(), name.to_string());

        let locked_at = match self.packages.get(&key) {
            Some(existing) if existing.version == version && existing.integrity == integrity => {
                existing.locked_at
            }
            _ => Utc::now(),
        };

        let entry = PackageLock {
            provider: provider.to_string(),
            name: name.to_string(),
            version: version.to_string(),
            integrity,
            locked_at,
        };
        self.packages.insert(key.clone(), entry);
        Ok(self.packages.get(&key).expect("entry just inserted"))
    }

    /// Remove a package entry. Returns whether it was present.
    pub fn remove_package(&mut self, provider: &str, name: &str) -> bool {
        self.packages
            .remove(&(provider.to_string(), name.to_string()))
            .is_some()
    }

    /// Iterate entries sorted by (provider, name).
    pub fn packages(&self) -> impl Iterator<Item = &PackageLock> {
        self.packages.values()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    /// Whether the lockfile has no entries.
    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

/// Compute the integrity field for a package identity.
pub fn integrity_for(provider: &str, name: &str, version: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{provider}:{name}@{version}").as_bytes());
    format!("sha256:{}", hex::encode(hasher.finalize()))
}

/// On-disk document shape: schema version, mode, machine, and packages
/// as a sorted array of tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockfileDoc {
    version: u32,
    mode: LockMode,
    machine: MachineInfo,
    #[serde(default, rename = "package", skip_serializing_if = "Vec::is_empty")]
    packages: Vec<PackageLock>,
}

impl TryFrom<LockfileDoc> for Lockfile {
    type Error = String;

    fn try_from(doc: LockfileDoc) -> Result<Self, Self::Error> {
        let mut packages = BTreeMap::new();
        for mut entry in doc.packages {
            if entry.provider.is_empty() || entry.name.is_empty() {
                return Err(format!(
                    "invalid package entry '{}:{}'",
                    entry.provider, entry.name
                ));
            }
            if entry.version.is_empty() {
                entry.version = "latest".to_string();
            }
            let key = (entry.provider.clone(), entry.name.clone());
            if packages.insert(key, entry).is_some() {
                return Err("duplicate package entry".to_string());
            }
        }
        Ok(Self {
            mode: doc.mode,
            machine: doc.machine,
            packages,
        })
    }
}

impl From<Lockfile> for LockfileDoc {
    fn from(lockfile: Lockfile) -> Self {
        Self {
            version: LOCKFILE_VERSION,
            mode: lockfile.mode,
            machine: lockfile.machine,
            packages: lockfile.packages.into_values().collect(),
        }
    }
}
