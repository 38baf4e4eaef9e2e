//! core::step
//!
//! The step contract: the atomic unit of environment change.
//!
//! # Architecture
//!
//! Every piece of desired state - a package, a linked dotfile, a git
//! setting - compiles to a [`Step`]. Steps are idempotent check/plan/apply
//! state machines:
//!
//! - `check` inspects the live system and reports a [`Status`]
//! - `plan` describes the change as a [`Diff`] (only called on NeedsApply)
//! - `apply` performs the change
//!
//! Optional capabilities are modeled as accessor methods returning trait
//! objects rather than downcasts: a step that carries a pinnable version
//! returns `Some` from [`Step::as_lockable`], and one that can introspect
//! the installed version returns `Some` from [`Step::as_versioned`].
//!
//! # Invariants
//!
//! - `check` and `plan` never mutate the system
//! - `plan` is only invoked after `check` returned [`Status::NeedsApply`]
//! - Steps are instantiated per compile and never mutated afterwards

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::context::{ExplainContext, RunContext};
use super::types::{Status, StepId};

/// Errors surfaced by a step's check, plan, or apply.
///
/// The planner and executor wrap these with the owning step id and the
/// stage that failed, so variants here stay close to the underlying cause.
#[derive(Debug, Error)]
pub enum StepError {
    /// The step's configuration fragment is unusable.
    #[error("invalid step configuration: {0}")]
    InvalidConfig(String),

    /// A required lock entry was missing (frozen mode).
    #[error("missing lock entry for {provider}:{name}")]
    LockMissingEntry {
        /// Provider segment of the missing entry.
        provider: String,
        /// Package name of the missing entry.
        name: String,
    },

    /// I/O error while inspecting or mutating the system.
    #[error("step i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// Any other provider-specific failure.
    #[error("{0}")]
    Other(String),
}

/// A provider-opaque description of the change a step would make.
///
/// Diffs carry a stable name (for file steps, the destination path), a
/// one-line summary, and optional detail lines. An empty diff means the
/// step would change nothing.
///
/// # Example
///
/// ```
/// use preflight::core::step::Diff;
///
/// let diff = Diff::new("~/.zshrc", "link zshrc -> ~/.zshrc")
///     .with_detail("create (1204 bytes)");
/// assert!(!diff.is_empty());
/// assert_eq!(diff.name(), "~/.zshrc");
///
/// assert!(Diff::empty("~/.zshrc").is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    name: String,
    summary: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    details: Vec<String>,
}

impl Diff {
    /// Create a diff with a summary line.
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            details: Vec::new(),
        }
    }

    /// Create an empty diff (no change).
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: String::new(),
            details: Vec::new(),
        }
    }

    /// Append a detail line (builder pattern).
    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    /// The diff's stable name. For file diffs this is the destination path.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// One-line human summary of the change.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Detail lines, if the provider produced any.
    pub fn details(&self) -> &[String] {
        &self.details
    }

    /// Whether this diff describes no change at all.
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.details.is_empty()
    }
}

/// Human-readable description of what a step manages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    summary: String,
    details: Vec<String>,
}

impl Explanation {
    /// Create an explanation with a one-line summary.
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            details: Vec::new(),
        }
    }

    /// Append a detail line (builder pattern).
    pub fn with_detail(mut self, line: impl Into<String>) -> Self {
        self.details.push(line.into());
        self
    }

    /// The one-line summary.
    pub fn summary(&self) -> &str {
        &self.summary
    }

    /// Detail lines.
    pub fn details(&self) -> &[String] {
        &self.details
    }
}

/// Version identity a lockable step contributes to the lockfile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockInfo {
    /// Provider name (matches the step id's provider segment).
    pub provider: String,
    /// Package name within the provider's namespace.
    pub name: String,
    /// Desired or resolved version; `"latest"` when unpinned.
    pub version: String,
}

impl LockInfo {
    /// Create lock info, normalizing an empty version to `"latest"`.
    pub fn new(
        provider: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        let version = version.into();
        Self {
            provider: provider.into(),
            name: name.into(),
            version: if version.is_empty() {
                "latest".to_string()
            } else {
                version
            },
        }
    }
}

/// Capability: the step contributes a version to the lockfile.
pub trait LockableStep {
    /// The lock identity, or `None` when the step has nothing to pin
    /// for the current configuration.
    fn lock_info(&self) -> Option<LockInfo>;
}

/// Capability: the step can introspect the version installed on the
/// live system.
pub trait VersionedStep {
    /// The installed version, `Ok(None)` when the package is absent.
    fn installed_version(&self, ctx: &RunContext) -> Result<Option<String>, StepError>;
}

/// The atomic unit of environment change.
///
/// Implementations come from providers; the core never constructs steps
/// itself. See the module docs for the check/plan/apply contract.
pub trait Step {
    /// The step's unique identifier within a graph.
    fn id(&self) -> StepId;

    /// Ids of steps that must reach a terminal status before this one
    /// runs. Referenced ids must exist in the same graph; self-references
    /// are rejected at insert time.
    fn depends_on(&self) -> Vec<StepId> {
        Vec::new()
    }

    /// Compare desired state against the live system.
    fn check(&self, ctx: &RunContext) -> Result<Status, StepError>;

    /// Describe the change this step would make. Called only after
    /// `check` returned [`Status::NeedsApply`]; must not mutate the
    /// system.
    fn plan(&self, ctx: &RunContext) -> Result<Diff, StepError>;

    /// Perform the change.
    fn apply(&self, ctx: &RunContext) -> Result<(), StepError>;

    /// Human description of what this step manages.
    fn explain(&self, ctx: &ExplainContext) -> Explanation;

    /// Absolute paths this step's apply mutates. Drives pre-modification
    /// snapshots and drift tracking; empty for steps that delegate to
    /// package managers.
    fn touched_paths(&self) -> Vec<PathBuf> {
        Vec::new()
    }

    /// The configuration layer that produced this step, for drift
    /// attribution.
    fn source_layer(&self) -> Option<String> {
        None
    }

    /// Lockable capability accessor.
    fn as_lockable(&self) -> Option<&dyn LockableStep> {
        None
    }

    /// Versioned capability accessor.
    fn as_versioned(&self) -> Option<&dyn VersionedStep> {
        None
    }
}
