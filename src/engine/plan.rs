//! engine::plan
//!
//! Deterministic plans: the sole intermediate representation between a
//! compiled graph and system mutation.
//!
//! # Architecture
//!
//! A plan is an ordered sequence of entries - one per graph step, in
//! topological order - each carrying the step's checked status and, for
//! steps that need applying, the diff describing the change.
//!
//! Plans are:
//! - **Deterministic**: Same inputs always produce the same plan
//! - **Previewable**: Can be shown to the operator before execution
//! - **Immutable**: Instantiated per planning run, never mutated
//!
//! # Invariants
//!
//! - Entry order is a topological linearization of the graph
//! - Exactly one entry per graph step
//! - `apply` is never invoked while planning

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::step::Diff;
use crate::core::types::{Status, StepId};

/// One step's planned outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanEntry {
    /// The step this entry describes.
    pub step_id: StepId,
    /// Status reported by the step's check (or derived from its
    /// dependencies).
    pub status: Status,
    /// The change the step would make; present only for
    /// [`Status::NeedsApply`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<Diff>,
    /// Why the step is skipped or failed, when it is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// The step installs or initializes a package manager and requires
    /// operator confirmation before executing.
    #[serde(default)]
    pub bootstrap: bool,
}

impl PlanEntry {
    /// Whether this entry represents a pending change.
    pub fn needs_apply(&self) -> bool {
        self.status == Status::NeedsApply
    }
}

/// Status counts for a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanSummary {
    /// Steps already matching the desired state.
    pub satisfied: usize,
    /// Steps with pending changes.
    pub needs_apply: usize,
    /// Steps skipped (failed dependency or cancellation).
    pub skipped: usize,
    /// Steps whose check or plan failed.
    pub failed: usize,
    /// Steps whose state could not be determined.
    pub unknown: usize,
}

impl PlanSummary {
    /// Total number of entries.
    pub fn total(&self) -> usize {
        self.satisfied + self.needs_apply + self.skipped + self.failed + self.unknown
    }
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to apply, {} satisfied, {} skipped, {} failed, {} unknown",
            self.needs_apply, self.satisfied, self.skipped, self.failed, self.unknown
        )
    }
}

/// An ordered, immutable plan over a compiled graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    entries: Vec<PlanEntry>,
}

impl Plan {
    /// Build a plan from entries already in dependency order.
    pub fn from_entries(entries: Vec<PlanEntry>) -> Self {
        Self { entries }
    }

    /// The entries in dependency order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Look up one entry by step id.
    pub fn entry(&self, id: &StepId) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| &e.step_id == id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether any entry needs applying.
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(PlanEntry::needs_apply)
    }

    /// Status counts.
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for entry in &self.entries {
            match entry.status {
                Status::Satisfied => summary.satisfied += 1,
                Status::NeedsApply => summary.needs_apply += 1,
                Status::Skipped => summary.skipped += 1,
                Status::Failed => summary.failed += 1,
                Status::Unknown => summary.unknown += 1,
            }
        }
        summary
    }

    /// SHA-256 digest of the canonical JSON serialization, for
    /// comparing plans across runs.
    pub fn digest(&self) -> String {
        let json = serde_json::to_string(&self.entries).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(json.as_bytes());
        format!("sha256:{}", hex::encode(hasher.finalize()))
    }

    /// Human preview: one numbered line per pending change, plus causes
    /// for skipped and failed entries.
    pub fn preview(&self) -> String {
        if !self.has_changes() && self.summary().failed == 0 {
            return "No changes needed".to_string();
        }

        let mut lines = Vec::new();
        let mut index = 0usize;
        for entry in &self.entries {
            match entry.status {
                Status::NeedsApply => {
                    index += 1;
                    let summary = entry
                        .diff
                        .as_ref()
                        .map(|d| d.summary().to_string())
                        .unwrap_or_else(|| entry.step_id.to_string());
                    let marker = if entry.bootstrap { " [bootstrap]" } else { "" };
                    lines.push(format!("  {index}. {summary}{marker}"));
                }
                Status::Failed => {
                    let cause = entry.cause.as_deref().unwrap_or("unknown failure");
                    lines.push(format!("  ! {}: {cause}", entry.step_id));
                }
                Status::Skipped => {
                    let cause = entry.cause.as_deref().unwrap_or("skipped");
                    lines.push(format!("  - {}: {cause}", entry.step_id));
                }
                Status::Satisfied | Status::Unknown => {}
            }
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> StepId {
        StepId::parse(s).unwrap()
    }

    fn entry(step: &str, status: Status) -> PlanEntry {
        PlanEntry {
            step_id: id(step),
            status,
            diff: None,
            cause: None,
            bootstrap: false,
        }
    }

    #[test]
    fn empty_plan_has_no_changes() {
        let plan = Plan::from_entries(vec![]);
        assert!(plan.is_empty());
        assert!(!plan.has_changes());
        assert_eq!(plan.summary().total(), 0);
    }

    #[test]
    fn summary_counts_by_status() {
        let plan = Plan::from_entries(vec![
            entry("mock:a", Status::Satisfied),
            entry("mock:b", Status::NeedsApply),
            entry("mock:c", Status::NeedsApply),
            entry("mock:d", Status::Skipped),
            entry("mock:e", Status::Failed),
        ]);

        let summary = plan.summary();
        assert_eq!(summary.satisfied, 1);
        assert_eq!(summary.needs_apply, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.unknown, 0);
        assert_eq!(summary.total(), plan.len());
        assert!(plan.has_changes());
    }

    #[test]
    fn summary_display() {
        let plan = Plan::from_entries(vec![entry("mock:a", Status::NeedsApply)]);
        let text = plan.summary().to_string();
        assert!(text.starts_with("1 to apply"));
    }

    #[test]
    fn entry_lookup() {
        let plan = Plan::from_entries(vec![entry("mock:a", Status::Satisfied)]);
        assert!(plan.entry(&id("mock:a")).is_some());
        assert!(plan.entry(&id("mock:b")).is_none());
    }

    #[test]
    fn digest_deterministic() {
        let a = Plan::from_entries(vec![entry("mock:a", Status::NeedsApply)]);
        let b = Plan::from_entries(vec![entry("mock:a", Status::NeedsApply)]);
        assert_eq!(a.digest(), b.digest());
        assert!(a.digest().starts_with("sha256:"));
    }

    #[test]
    fn digest_changes_with_content() {
        let a = Plan::from_entries(vec![entry("mock:a", Status::NeedsApply)]);
        let b = Plan::from_entries(vec![entry("mock:a", Status::Satisfied)]);
        assert_ne!(a.digest(), b.digest());
    }

    #[test]
    fn preview_no_changes() {
        let plan = Plan::from_entries(vec![entry("mock:a", Status::Satisfied)]);
        assert_eq!(plan.preview(), "No changes needed");
    }

    #[test]
    fn preview_numbers_pending_changes() {
        let mut first = entry("mock:a", Status::NeedsApply);
        first.diff = Some(Diff::new("mock:a", "install a"));
        let second = entry("mock:b", Status::NeedsApply);

        let plan = Plan::from_entries(vec![first, second]);
        let preview = plan.preview();
        assert!(preview.contains("1. install a"));
        assert!(preview.contains("2. mock:b"));
    }

    #[test]
    fn preview_marks_bootstrap_and_failures() {
        let mut boot = entry("brew:install", Status::NeedsApply);
        boot.bootstrap = true;
        let mut failed = entry("mock:x", Status::Failed);
        failed.cause = Some("boom".to_string());

        let plan = Plan::from_entries(vec![boot, failed]);
        let preview = plan.preview();
        assert!(preview.contains("[bootstrap]"));
        assert!(preview.contains("! mock:x: boom"));
    }

    #[test]
    fn serialization_round_trip() {
        let mut e = entry("mock:a", Status::NeedsApply);
        e.diff = Some(Diff::new("mock:a", "change"));
        e.cause = None;
        let plan = Plan::from_entries(vec![e]);

        let json = serde_json::to_string(&plan).unwrap();
        let back: Plan = serde_json::from_str(&json).unwrap();
        assert_eq!(back, plan);
    }
}
