//! engine::rollback
//!
//! Restoring pre-modification snapshots after a failed execution.
//!
//! # Rollback Order
//!
//! Applied steps are rolled back in reverse apply order, so a file
//! touched by two steps ends up with its oldest captured bytes.
//!
//! # Partial failure policy
//!
//! A rollback error does not stop the rollback: every remaining snapshot
//! is still restored and every error is collected in the report. The
//! original execution failure stays the primary error; rollback outcomes
//! are reported alongside it.
//!
//! # Known Limitations
//!
//! - Steps that touch no files (package installs) have no snapshot and
//!   cannot be restored; they are reported as not restorable.

use thiserror::Error;

use crate::core::types::StepId;
use crate::lifecycle::{Lifecycle, SnapshotId};

/// Errors from a single restore attempt.
#[derive(Debug, Error)]
pub enum RollbackError {
    /// The snapshot could not be restored.
    #[error("restore failed for {step}: {message}")]
    RestoreFailed {
        /// The step whose snapshot failed to restore.
        step: StepId,
        /// Failure description.
        message: String,
    },
}

/// Outcome of a rollback pass.
#[derive(Debug, Default)]
pub struct RollbackReport {
    /// Steps whose snapshots were restored, in rollback order.
    pub restored: Vec<StepId>,
    /// Steps whose restore failed, with the error.
    pub failed: Vec<(StepId, RollbackError)>,
    /// Applied steps that had no snapshot to restore.
    pub not_restorable: Vec<StepId>,
}

impl RollbackReport {
    /// Whether every restorable step was restored.
    pub fn complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Whether any restore failed.
    pub fn has_failures(&self) -> bool {
        !self.failed.is_empty()
    }

    /// One-line summary for display.
    pub fn summary(&self) -> String {
        if self.complete() {
            format!("rolled back {} steps", self.restored.len())
        } else {
            format!(
                "partial rollback: {} restored, {} failed",
                self.restored.len(),
                self.failed.len()
            )
        }
    }
}

/// Roll back applied steps in reverse apply order.
///
/// `applied` pairs each applied step with the snapshot captured before
/// its apply (or `None` when the step touched no files).
pub fn rollback_applied(
    lifecycle: &Lifecycle,
    applied: &[(StepId, Option<SnapshotId>)],
) -> RollbackReport {
    let mut report = RollbackReport::default();

    for (step_id, snapshot) in applied.iter().rev() {
        match snapshot {
            None => report.not_restorable.push(step_id.clone()),
            Some(id) => match lifecycle.restore(id) {
                Ok(()) => report.restored.push(step_id.clone()),
                Err(err) => report.failed.push((
                    step_id.clone(),
                    RollbackError::RestoreFailed {
                        step: step_id.clone(),
                        message: err.to_string(),
                    },
                )),
            },
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::paths::StatePaths;
    use std::fs;
    use tempfile::TempDir;

    fn id(s: &str) -> StepId {
        StepId::parse(s).unwrap()
    }

    #[test]
    fn restores_in_reverse_order() {
        let state = TempDir::new().unwrap();
        let files = TempDir::new().unwrap();
        let lifecycle = Lifecycle::new(StatePaths::new(state.path()));

        let file = files.path().join("f");
        fs::write(&file, b"v0").unwrap();
        let snap_a = lifecycle.before_apply(&[file.clone()]).unwrap().unwrap();
        fs::write(&file, b"v1").unwrap();
        let snap_b = lifecycle.before_apply(&[file.clone()]).unwrap().unwrap();
        fs::write(&file, b"v2").unwrap();

        let applied = vec![
            (id("mock:a"), Some(snap_a)),
            (id("mock:b"), Some(snap_b)),
        ];
        let report = rollback_applied(&lifecycle, &applied);

        assert!(report.complete());
        assert_eq!(report.restored, vec![id("mock:b"), id("mock:a")]);
        // b's snapshot restores v1, then a's snapshot restores v0.
        assert_eq!(fs::read(&file).unwrap(), b"v0");
    }

    #[test]
    fn continues_past_failures() {
        let state = TempDir::new().unwrap();
        let files = TempDir::new().unwrap();
        let lifecycle = Lifecycle::new(StatePaths::new(state.path()));

        let file = files.path().join("f");
        fs::write(&file, b"original").unwrap();
        let good = lifecycle.before_apply(&[file.clone()]).unwrap().unwrap();
        fs::write(&file, b"changed").unwrap();

        let applied = vec![
            (id("mock:a"), Some(good)),
            (id("mock:b"), Some(SnapshotId::from_string("missing"))),
        ];
        let report = rollback_applied(&lifecycle, &applied);

        assert!(report.has_failures());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, id("mock:b"));
        // The earlier step still got restored.
        assert_eq!(report.restored, vec![id("mock:a")]);
        assert_eq!(fs::read(&file).unwrap(), b"original");
    }

    #[test]
    fn snapshotless_steps_reported_not_restorable() {
        let state = TempDir::new().unwrap();
        let lifecycle = Lifecycle::new(StatePaths::new(state.path()));

        let applied = vec![(id("brew:formula:ripgrep"), None)];
        let report = rollback_applied(&lifecycle, &applied);

        assert!(report.complete());
        assert_eq!(report.not_restorable, vec![id("brew:formula:ripgrep")]);
    }

    #[test]
    fn summary_text() {
        let mut report = RollbackReport::default();
        report.restored.push(id("mock:a"));
        assert!(report.summary().contains("rolled back 1"));

        report.failed.push((
            id("mock:b"),
            RollbackError::RestoreFailed {
                step: id("mock:b"),
                message: "gone".to_string(),
            },
        ));
        assert!(report.summary().contains("partial"));
    }
}
