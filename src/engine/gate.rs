//! engine::gate
//!
//! Bootstrap gating: changes that install a package manager require
//! explicit operator confirmation.
//!
//! # Design
//!
//! A step is a bootstrap step iff its id is one of a known set of
//! manager-initialization ids, or it lives in the `bootstrap:` namespace.
//! When a plan contains any pending bootstrap step, the executor refuses
//! to run without a confirmation callback, and aborts when the operator
//! declines.

use crate::core::types::{Status, StepId};

use super::plan::Plan;

/// Step ids that initialize a package manager.
pub const BOOTSTRAP_STEP_IDS: [&str; 5] = [
    "brew:install",
    "chocolatey:install",
    "scoop:install",
    "apt:update",
    "winget:ready",
];

/// Whether a step id denotes a bootstrap step.
pub fn is_bootstrap(id: &StepId) -> bool {
    BOOTSTRAP_STEP_IDS.contains(&id.as_str()) || id.provider() == "bootstrap"
}

/// Pending bootstrap steps in a plan, in plan order.
pub fn pending_bootstrap(plan: &Plan) -> Vec<StepId> {
    plan.entries()
        .iter()
        .filter(|entry| entry.status == Status::NeedsApply && entry.bootstrap)
        .map(|entry| entry.step_id.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::plan::PlanEntry;

    fn id(s: &str) -> StepId {
        StepId::parse(s).unwrap()
    }

    #[test]
    fn known_ids_are_bootstrap() {
        for raw in BOOTSTRAP_STEP_IDS {
            assert!(is_bootstrap(&id(raw)), "{raw} should be bootstrap");
        }
    }

    #[test]
    fn bootstrap_namespace_is_bootstrap() {
        assert!(is_bootstrap(&id("bootstrap:xcode-select")));
    }

    #[test]
    fn ordinary_steps_are_not_bootstrap() {
        assert!(!is_bootstrap(&id("brew:formula:ripgrep")));
        assert!(!is_bootstrap(&id("apt:package:curl")));
    }

    #[test]
    fn pending_bootstrap_filters_by_status() {
        let entries = vec![
            PlanEntry {
                step_id: id("brew:install"),
                status: Status::NeedsApply,
                diff: None,
                cause: None,
                bootstrap: true,
            },
            PlanEntry {
                step_id: id("apt:update"),
                status: Status::Satisfied,
                diff: None,
                cause: None,
                bootstrap: true,
            },
            PlanEntry {
                step_id: id("brew:formula:ripgrep"),
                status: Status::NeedsApply,
                diff: None,
                cause: None,
                bootstrap: false,
            },
        ];
        let plan = Plan::from_entries(entries);

        let pending = pending_bootstrap(&plan);
        assert_eq!(pending, vec![id("brew:install")]);
    }
}
