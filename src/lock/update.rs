//! lock::update
//!
//! Post-plan lockfile reconciliation.
//!
//! # Algorithm
//!
//! After a successful plan (and apply), the lockfile is reconciled
//! against the steps that were planned:
//!
//! 1. Every lockable step contributes its lock info. A version of
//!    `"latest"` is resolved to the actually installed version when the
//!    step can introspect it.
//! 2. Each entry is written with a fresh integrity hash (unchanged
//!    entries keep their timestamp).
//! 3. Stale entries are pruned, but only for providers touched in this
//!    round: an existing `(provider, name)` whose provider appears in
//!    the update set without its key being rewritten is removed.
//!    Providers not touched in this run are left untouched.
//!
//! Frozen mode performs no implicit writes; callers skip reconciliation
//! entirely in that mode.

use std::collections::BTreeSet;

use crate::core::context::RunContext;
use crate::core::graph::StepGraph;
use crate::engine::plan::Plan;

use super::lockfile::{Lockfile, LockfileError};

/// What a reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockUpdateReport {
    /// Keys written this round.
    pub written: Vec<(String, String)>,
    /// Stale keys removed this round.
    pub pruned: Vec<(String, String)>,
}

impl LockUpdateReport {
    /// Whether the pass changed nothing.
    pub fn is_empty(&self) -> bool {
        self.written.is_empty() && self.pruned.is_empty()
    }
}

/// Reconcile a lockfile with the lockable steps of a plan.
///
/// Returns the updated lockfile and a report of written and pruned keys.
/// The input lockfile is consumed; persistence is the caller's job.
pub fn update_from_plan(
    mut lockfile: Lockfile,
    plan: &Plan,
    graph: &StepGraph,
    ctx: &RunContext,
) -> Result<(Lockfile, LockUpdateReport), LockfileError> {
    let mut report = LockUpdateReport::default();
    let mut touched_providers = BTreeSet::new();
    let mut written = BTreeSet::new();

    for entry in plan.entries() {
        let Some(step) = graph.get(&entry.step_id) else {
            continue;
        };
        let Some(lockable) = step.as_lockable() else {
            continue;
        };
        let Some(info) = lockable.lock_info() else {
            continue;
        };

        let mut version = info.version.clone();
        if version == "latest" {
            if let Some(versioned) = step.as_versioned() {
                // Introspection failures leave the placeholder in place;
                // the entry still records that the package is managed.
                if let Ok(Some(installed)) = versioned.installed_version(ctx) {
                    version = installed;
                }
            }
        }

        lockfile.set_package(&info.provider, &info.name, &version)?;
        touched_providers.insert(info.provider.clone());
        written.insert((info.provider.clone(), info.name.clone()));
        report
            .written
            .push((info.provider.clone(), info.name.clone()));
    }

    let stale: Vec<(String, String)> = lockfile
        .packages()
        .filter(|package| {
            touched_providers.contains(&package.provider)
                && !written.contains(&(package.provider.clone(), package.name.clone()))
        })
        .map(|package| (package.provider.clone(), package.name.clone()))
        .collect();
    for (provider, name) in stale {
        lockfile.remove_package(&provider, &name);
        report.pruned.push((provider, name));
    }

    Ok((lockfile, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::mock::MockStep;
    use crate::core::types::Status;
    use crate::engine::planner;
    use crate::lock::lockfile::{LockMode, MachineInfo};

    fn machine() -> MachineInfo {
        MachineInfo {
            os: "linux".to_string(),
            arch: "x86_64".to_string(),
            host: "devbox".to_string(),
        }
    }

    fn plan_for(graph: &StepGraph, ctx: &RunContext) -> Plan {
        planner::plan(ctx, graph).expect("plan")
    }

    #[test]
    fn lockable_steps_are_written() {
        let ctx = RunContext::for_current_user("/tmp");
        let mut graph = StepGraph::new();
        graph
            .insert(Box::new(
                MockStep::new("brew:formula:ripgrep", Status::Satisfied)
                    .with_lock_info("brew", "ripgrep", "14.1.0"),
            ))
            .unwrap();

        let plan = plan_for(&graph, &ctx);
        let lockfile = Lockfile::with_machine(LockMode::Locked, machine());
        let (lockfile, report) = update_from_plan(lockfile, &plan, &graph, &ctx).unwrap();

        assert_eq!(lockfile.get("brew", "ripgrep").unwrap().version, "14.1.0");
        assert_eq!(report.written.len(), 1);
        assert!(report.pruned.is_empty());
    }

    #[test]
    fn latest_resolved_through_installed_version() {
        let ctx = RunContext::for_current_user("/tmp");
        let mut graph = StepGraph::new();
        graph
            .insert(Box::new(
                MockStep::new("brew:formula:ripgrep", Status::Satisfied)
                    .with_lock_info("brew", "ripgrep", "latest")
                    .with_installed_version("14.1.0"),
            ))
            .unwrap();

        let plan = plan_for(&graph, &ctx);
        let lockfile = Lockfile::with_machine(LockMode::Intent, machine());
        let (lockfile, _) = update_from_plan(lockfile, &plan, &graph, &ctx).unwrap();

        let entry = lockfile.get("brew", "ripgrep").unwrap();
        assert_eq!(entry.version, "14.1.0");
        assert!(!entry.integrity.is_empty());
    }

    #[test]
    fn latest_kept_when_version_not_introspectable() {
        let ctx = RunContext::for_current_user("/tmp");
        let mut graph = StepGraph::new();
        graph
            .insert(Box::new(
                MockStep::new("brew:formula:ripgrep", Status::Satisfied)
                    .with_lock_info("brew", "ripgrep", "latest"),
            ))
            .unwrap();

        let plan = plan_for(&graph, &ctx);
        let lockfile = Lockfile::with_machine(LockMode::Intent, machine());
        let (lockfile, _) = update_from_plan(lockfile, &plan, &graph, &ctx).unwrap();

        assert_eq!(lockfile.get("brew", "ripgrep").unwrap().version, "latest");
    }

    #[test]
    fn prunes_stale_entries_of_touched_providers_only() {
        let ctx = RunContext::for_current_user("/tmp");
        let mut graph = StepGraph::new();
        graph
            .insert(Box::new(
                MockStep::new("brew:formula:ripgrep", Status::Satisfied)
                    .with_lock_info("brew", "ripgrep", "14.1.0"),
            ))
            .unwrap();

        let mut lockfile = Lockfile::with_machine(LockMode::Locked, machine());
        // Stale: same provider, no longer configured.
        lockfile.set_package("brew", "fd", "10.2.0").unwrap();
        // Different provider: must survive untouched.
        lockfile.set_package("npm", "typescript", "5.6.2").unwrap();

        let plan = plan_for(&graph, &ctx);
        let (lockfile, report) = update_from_plan(lockfile, &plan, &graph, &ctx).unwrap();

        assert!(lockfile.get("brew", "fd").is_none());
        assert!(lockfile.get("npm", "typescript").is_some());
        assert_eq!(report.pruned, vec![("brew".to_string(), "fd".to_string())]);
    }

    #[test]
    fn non_lockable_steps_are_ignored() {
        let ctx = RunContext::for_current_user("/tmp");
        let mut graph = StepGraph::new();
        graph
            .insert(Box::new(MockStep::new("files:link:zshrc", Status::Satisfied)))
            .unwrap();

        let plan = plan_for(&graph, &ctx);
        let lockfile = Lockfile::with_machine(LockMode::Intent, machine());
        let (lockfile, report) = update_from_plan(lockfile, &plan, &graph, &ctx).unwrap();

        assert!(lockfile.is_empty());
        assert!(report.is_empty());
    }

    #[test]
    fn identical_inputs_produce_identical_bytes() {
        let ctx = RunContext::for_current_user("/tmp");
        let mut graph = StepGraph::new();
        graph
            .insert(Box::new(
                MockStep::new("brew:formula:ripgrep", Status::Satisfied)
                    .with_lock_info("brew", "ripgrep", "14.1.0"),
            ))
            .unwrap();
        let plan = plan_for(&graph, &ctx);

        let lockfile = Lockfile::with_machine(LockMode::Locked, machine());
        let (first, _) = update_from_plan(lockfile, &plan, &graph, &ctx).unwrap();
        let first_bytes = toml::to_string_pretty(&first).unwrap();

        let (second, _) = update_from_plan(first, &plan, &graph, &ctx).unwrap();
        let second_bytes = toml::to_string_pretty(&second).unwrap();
        assert_eq!(first_bytes, second_bytes);
    }
}
