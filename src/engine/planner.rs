//! engine::planner
//!
//! Plan generation: walk the graph, check each step, record the verdict.
//!
//! # Algorithm
//!
//! Steps are visited in the graph's deterministic topological order. For
//! each step:
//!
//! 1. If any dependency already has a non-actionable failure (Failed, or
//!    Skipped in this run), the step is Skipped with the cause recorded.
//!    Failures cascade transitively because dependencies are always
//!    visited first.
//! 2. Otherwise the step's `check` runs. A check error records Failed.
//! 3. On NeedsApply, the step's `plan` produces the diff; a plan error
//!    records Failed.
//!
//! Cancellation is honored at step boundaries: once the context is
//! cancelled, every remaining entry is Skipped with cause "cancelled".
//!
//! # Invariants
//!
//! - One entry per graph step, in topological order
//! - `apply` is never invoked
//! - Identical inputs produce identical plans

use std::collections::BTreeMap;

use thiserror::Error;

use crate::core::context::RunContext;
use crate::core::graph::{GraphError, StepGraph};
use crate::core::types::{Status, StepId};

use super::gate;
use super::plan::{Plan, PlanEntry};

/// Errors from planning.
///
/// Operational failures (a step whose check throws) are contained in the
/// plan itself; only structural graph errors abort planning.
#[derive(Debug, Error)]
pub enum PlannerError {
    /// The graph is structurally invalid.
    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Determine what needs to change.
///
/// Walks the graph in topological order, checks every step, and returns
/// the resulting plan. See the module docs for the cascade and
/// cancellation rules.
pub fn plan(ctx: &RunContext, graph: &StepGraph) -> Result<Plan, PlannerError> {
    let order = graph.topological_order()?;
    let mut statuses: BTreeMap<StepId, Status> = BTreeMap::new();
    let mut entries = Vec::with_capacity(order.len());

    for id in order {
        let entry = plan_step(ctx, graph, &id, &statuses);
        statuses.insert(id, entry.status);
        entries.push(entry);
    }

    Ok(Plan::from_entries(entries))
}

fn plan_step(
    ctx: &RunContext,
    graph: &StepGraph,
    id: &StepId,
    statuses: &BTreeMap<StepId, Status>,
) -> PlanEntry {
    let bootstrap = gate::is_bootstrap(id);
    let mut entry = PlanEntry {
        step_id: id.clone(),
        status: Status::Unknown,
        diff: None,
        cause: None,
        bootstrap,
    };

    if ctx.cancel.is_cancelled() {
        entry.status = Status::Skipped;
        entry.cause = Some("cancelled".to_string());
        return entry;
    }

    // Dependencies were planned first; any dead dependency skips this
    // step, which in turn skips its own dependents.
    for dep in graph.dependencies(id) {
        match statuses.get(&dep) {
            Some(Status::Failed) => {
                entry.status = Status::Skipped;
                entry.cause = Some(format!("dependency {dep} failed"));
                return entry;
            }
            Some(Status::Skipped) => {
                entry.status = Status::Skipped;
                entry.cause = Some(format!("dependency {dep} skipped"));
                return entry;
            }
            _ => {}
        }
    }

    let step = match graph.get(id) {
        Some(step) => step,
        None => {
            entry.status = Status::Failed;
            entry.cause = Some(format!("step {id} disappeared from graph"));
            return entry;
        }
    };

    match step.check(ctx) {
        Err(err) => {
            entry.status = Status::Failed;
            entry.cause = Some(format!("check failed for {id}: {err}"));
        }
        Ok(Status::NeedsApply) => match step.plan(ctx) {
            Ok(diff) => {
                entry.status = Status::NeedsApply;
                entry.diff = Some(diff);
            }
            Err(err) => {
                entry.status = Status::Failed;
                entry.cause = Some(format!("plan failed for {id}: {err}"));
            }
        },
        Ok(status) => {
            entry.status = status;
        }
    }

    if ctx.debug {
        eprintln!("[debug] planned {id}: {}", entry.status);
    }

    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::mock::MockStep;
    use crate::core::context::CancelToken;
    use crate::core::step::Diff;

    fn ctx() -> RunContext {
        RunContext::for_current_user("/tmp")
    }

    fn graph_of(steps: Vec<MockStep>) -> StepGraph {
        let mut graph = StepGraph::new();
        for step in steps {
            graph.insert(Box::new(step)).unwrap();
        }
        graph
    }

    #[test]
    fn empty_graph_plans_empty() {
        let plan = plan(&ctx(), &StepGraph::new()).unwrap();
        assert!(plan.is_empty());
        assert!(!plan.has_changes());
    }

    #[test]
    fn one_entry_per_step() {
        let graph = graph_of(vec![
            MockStep::satisfied("mock:a"),
            MockStep::needs_apply("mock:b"),
            MockStep::satisfied("mock:c"),
        ]);
        let plan = plan(&ctx(), &graph).unwrap();
        assert_eq!(plan.len(), graph.len());
    }

    #[test]
    fn deterministic_sibling_order() {
        // a <- b, a <- c: siblings order lexicographically after a.
        let graph = graph_of(vec![
            MockStep::needs_apply("mock:c").depends_on(&["mock:a"]),
            MockStep::needs_apply("mock:b").depends_on(&["mock:a"]),
            MockStep::needs_apply("mock:a"),
        ]);
        let plan = plan(&ctx(), &graph).unwrap();
        let ids: Vec<&str> = plan
            .entries()
            .iter()
            .map(|e| e.step_id.as_str())
            .collect();
        assert_eq!(ids, vec!["mock:a", "mock:b", "mock:c"]);
    }

    #[test]
    fn needs_apply_collects_diff() {
        let graph = graph_of(vec![MockStep::needs_apply("mock:a")
            .with_diff(Diff::new("mock:a", "install a"))]);
        let plan = plan(&ctx(), &graph).unwrap();

        let entry = &plan.entries()[0];
        assert_eq!(entry.status, Status::NeedsApply);
        assert_eq!(entry.diff.as_ref().unwrap().summary(), "install a");
    }

    #[test]
    fn satisfied_has_no_diff() {
        let graph = graph_of(vec![MockStep::satisfied("mock:a")]);
        let plan = plan(&ctx(), &graph).unwrap();
        assert!(plan.entries()[0].diff.is_none());
    }

    #[test]
    fn check_error_records_failed_with_cause() {
        let graph = graph_of(vec![MockStep::satisfied("mock:x").failing_check("boom")]);
        let plan = plan(&ctx(), &graph).unwrap();

        let entry = &plan.entries()[0];
        assert_eq!(entry.status, Status::Failed);
        let cause = entry.cause.as_deref().unwrap();
        assert!(cause.contains("mock:x"));
        assert!(cause.contains("boom"));
    }

    #[test]
    fn plan_error_records_failed() {
        let graph = graph_of(vec![MockStep::needs_apply("mock:a").failing_plan("no diff")]);
        let plan = plan(&ctx(), &graph).unwrap();

        let entry = &plan.entries()[0];
        assert_eq!(entry.status, Status::Failed);
        assert!(entry.cause.as_deref().unwrap().contains("plan failed"));
    }

    #[test]
    fn failure_cascades_through_chain() {
        // x -> y -> z: x fails, y and z are skipped.
        let graph = graph_of(vec![
            MockStep::satisfied("mock:x").failing_check("boom"),
            MockStep::satisfied("mock:y").depends_on(&["mock:x"]),
            MockStep::satisfied("mock:z").depends_on(&["mock:y"]),
        ]);
        let plan = plan(&ctx(), &graph).unwrap();

        let x = plan.entry(&StepId::parse("mock:x").unwrap()).unwrap();
        let y = plan.entry(&StepId::parse("mock:y").unwrap()).unwrap();
        let z = plan.entry(&StepId::parse("mock:z").unwrap()).unwrap();
        assert_eq!(x.status, Status::Failed);
        assert_eq!(y.status, Status::Skipped);
        assert_eq!(
            y.cause.as_deref(),
            Some("dependency mock:x failed")
        );
        assert_eq!(z.status, Status::Skipped);
        assert_eq!(
            z.cause.as_deref(),
            Some("dependency mock:y skipped")
        );
    }

    #[test]
    fn independent_siblings_unaffected_by_failure() {
        let graph = graph_of(vec![
            MockStep::satisfied("mock:bad").failing_check("boom"),
            MockStep::needs_apply("mock:good"),
        ]);
        let plan = plan(&ctx(), &graph).unwrap();

        assert_eq!(
            plan.entry(&StepId::parse("mock:good").unwrap())
                .unwrap()
                .status,
            Status::NeedsApply
        );
    }

    #[test]
    fn unknown_status_forwarded() {
        let graph = graph_of(vec![MockStep::new("mock:odd", Status::Unknown)]);
        let plan = plan(&ctx(), &graph).unwrap();
        assert_eq!(plan.entries()[0].status, Status::Unknown);
    }

    #[test]
    fn cancellation_skips_everything() {
        let token = CancelToken::new();
        token.cancel();
        let ctx = ctx().with_cancel(token);

        let graph = graph_of(vec![
            MockStep::needs_apply("mock:a"),
            MockStep::needs_apply("mock:b"),
        ]);
        let plan = plan(&ctx, &graph).unwrap();

        for entry in plan.entries() {
            assert_eq!(entry.status, Status::Skipped);
            assert_eq!(entry.cause.as_deref(), Some("cancelled"));
        }
    }

    #[test]
    fn bootstrap_entries_flagged() {
        let graph = graph_of(vec![
            MockStep::needs_apply("brew:install"),
            MockStep::needs_apply("brew:formula:ripgrep").depends_on(&["brew:install"]),
        ]);
        let plan = plan(&ctx(), &graph).unwrap();

        assert!(plan.entry(&StepId::parse("brew:install").unwrap()).unwrap().bootstrap);
        assert!(
            !plan
                .entry(&StepId::parse("brew:formula:ripgrep").unwrap())
                .unwrap()
                .bootstrap
        );
    }

    #[test]
    fn identical_inputs_identical_plans() {
        let make = || {
            graph_of(vec![
                MockStep::needs_apply("mock:b").depends_on(&["mock:a"]),
                MockStep::satisfied("mock:a"),
            ])
        };
        let first = plan(&ctx(), &make()).unwrap();
        let second = plan(&ctx(), &make()).unwrap();
        assert_eq!(first.digest(), second.digest());
    }
}
