//! engine::exec
//!
//! The executor: applies a plan, honoring dependencies and failure
//! policy.
//!
//! # Executor Contract
//!
//! The executor MUST:
//! 1. Gate pending bootstrap steps behind operator confirmation
//! 2. Acquire the state-root lock before any non-dry-run mutation
//! 3. Snapshot the files a step touches before its apply
//! 4. Record a drift baseline after each successful apply
//! 5. Skip dependents of failed steps
//! 6. On failure with rollback enabled: stop, restore snapshots in
//!    reverse apply order, and report rollback outcomes separately from
//!    the original failure
//!
//! # Ordering guarantees
//!
//! Entries execute sequentially in plan order, which is a topological
//! linearization of the graph; a step's dependencies reach terminal
//! status before it starts, and result order always matches plan order.
//!
//! # Cancellation
//!
//! Checked at step boundaries: remaining entries become Skipped with
//! cause "cancelled". With rollback-on-failure enabled, cancellation is
//! treated as a failure and already-applied steps are rolled back.
//!
//! # Invariants
//!
//! - Dry-run performs no side effects (no locks, snapshots, or applies)
//! - A forwarded status (Satisfied/Skipped/Failed at plan time) is never
//!   re-derived
//! - Rollback errors never mask the original failure

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use thiserror::Error;

use crate::core::context::RunContext;
use crate::core::graph::StepGraph;
use crate::core::paths::StatePaths;
use crate::core::types::{Status, StepId};
use crate::lifecycle::{LifecycleError, SnapshotId, StateLock, StateLockError};

use super::gate;
use super::plan::{Plan, PlanEntry};
use super::rollback::{rollback_applied, RollbackReport};

/// Errors that abort execution before or during the step loop.
///
/// Per-step apply failures are not errors at this level; they are
/// contained in the returned results.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The plan contains pending bootstrap steps and no confirmation
    /// callback was configured.
    #[error("bootstrap steps require confirmation: {0}")]
    ConfirmationRequired(String),

    /// The operator declined the bootstrap confirmation.
    #[error("execution declined by operator")]
    Declined,

    /// The state-root lock could not be acquired.
    #[error(transparent)]
    StateLock(#[from] StateLockError),

    /// Snapshot or drift recording failed (infrastructural).
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// Rollback after a failure was itself incomplete.
    #[error("{summary}")]
    RollbackFailed {
        /// Human summary of the partial rollback.
        summary: String,
        /// Full results, including per-step rollback outcomes.
        report: ExecutionReport,
    },
}

/// Terminal outcome for one step after execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepResult {
    /// The step this result describes.
    pub step_id: StepId,
    /// Final status.
    pub status: Status,
    /// Failure or skip cause, when not satisfied.
    pub error: Option<String>,
    /// Wall-clock time spent on this step.
    pub duration: Duration,
}

/// Results of executing a plan.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    /// One result per plan entry, in plan order.
    pub results: Vec<StepResult>,
    /// Rollback outcomes, when a rollback ran.
    pub rollback: Option<RollbackReport>,
}

impl ExecutionReport {
    /// Whether no step failed.
    pub fn success(&self) -> bool {
        self.results.iter().all(|r| r.status != Status::Failed)
    }

    /// Results with a failed status.
    pub fn failed(&self) -> impl Iterator<Item = &StepResult> {
        self.results.iter().filter(|r| r.status == Status::Failed)
    }

    /// Counts by final status.
    pub fn counts(&self) -> BTreeMap<Status, usize> {
        let mut counts = BTreeMap::new();
        for result in &self.results {
            *counts.entry(result.status).or_insert(0) += 1;
        }
        counts
    }

    /// One-line summary for display.
    pub fn summary(&self) -> String {
        let ok = self
            .results
            .iter()
            .filter(|r| r.status == Status::Satisfied)
            .count();
        let failed = self.failed().count();
        let skipped = self
            .results
            .iter()
            .filter(|r| r.status == Status::Skipped)
            .count();
        format!("{ok} ok, {failed} failed, {skipped} skipped")
    }
}

/// Confirmation callback for pending bootstrap steps.
pub type BootstrapConfirmer<'a> = Box<dyn Fn(&[StepId]) -> bool + 'a>;

/// Applies plans to the live system.
///
/// The executor borrows the graph for the duration of a run and owns no
/// steps itself.
pub struct Executor<'a> {
    graph: &'a StepGraph,
    dry_run: bool,
    rollback_on_failure: bool,
    state_paths: Option<StatePaths>,
    confirm: Option<BootstrapConfirmer<'a>>,
}

impl<'a> Executor<'a> {
    /// Create an executor over a compiled graph.
    pub fn new(graph: &'a StepGraph) -> Self {
        Self {
            graph,
            dry_run: false,
            rollback_on_failure: false,
            state_paths: None,
            confirm: None,
        }
    }

    /// Enable dry-run: pending steps report success without applying.
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Roll back already-applied steps when any step fails.
    pub fn with_rollback_on_failure(mut self, rollback: bool) -> Self {
        self.rollback_on_failure = rollback;
        self
    }

    /// Hold the state-root lock for the duration of a non-dry run.
    pub fn with_state_paths(mut self, paths: StatePaths) -> Self {
        self.state_paths = Some(paths);
        self
    }

    /// Provide the operator confirmation for bootstrap steps.
    pub fn with_confirmation(mut self, confirm: BootstrapConfirmer<'a>) -> Self {
        self.confirm = Some(confirm);
        self
    }

    /// Execute a plan.
    ///
    /// Returns one result per plan entry in plan order. Apply failures
    /// are contained per step; only infrastructural problems (lock,
    /// snapshot, confirmation, incomplete rollback) surface as errors.
    pub fn execute(
        &self,
        ctx: &RunContext,
        plan: &Plan,
    ) -> Result<ExecutionReport, ExecuteError> {
        self.gate_bootstrap(plan)?;

        // Dry runs must not contend for the state root.
        let _state_lock = match (&self.state_paths, self.dry_run) {
            (Some(paths), false) => Some(StateLock::acquire(paths)?),
            _ => None,
        };

        let mut report = ExecutionReport::default();
        let mut outcomes: BTreeMap<StepId, Status> = BTreeMap::new();
        // (result index, step id, pre-apply snapshot) per attempted
        // apply. Failed applies are included: their partial effects are
        // undone by the same snapshot.
        let mut attempted: Vec<(usize, StepId, Option<SnapshotId>)> = Vec::new();
        let mut abort: Option<String> = None;

        for entry in plan.entries() {
            if abort.is_none() && ctx.cancel.is_cancelled() {
                abort = Some("cancelled".to_string());
            }

            if let Some(cause) = &abort {
                let result = skipped_result(entry, cause.clone());
                outcomes.insert(result.step_id.clone(), result.status);
                report.results.push(result);
                continue;
            }

            let start = Instant::now();
            let (mut result, snapshot) = self.execute_entry(ctx, entry, &outcomes)?;
            result.duration = start.elapsed();
            if ctx.debug {
                eprintln!("[debug] executed {}: {}", result.step_id, result.status);
            }

            let failed = result.status == Status::Failed;
            let apply_ran = entry.needs_apply()
                && !self.dry_run
                && matches!(result.status, Status::Satisfied | Status::Failed);
            if apply_ran {
                attempted.push((report.results.len(), result.step_id.clone(), snapshot));
            }

            outcomes.insert(result.step_id.clone(), result.status);
            report.results.push(result);

            if failed && self.rollback_on_failure {
                abort = Some("execution aborted".to_string());
            }
        }

        if abort.is_some() && self.rollback_on_failure && !attempted.is_empty() {
            self.perform_rollback(ctx, &mut report, &attempted);
        }

        match &report.rollback {
            Some(rollback) if rollback.has_failures() => Err(ExecuteError::RollbackFailed {
                summary: rollback.summary(),
                report,
            }),
            _ => Ok(report),
        }
    }

    fn gate_bootstrap(&self, plan: &Plan) -> Result<(), ExecuteError> {
        if self.dry_run {
            return Ok(());
        }
        let pending = gate::pending_bootstrap(plan);
        if pending.is_empty() {
            return Ok(());
        }
        let names = pending
            .iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match &self.confirm {
            None => Err(ExecuteError::ConfirmationRequired(names)),
            Some(confirm) if !confirm(&pending) => Err(ExecuteError::Declined),
            Some(_) => Ok(()),
        }
    }

    fn execute_entry(
        &self,
        ctx: &RunContext,
        entry: &PlanEntry,
        outcomes: &BTreeMap<StepId, Status>,
    ) -> Result<(StepResult, Option<SnapshotId>), ExecuteError> {
        match entry.status {
            // Forwarded unchanged from planning.
            Status::Satisfied | Status::Unknown => Ok((
                StepResult {
                    step_id: entry.step_id.clone(),
                    status: entry.status,
                    error: None,
                    duration: Duration::ZERO,
                },
                None,
            )),
            Status::Skipped | Status::Failed => Ok((
                StepResult {
                    step_id: entry.step_id.clone(),
                    status: entry.status,
                    error: entry.cause.clone(),
                    duration: Duration::ZERO,
                },
                None,
            )),
            Status::NeedsApply => self.apply_entry(ctx, entry, outcomes),
        }
    }

    fn apply_entry(
        &self,
        ctx: &RunContext,
        entry: &PlanEntry,
        outcomes: &BTreeMap<StepId, Status>,
    ) -> Result<(StepResult, Option<SnapshotId>), ExecuteError> {
        // A dependency that failed or was skipped at execution time
        // skips this step even when the plan said NeedsApply.
        for dep in self.graph.dependencies(&entry.step_id) {
            if matches!(
                outcomes.get(&dep),
                Some(Status::Failed) | Some(Status::Skipped)
            ) {
                return Ok((
                    StepResult {
                        step_id: entry.step_id.clone(),
                        status: Status::Skipped,
                        error: Some(format!("dependency {dep} did not complete")),
                        duration: Duration::ZERO,
                    },
                    None,
                ));
            }
        }

        if self.dry_run {
            return Ok((
                StepResult {
                    step_id: entry.step_id.clone(),
                    status: Status::Satisfied,
                    error: None,
                    duration: Duration::ZERO,
                },
                None,
            ));
        }

        let Some(step) = self.graph.get(&entry.step_id) else {
            return Ok((
                StepResult {
                    step_id: entry.step_id.clone(),
                    status: Status::Failed,
                    error: Some("step disappeared from graph".to_string()),
                    duration: Duration::ZERO,
                },
                None,
            ));
        };

        let touched = step.touched_paths();
        let snapshot = match &ctx.lifecycle {
            Some(lifecycle) => lifecycle.before_apply(&touched)?,
            None => None,
        };

        let result = match step.apply(ctx) {
            Ok(()) => {
                if let Some(lifecycle) = &ctx.lifecycle {
                    let layer = step.source_layer().unwrap_or_else(|| "base".to_string());
                    for path in &touched {
                        lifecycle.after_apply(path, &layer)?;
                    }
                }
                StepResult {
                    step_id: entry.step_id.clone(),
                    status: Status::Satisfied,
                    error: None,
                    duration: Duration::ZERO,
                }
            }
            Err(err) => StepResult {
                step_id: entry.step_id.clone(),
                status: Status::Failed,
                error: Some(format!("apply failed for {}: {err}", entry.step_id)),
                duration: Duration::ZERO,
            },
        };

        Ok((result, snapshot))
    }

    fn perform_rollback(
        &self,
        ctx: &RunContext,
        report: &mut ExecutionReport,
        attempted: &[(usize, StepId, Option<SnapshotId>)],
    ) {
        let Some(lifecycle) = &ctx.lifecycle else {
            return;
        };
        let pairs: Vec<(StepId, Option<SnapshotId>)> = attempted
            .iter()
            .map(|(_, id, snapshot)| (id.clone(), snapshot.clone()))
            .collect();
        let rollback = rollback_applied(lifecycle, &pairs);

        // Successfully applied steps become Failed("rolled back"); a step
        // that failed on its own keeps its original error even though its
        // snapshot was restored.
        for (index, _, _) in attempted {
            let result = &mut report.results[*index];
            if result.status == Status::Satisfied && rollback.restored.contains(&result.step_id) {
                result.status = Status::Failed;
                result.error = Some("rolled back".to_string());
            }
        }

        report.rollback = Some(rollback);
    }
}

fn skipped_result(entry: &PlanEntry, cause: String) -> StepResult {
    // Forward already-terminal entries unchanged even while aborting.
    match entry.status {
        Status::NeedsApply => StepResult {
            step_id: entry.step_id.clone(),
            status: Status::Skipped,
            error: Some(cause),
            duration: Duration::ZERO,
        },
        status => StepResult {
            step_id: entry.step_id.clone(),
            status,
            error: entry.cause.clone(),
            duration: Duration::ZERO,
        },
    }
}
