//! cli::commands::apply
//!
//! `pf apply` - plan, confirm, execute, and reconcile the lockfile.
//!
//! The full pipeline: compile -> plan -> execute -> lock-update. The
//! lockfile is only reconciled after a fully successful, non-dry run,
//! and never in frozen mode (no implicit writes).

use anyhow::{bail, Result};

use crate::cli::Context;
use crate::engine::{planner, Executor};
use crate::lock::{update_from_plan, FileLockRepo, LockMode, LockRepo, Lockfile};
use crate::ui::{output, prompts};

use super::Pipeline;

pub fn run(
    ctx: &Context,
    dry_run: bool,
    rollback: bool,
    yes: bool,
    mode: Option<LockMode>,
) -> Result<()> {
    let verbosity = ctx.verbosity();
    let pipeline = Pipeline::load(ctx, mode)?;
    let (graph, warnings) = pipeline.compile(ctx)?;
    for warning in &warnings {
        output::warn(warning, verbosity);
    }

    let run_ctx = pipeline.run_context(ctx, dry_run);
    let plan = planner::plan(&run_ctx, &graph)?;
    output::print(plan.preview(), verbosity);

    let mut executor = Executor::new(&graph)
        .with_dry_run(dry_run)
        .with_rollback_on_failure(rollback);
    if let Some(paths) = Pipeline::state_paths(ctx) {
        executor = executor.with_state_paths(paths);
    }
    let interactive = ctx.interactive;
    executor = executor.with_confirmation(Box::new(move |pending| {
        if yes {
            return true;
        }
        let names: Vec<String> = pending.iter().map(|id| id.to_string()).collect();
        let message = format!(
            "The following steps install package managers:\n{}\nProceed?",
            output::format_list(&names, "  - ")
        );
        prompts::confirm(&message, false, interactive).unwrap_or(false)
    }));

    let report = executor.execute(&run_ctx, &plan)?;
    for result in &report.results {
        match &result.error {
            Some(error) => output::print(
                format!("{} {} ({error})", result.status, result.step_id),
                verbosity,
            ),
            None => output::print(format!("{} {}", result.status, result.step_id), verbosity),
        }
    }
    if let Some(rollback) = &report.rollback {
        output::warn(rollback.summary(), verbosity);
    }
    output::print(report.summary(), verbosity);

    if report.success() && !dry_run && pipeline.mode.allows_writes() {
        let lockfile = pipeline
            .lockfile
            .clone()
            .unwrap_or_else(|| Lockfile::new(pipeline.mode));
        let (lockfile, update) = update_from_plan(lockfile, &plan, &graph, &run_ctx)?;
        if !update.is_empty() || pipeline.lockfile.is_none() {
            FileLockRepo::new().save(&pipeline.lockfile_path, &lockfile)?;
            output::debug(
                format!(
                    "lockfile updated: {} written, {} pruned",
                    update.written.len(),
                    update.pruned.len()
                ),
                verbosity,
            );
        }
    }

    if !report.success() {
        bail!("{} step(s) failed", report.failed().count());
    }
    Ok(())
}
