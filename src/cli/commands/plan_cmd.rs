//! cli::commands::plan_cmd
//!
//! `pf plan` - compile the configuration and show what would change.

use anyhow::Result;

use crate::cli::Context;
use crate::core::context::ExplainContext;
use crate::engine::planner;
use crate::lock::LockMode;
use crate::ui::output;

use super::Pipeline;

pub fn run(ctx: &Context, mode: Option<LockMode>, explain: bool) -> Result<()> {
    let verbosity = ctx.verbosity();
    let pipeline = Pipeline::load(ctx, mode)?;
    let (graph, warnings) = pipeline.compile(ctx)?;
    for warning in &warnings {
        output::warn(warning, verbosity);
    }

    let run_ctx = pipeline.run_context(ctx, true);
    let plan = planner::plan(&run_ctx, &graph)?;

    if explain {
        let explain_ctx = ExplainContext {
            verbose: ctx.debug,
        };
        for step in graph.steps() {
            let explanation = step.explain(&explain_ctx);
            output::print(format!("{}: {}", step.id(), explanation.summary()), verbosity);
            for detail in explanation.details() {
                output::print(format!("    {detail}"), verbosity);
            }
        }
    }

    output::print(plan.preview(), verbosity);
    output::print(plan.summary(), verbosity);
    Ok(())
}
