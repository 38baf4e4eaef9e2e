//! cli::commands::lock_cmd
//!
//! `pf lock` - inspect the lockfile.

use anyhow::Result;

use crate::cli::args::LockCommand;
use crate::cli::Context;
use crate::ui::output;

use super::Pipeline;

pub fn run(ctx: &Context, command: LockCommand) -> Result<()> {
    match command {
        LockCommand::Show => show(ctx),
    }
}

fn show(ctx: &Context) -> Result<()> {
    let verbosity = ctx.verbosity();
    let pipeline = Pipeline::load(ctx, None)?;

    let Some(lockfile) = &pipeline.lockfile else {
        output::print(
            format!("No lockfile at {}", pipeline.lockfile_path.display()),
            verbosity,
        );
        return Ok(());
    };

    let machine = lockfile.machine();
    output::print(
        format!(
            "mode={} machine={}/{} host={}",
            lockfile.mode(),
            machine.os,
            machine.arch,
            machine.host
        ),
        verbosity,
    );
    for package in lockfile.packages() {
        output::print(
            format!(
                "{}:{} {} ({})",
                package.provider, package.name, package.version, package.integrity
            ),
            verbosity,
        );
    }
    output::print(format!("{} package(s)", lockfile.len()), verbosity);
    Ok(())
}
