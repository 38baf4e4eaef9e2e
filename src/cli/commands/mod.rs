//! cli::commands
//!
//! Command handlers and the shared pipeline setup they build on.

mod apply;
mod completion;
mod drift_cmd;
mod lock_cmd;
mod plan_cmd;
mod snapshot_cmd;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context as _, Result};

use crate::compile::{CompileContext, Compiler, ProviderRegistry};
use crate::core::config::RawConfig;
use crate::core::context::RunContext;
use crate::core::graph::StepGraph;
use crate::core::paths::StatePaths;
use crate::lifecycle::Lifecycle;
use crate::lock::{FileLockRepo, LockMode, LockRepo, LockRepoError, LockResolver, Lockfile};

use super::args::Command;
use super::Context;

/// Dispatch a parsed command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Plan { mode, explain } => plan_cmd::run(ctx, mode, explain),
        Command::Apply {
            dry_run,
            rollback,
            yes,
            mode,
        } => apply::run(ctx, dry_run, rollback, yes, mode),
        Command::Drift { patch, paths } => drift_cmd::run(ctx, patch, &paths),
        Command::Lock { command } => lock_cmd::run(ctx, command),
        Command::Snapshot { command } => snapshot_cmd::run(ctx, command),
        Command::Completion { shell } => completion::run(shell),
    }
}

/// Shared setup for pipeline commands: loaded config, resolved mode,
/// and the lockfile (when present).
pub(crate) struct Pipeline {
    pub config: RawConfig,
    pub config_root: PathBuf,
    pub mode: LockMode,
    pub lockfile_path: PathBuf,
    pub lockfile: Option<Lockfile>,
}

impl Pipeline {
    /// Load configuration and lockfile, resolving the effective mode:
    /// explicit flag first, then the loaded lockfile's recorded mode,
    /// then Intent.
    pub fn load(ctx: &Context, mode_flag: Option<LockMode>) -> Result<Self> {
        let config_path = &ctx.config_path;
        let config = RawConfig::load(config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
        let config_root = config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));

        let lockfile_path = StatePaths::lockfile_path_for(config_path);
        let lockfile = match FileLockRepo::new().load(&lockfile_path) {
            Ok(lockfile) => Some(lockfile),
            Err(LockRepoError::NotFound(_)) => None,
            Err(err) => return Err(err.into()),
        };

        let mode = mode_flag
            .or_else(|| lockfile.as_ref().map(|l| l.mode()))
            .unwrap_or_default();
        if mode.requires_lockfile() && lockfile.is_none() {
            bail!(
                "lockfile {} not found (mode={mode}); run `pf apply --mode intent` first",
                lockfile_path.display()
            );
        }

        Ok(Self {
            config,
            config_root,
            mode,
            lockfile_path,
            lockfile,
        })
    }

    /// Compile the configuration into a step graph, returning compile
    /// warnings for display.
    pub fn compile(&self, ctx: &Context) -> Result<(StepGraph, Vec<String>)> {
        let resolver = LockResolver::new(self.mode, self.lockfile.clone());
        let home = dirs::home_dir().unwrap_or_else(|| self.config_root.clone());
        let compile_ctx = CompileContext::new(&self.config, &resolver, &self.config_root, home)
            .with_target(ctx.target.clone());
        let compilation = Compiler::new(ProviderRegistry::with_builtins())
            .compile(&compile_ctx)
            .context("compiling configuration")?;
        Ok((compilation.graph, compilation.warnings))
    }

    /// The state paths for this invocation, when a root is known.
    pub fn state_paths(ctx: &Context) -> Option<StatePaths> {
        ctx.state_root
            .clone()
            .map(StatePaths::new)
            .or_else(StatePaths::for_default_root)
    }

    /// Build the run context for planning and execution.
    pub fn run_context(&self, ctx: &Context, dry_run: bool) -> RunContext {
        let mut run_ctx = RunContext::for_current_user(&self.config_root)
            .with_debug(ctx.debug)
            .with_dry_run(dry_run);
        if let Some(paths) = Self::state_paths(ctx) {
            run_ctx = run_ctx.with_lifecycle(Arc::new(Lifecycle::new(paths)));
        }
        run_ctx
    }
}
