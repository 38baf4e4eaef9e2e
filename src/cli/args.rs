//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--config <path>`: Configuration file (default `preflight.yaml`)
//! - `--state-root <path>`: State directory (default `~/.preflight`)
//! - `--target <name>`: Machine target to compile
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output; implies `--no-interactive`
//! - `--no-interactive`: Disable prompts

use std::io::IsTerminal;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
pub use clap_complete::Shell;

use crate::lock::LockMode;

/// Preflight - declarative developer environment manager
#[derive(Parser, Debug)]
#[command(name = "pf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Configuration file to compile
    #[arg(long, global = true, default_value = "preflight.yaml")]
    pub config: PathBuf,

    /// State directory (drift index, snapshots, lock)
    #[arg(long, global = true, value_name = "DIR")]
    pub state_root: Option<PathBuf>,

    /// Machine target to compile
    #[arg(long, global = true, default_value = "default")]
    pub target: String,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output; implies --no-interactive
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable interactive prompts
    #[arg(long, global = true)]
    pub no_interactive: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }

    /// Determine if interactive mode is enabled: prompts are shown
    /// unless disabled by flags and only when stdin is a terminal.
    pub fn interactive(&self) -> bool {
        if self.no_interactive || self.quiet {
            false
        } else {
            std::io::stdin().is_terminal()
        }
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compile the configuration and show what would change
    Plan {
        /// Reproducibility mode
        #[arg(long, value_parser = parse_mode)]
        mode: Option<LockMode>,

        /// Describe what each step manages
        #[arg(long)]
        explain: bool,
    },

    /// Apply pending changes to this machine
    Apply {
        /// Show what would be done without making changes
        #[arg(long)]
        dry_run: bool,

        /// Roll back already-applied steps if any step fails
        #[arg(long)]
        rollback: bool,

        /// Confirm bootstrap steps without prompting
        #[arg(short = 'y', long)]
        yes: bool,

        /// Reproducibility mode
        #[arg(long, value_parser = parse_mode)]
        mode: Option<LockMode>,
    },

    /// Check tracked files for out-of-band changes
    Drift {
        /// Emit advisory config patches for drifted files
        #[arg(long)]
        patch: bool,

        /// Restrict the check to these paths
        paths: Vec<PathBuf>,
    },

    /// Inspect the lockfile
    Lock {
        #[command(subcommand)]
        command: LockCommand,
    },

    /// Manage pre-modification snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },

    /// Generate shell completions
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Lockfile subcommands.
#[derive(Subcommand, Debug)]
pub enum LockCommand {
    /// Print the lockfile entries
    Show,
}

/// Snapshot subcommands.
#[derive(Subcommand, Debug)]
pub enum SnapshotCommand {
    /// List stored snapshots
    List,

    /// Restore a snapshot by id
    Restore {
        /// Snapshot id (from `pf snapshot list`)
        id: String,
    },

    /// Delete snapshots
    Prune {
        /// Snapshot id to delete
        id: Option<String>,

        /// Delete every stored snapshot
        #[arg(long, conflicts_with = "id")]
        all: bool,
    },
}

fn parse_mode(value: &str) -> Result<LockMode, String> {
    value.parse()
}
