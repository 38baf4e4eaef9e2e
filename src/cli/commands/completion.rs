//! cli::commands::completion
//!
//! `pf completion` - generate shell completions.

use anyhow::Result;
use clap::CommandFactory;

use crate::cli::args::{Cli, Shell};

pub fn run(shell: Shell) -> Result<()> {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, "pf", &mut std::io::stdout());
    Ok(())
}
