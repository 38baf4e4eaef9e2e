//! cli::commands::drift_cmd
//!
//! `pf drift` - compare tracked files against their recorded baselines.

use std::path::PathBuf;

use anyhow::{bail, Result};

use crate::cli::Context;
use crate::lifecycle::{DriftKind, DriftStore, PatchGenerator};
use crate::ui::output;

use super::Pipeline;

pub fn run(ctx: &Context, patch: bool, paths: &[PathBuf]) -> Result<()> {
    let verbosity = ctx.verbosity();
    let Some(state_paths) = Pipeline::state_paths(ctx) else {
        bail!("no state root available; pass --state-root");
    };
    let store = DriftStore::new(&state_paths);

    let drifts = if paths.is_empty() {
        store.check_all()?
    } else {
        store.check_paths(paths)?
    };

    if drifts.is_empty() {
        output::print("No tracked files", verbosity);
        return Ok(());
    }

    let mut drifted = 0usize;
    for drift in &drifts {
        let label = match drift.kind {
            DriftKind::None => "clean",
            DriftKind::Manual => "modified",
            DriftKind::Missing => "missing",
            DriftKind::Permission => "unreadable",
        };
        if drift.is_drifted() {
            drifted += 1;
            output::print(
                format!(
                    "{label:>10}  {} (layer {})",
                    drift.path.display(),
                    drift.source_layer
                ),
                verbosity,
            );
        } else {
            output::debug(format!("clean {}", drift.path.display()), verbosity);
        }
    }
    output::print(
        format!("{drifted} of {} tracked files drifted", drifts.len()),
        verbosity,
    );

    if patch && drifted > 0 {
        let pipeline = Pipeline::load(ctx, None)?;
        let generator = PatchGenerator::new(&pipeline.config_root);
        for patch in generator.generate(&drifts) {
            output::print(
                format!(
                    "{:?} {} in {} ({})",
                    patch.op,
                    patch.yaml_path,
                    patch.layer_path.display(),
                    patch.provenance
                ),
                verbosity,
            );
        }
    }

    Ok(())
}
