//! cli::commands::snapshot_cmd
//!
//! `pf snapshot` - list, restore, and prune pre-modification snapshots.

use anyhow::{bail, Result};

use crate::cli::args::SnapshotCommand;
use crate::cli::Context;
use crate::lifecycle::{SnapshotId, SnapshotStore};
use crate::ui::output;

use super::Pipeline;

pub fn run(ctx: &Context, command: SnapshotCommand) -> Result<()> {
    let verbosity = ctx.verbosity();
    let Some(state_paths) = Pipeline::state_paths(ctx) else {
        bail!("no state root available; pass --state-root");
    };
    let store = SnapshotStore::new(state_paths);

    match command {
        SnapshotCommand::List => {
            let manifests = store.list()?;
            if manifests.is_empty() {
                output::print("No snapshots", verbosity);
                return Ok(());
            }
            for manifest in &manifests {
                output::print(
                    format!(
                        "{}  {}  {} path(s)",
                        manifest.id,
                        manifest.taken_at.to_rfc3339(),
                        manifest.entries.len()
                    ),
                    verbosity,
                );
            }
        }
        SnapshotCommand::Restore { id } => {
            let id = SnapshotId::from_string(id);
            store.restore(&id)?;
            output::success(format!("Restored snapshot {id}"), verbosity);
        }
        SnapshotCommand::Prune { id, all } => {
            if all {
                let manifests = store.list()?;
                let count = manifests.len();
                for manifest in manifests {
                    store.prune(&SnapshotId::from_string(manifest.id))?;
                }
                output::success(format!("Pruned {count} snapshot(s)"), verbosity);
            } else if let Some(id) = id {
                store.prune(&SnapshotId::from_string(id))?;
                output::success("Pruned 1 snapshot", verbosity);
            } else {
                bail!("pass a snapshot id or --all");
            }
        }
    }
    Ok(())
}
