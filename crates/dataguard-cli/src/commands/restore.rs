//! Restore command

use std::path::Path;

use anyhow::Context;
use clap::Args;
use dataguard_core::SnapshotId;

use super::open_engine;

#[derive(Debug, Args)]
pub struct RestoreArgs {
    /// Snapshot id as printed by `list`
    pub id: String,

    /// Take a snapshot of the current state before restoring
    #[arg(long)]
    pub backup_first: bool,
}

pub async fn execute(config_path: &Path, args: RestoreArgs) -> anyhow::Result<()> {
    let id: SnapshotId = args
        .id
        .parse()
        .with_context(|| format!("invalid snapshot id '{}'", args.id))?;
    let engine = open_engine(config_path).await?;

    if args.backup_first {
        let safety = engine.restore_with_backup(&id).await?;
        println!("Saved current state as {}", safety);
    } else {
        engine.restore(&id).await?;
    }
    println!("Restored {}", id);
    Ok(())
}
