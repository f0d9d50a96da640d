//! List command

use std::path::Path;

use clap::Args;

use super::open_engine;

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Print one JSON object per snapshot instead of a table
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(config_path: &Path, args: ListArgs) -> anyhow::Result<()> {
    let engine = open_engine(config_path).await?;
    let snapshots = engine.list_snapshots();

    if args.json {
        for summary in &snapshots {
            println!("{}", serde_json::to_string(summary)?);
        }
        return Ok(());
    }

    if snapshots.is_empty() {
        println!("No snapshots retained.");
        return Ok(());
    }
    println!("{:<25} {:<30} {:>10}", "ID", "CREATED", "BYTES");
    for summary in &snapshots {
        println!(
            "{:<25} {:<30} {:>10}",
            summary.id.as_str(),
            summary.created_at.to_rfc3339(),
            summary.size_bytes
        );
    }
    Ok(())
}
