//! Snapshot command

use std::path::Path;

use super::open_engine;

pub async fn execute(config_path: &Path) -> anyhow::Result<()> {
    let engine = open_engine(config_path).await?;
    let id = engine.create_snapshot().await?;
    println!("{}", id);
    Ok(())
}
