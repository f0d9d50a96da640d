//! Migrate command

use std::path::Path;

use super::open_engine;

pub async fn execute(config_path: &Path) -> anyhow::Result<()> {
    let engine = open_engine(config_path).await?;
    if engine.migrate_mirror().await? {
        println!("Mirror updated.");
        Ok(())
    } else {
        anyhow::bail!("mirror not configured or unreachable; see log for details")
    }
}
