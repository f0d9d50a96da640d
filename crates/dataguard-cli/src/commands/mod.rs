pub mod list;
pub mod migrate;
pub mod restore;
pub mod run;
pub mod snapshot;

use std::path::Path;

use anyhow::Context;
use dataguard_core::EngineConfig;
use dataguard_engine::Engine;

/// Load configuration and open the on-disk engine
pub async fn open_engine(config_path: &Path) -> anyhow::Result<Engine> {
    let config = EngineConfig::load(config_path)
        .with_context(|| format!("loading {}", config_path.display()))?;
    let engine = Engine::open(config)
        .await
        .context("opening snapshot store")?;
    Ok(engine)
}
