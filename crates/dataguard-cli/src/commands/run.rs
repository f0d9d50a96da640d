//! Run command: keep the scheduler alive until ctrl-c or SIGTERM

use std::path::Path;

use anyhow::Context;

use super::open_engine;

pub async fn execute(config_path: &Path) -> anyhow::Result<()> {
    let engine = open_engine(config_path).await?;
    let shutdown = Shutdown::install()?;
    engine.start()?;
    println!("Backup scheduler running; press ctrl-c to stop");

    let signal = shutdown.recv().await?;
    tracing::info!(signal, "Shutdown requested");

    // A debounced trigger would fire after exit; snapshot directly instead.
    match engine.create_snapshot().await {
        Ok(id) => println!("Final snapshot {}", id),
        Err(err) => tracing::warn!(error = %err, "Final snapshot failed"),
    }
    engine.stop().await;
    Ok(())
}

/// Termination signals, registered before the scheduler starts
struct Shutdown {
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
}

impl Shutdown {
    fn install() -> anyhow::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: tokio::signal::unix::signal(
                tokio::signal::unix::SignalKind::terminate(),
            )
            .context("installing SIGTERM handler")?,
        })
    }

    #[cfg(unix)]
    async fn recv(mut self) -> anyhow::Result<&'static str> {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.context("waiting for ctrl-c")?;
                Ok("ctrl-c")
            }
            _ = self.terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    async fn recv(self) -> anyhow::Result<&'static str> {
        tokio::signal::ctrl_c()
            .await
            .context("waiting for ctrl-c")?;
        Ok("ctrl-c")
    }
}
