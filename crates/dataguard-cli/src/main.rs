//! DataGuard CLI
//!
//! Command-line interface for the versioned-backup engine

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use dataguard_core::logging_facility::{self, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "dataguard")]
#[command(about = "DataGuard - Versioned backups for application datasets", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true, default_value = "dataguard.toml")]
    config: PathBuf,

    /// Log format: `dev` (human-readable) or `json`
    #[arg(long, global = true, default_value = "dev", env = "DATAGUARD_LOG_FORMAT")]
    log_format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Take a snapshot of every protected dataset now
    Snapshot,
    /// List retained snapshots, newest first
    List(commands::list::ListArgs),
    /// Restore protected datasets from a snapshot
    Restore(commands::restore::RestoreArgs),
    /// Run the backup scheduler until interrupted
    Run,
    /// Push current protected datasets to the remote mirror
    Migrate,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    logging_facility::init(Profile::from_name(&cli.log_format));

    let result = match cli.command {
        Commands::Snapshot => commands::snapshot::execute(&cli.config).await,
        Commands::List(args) => commands::list::execute(&cli.config, args).await,
        Commands::Restore(args) => commands::restore::execute(&cli.config, args).await,
        Commands::Run => commands::run::execute(&cli.config).await,
        Commands::Migrate => commands::migrate::execute(&cli.config).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
