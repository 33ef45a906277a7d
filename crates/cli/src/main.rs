//! `gamecenter` - command-line front end for the game library core.
//!
//! ```bash
//! gamecenter paths add "D:\SteamLibrary" --launcher steam
//! gamecenter scan --wait-enrichment
//! gamecenter launch 1000
//! ```

mod commands;
mod picker;

use std::{
    fs::{self, OpenOptions},
    sync::Mutex,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gamecenter_core::config::{self, AppConfig};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Scan, enrich, and launch locally installed games
#[derive(Parser)]
#[command(name = "gamecenter")]
#[command(about = "Scan, enrich, and launch locally installed games")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan registered folders and list the games found
    Scan(commands::ScanArgs),

    /// Manage the folders that are scanned
    Paths {
        #[command(subcommand)]
        action: commands::PathsAction,
    },

    /// Fetch fresh store metadata for an application id
    Refresh {
        /// Steam application id
        app_id: u32,
    },

    /// Launch a game from the last scan
    Launch {
        /// Game id as printed by `scan`
        game_id: String,
    },

    /// Print the metadata cache directory
    CacheDir,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    config::ensure_default_config()?;
    let config = AppConfig::load()?;
    init_logging(&config)?;

    match cli.command {
        Commands::Scan(args) => commands::scan(&config, args).await,
        Commands::Paths { action } => commands::paths(&config, action),
        Commands::Refresh { app_id } => commands::refresh(&config, app_id).await,
        Commands::Launch { game_id } => commands::launch(&config, &game_id).await,
        Commands::CacheDir => {
            commands::cache_dir(&config);
            Ok(())
        }
    }
}

fn init_logging(config: &AppConfig) -> Result<()> {
    let log_dir = config.log_dir();
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create {}", log_dir.display()))?;
    let log_path = log_dir.join("gamecenter.log");
    let log_file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .with_context(|| format!("failed to open {}", log_path.display()))?;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .compact()
        .with_writer(std::io::stdout);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_ansi(false)
        .compact()
        .with_writer(Mutex::new(log_file));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}
