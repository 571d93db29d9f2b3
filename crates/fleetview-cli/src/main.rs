//! Fleetview CLI - Recording URL inspection and download
//!
//! Features:
//! - Source URL inspection (structured or pattern extraction)
//! - Backend URL resolution per storage location
//! - Manual download links
//! - Recording download

use clap::{Parser, Subcommand};
use fleetview_core::types::StorageLocation;
use fleetview_core::PlayerConfig;
use std::path::PathBuf;

mod commands;
mod output;

/// Fleetview CLI - Recording playback toolkit
#[derive(Parser)]
#[command(name = "fleetview-cli")]
#[command(version)]
#[command(about = "Inspect, resolve and download fleet recordings", long_about = None)]
struct Cli {
    /// Player configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Output format (text, json)
    #[arg(short, long, default_value = "text")]
    format: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the fields recovered from a player URL
    Inspect {
        /// Player URL
        url: String,
    },

    /// Build the backend URL for a recording
    Resolve {
        /// Player URL
        url: String,

        /// Storage location (device, storage, download); preferred one if omitted
        #[arg(short, long)]
        location: Option<StorageLocation>,
    },

    /// Show the manual download links of a recording
    Links {
        /// Player URL
        url: String,
    },

    /// Download a recording
    Fetch {
        /// Player URL
        url: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,

        /// Storage location (device, storage, download); preferred one if omitted
        #[arg(short, long)]
        location: Option<StorageLocation>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(level)
        .with_writer(std::io::stderr)
        .init();
    fleetview_core::init();

    let config = match &cli.config {
        Some(path) => PlayerConfig::from_file(path)?,
        None => PlayerConfig::default(),
    };
    config.validate()?;

    match cli.command {
        Commands::Inspect { url } => {
            commands::inspect(&config, &url, &cli.format)?;
        }
        Commands::Resolve { url, location } => {
            commands::resolve(&config, &url, location, &cli.format)?;
        }
        Commands::Links { url } => {
            commands::links(&config, &url, &cli.format)?;
        }
        Commands::Fetch { url, output, location } => {
            commands::fetch(&config, &url, location, &output).await?;
        }
    }

    Ok(())
}
