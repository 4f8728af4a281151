//! # Roomscan CLI
//!
//! Headless driver for the capture-to-publish pipeline.
//!
//! ## Usage
//!
//! ```bash
//! # Replay a recorded room and publish it
//! ROOMSCAN_TOKEN=... roomscan process --space room.json --name "Living room"
//!
//! # Same, with a location
//! roomscan process --space room.json --name "Office" --lat 52.52 --lon 13.405
//!
//! # Skip publishing and keep the files
//! roomscan process --space room.json --name "Office" --local-export ./scans
//!
//! # Show material groups of a model, optionally previewing the configured treatments
//! roomscan inspect --model ./scans/model.bin --apply-materials
//!
//! # Print an example roomscan.toml
//! roomscan example-config
//! ```

mod commands;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use roomscan_pipeline::PipelineConfig;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "roomscan")]
#[command(about = "Capture-to-publish pipeline for room scans")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to <config dir>/roomscan/roomscan.toml)
    #[arg(short, long, global = true, env = "ROOMSCAN_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a captured room through export, transform and publish
    Process(ProcessArgs),
    /// Summarize the material groups of a model file
    Inspect(InspectArgs),
    /// Print an example configuration file
    ExampleConfig,
}

#[derive(Args, Debug)]
pub struct ProcessArgs {
    /// Captured room as JSON
    #[arg(long)]
    pub space: PathBuf,

    /// Scan title
    #[arg(long)]
    pub name: String,

    /// Latitude of the scanned space
    #[arg(long, requires = "lon", allow_negative_numbers = true)]
    pub lat: Option<f64>,

    /// Longitude of the scanned space
    #[arg(long, requires = "lat", allow_negative_numbers = true)]
    pub lon: Option<f64>,

    /// Move the finished files into this directory instead of publishing
    #[arg(long)]
    pub local_export: Option<PathBuf>,

    /// Bearer token for the scan service
    #[arg(long, env = "ROOMSCAN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

#[derive(Args, Debug)]
pub struct InspectArgs {
    /// Model file to inspect
    #[arg(long)]
    pub model: PathBuf,

    /// Also apply the configured material plan to a temporary preview
    #[arg(long)]
    pub apply_materials: bool,
}

// ============================================================================
// Main
// ============================================================================

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<PipelineConfig> {
    let config = match path {
        Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
        None => match dirs::config_dir() {
            Some(dir) => PipelineConfig::load_or_default(&dir.join("roomscan").join("roomscan.toml")),
            None => PipelineConfig::default(),
        },
    };
    Ok(config.with_env_overrides())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug,hyper=info,reqwest=info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    match cli.command {
        Command::Process(args) => {
            let config = load_config(cli.config.as_ref())?;
            commands::process(&config, args).await
        }
        Command::Inspect(args) => {
            let config = load_config(cli.config.as_ref())?;
            commands::inspect(&config, args).await
        }
        Command::ExampleConfig => {
            print!("{}", roomscan_pipeline::EXAMPLE_CONFIG);
            Ok(())
        }
    }
}
