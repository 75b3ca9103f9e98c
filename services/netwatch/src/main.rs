//! Netwatch CLI
//!
//! Command-line entry point for the host liveness monitor.

use std::path::PathBuf;

use clap::Parser;
use netwatch::{load_config, Config, NetwatchBuilder};
use tracing::Level;

#[derive(Parser)]
#[command(name = "netwatch")]
#[command(about = "Host liveness monitoring with debounced alerts")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// API port (overrides config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();

    tracing::debug!(
        "Parsed command line arguments: config={:?}, port={:?}, log_level={:?}",
        args.config,
        args.port,
        args.log_level
    );

    let mut config = if let Some(config_path) = &args.config {
        tracing::debug!("Loading configuration from {:?}", config_path);
        load_config(config_path)?
    } else {
        tracing::debug!("Using default configuration");
        Config::default()
    };

    if let Some(port) = args.port {
        config.api.port = port;
    }

    tracing::info!("Starting netwatch service");
    tracing::debug!(
        "Targets: {}, history: {}, API: {}",
        config.targets.len(),
        if config.history.enabled { "on" } else { "off" },
        if config.api.enabled { "on" } else { "off" }
    );

    NetwatchBuilder::new(config).build().await?.start().await?;

    Ok(())
}
