// sightline-server - reference detection server

use clap::Parser;
use sightline_server::{detector, DetectionServer, DetectorKind, ServerConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sightline-server")]
#[command(about = "Reference WebSocket detection server for sightline clients", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Address to bind
    #[arg(long)]
    bind: Option<String>,

    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Largest accepted message in bytes
    #[arg(long)]
    max_message_size: Option<usize>,

    /// Detector to run on each frame
    #[arg(long, value_enum)]
    detector: Option<DetectorKind>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.bind = bind;
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(size) = cli.max_message_size {
        config.max_message_size = size;
    }
    if let Some(kind) = cli.detector {
        config.detector = kind;
    }

    let server = DetectionServer::bind(&config, detector::from_config(&config)).await?;
    info!("Max message size: {} bytes", config.max_message_size);

    server
        .serve_with_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await?;
    Ok(())
}
