// sightline - stream frames to a detection server and follow its results

use anyhow::Context;
use clap::Parser;
use nalgebra::Point3;
use parking_lot::RwLock;
use sightline_eye::camera::{CameraDevice, DeviceCameraSource, SyntheticCamera};
use sightline_eye::config::{CaptureMode, ClientConfig};
use sightline_eye::frame::FrameSource;
use sightline_eye::interpreter::{DetectionStore, ResponseInterpreter};
use sightline_eye::pipeline::CapturePipeline;
use sightline_eye::projection::{Projector, Viewpoint};
use sightline_eye::render::RenderedViewSource;
use sightline_eye::scene::Scene;
use sightline_eye::transport::websocket::WebSocketClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sightline")]
#[command(about = "Stream camera or rendered frames to a detection server", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, or JSON by extension)
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Detection server address
    #[arg(long)]
    server_ip: Option<String>,

    /// Detection server port
    #[arg(long)]
    server_port: Option<u16>,

    /// Stream a rendered view instead of a camera
    #[arg(long)]
    vr: bool,

    /// Use the built-in test pattern even when a camera backend is compiled in
    #[arg(long)]
    synthetic: bool,

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

    let config = load_config(&cli)?;
    info!("Streaming to {} in {:?} mode", config.server_url(), config.capture_mode());

    let store = DetectionStore::new();
    let mut interpreter = ResponseInterpreter::new(store.clone());

    let source: Box<dyn FrameSource> = match config.capture_mode() {
        CaptureMode::DeviceCamera => Box::new(DeviceCameraSource::open(camera_devices(cli.synthetic), &config)),
        CaptureMode::RenderedView => {
            let scene = Arc::new(Scene::demo_room());
            let source = RenderedViewSource::new(scene.clone(), &config);
            // Detections come back normalized to the rendered frame, so project over its viewport.
            let viewpoint = Arc::new(RwLock::new(Viewpoint::looking_at(
                Point3::new(0.0, 1.6, 0.0),
                Point3::new(0.0, 1.0, -5.0),
                60.0,
                source.viewport(),
            )));
            interpreter = interpreter.with_projector(Projector::new(Arc::clone(&viewpoint), scene));
            Box::new(source.with_viewpoint(viewpoint))
        }
    };

    let transport = WebSocketClient::new(config.server_url());
    let mut pipeline = CapturePipeline::new(config, source, transport, interpreter);

    let state = pipeline.state_watch();
    let reporter = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        let mut last_line = String::new();
        loop {
            ticker.tick().await;
            let detections = store.snapshot();
            let line = format!("Status: {} | Detections: {}", state.get(), detections.len());
            if line != last_line {
                info!("{}", line);
                for detection in detections.iter() {
                    match detection.world_position {
                        Some(p) => info!(
                            "  {} {:.0}% at ({:.2}, {:.2}, {:.2})",
                            detection.class_name,
                            detection.confidence * 100.0,
                            p.x,
                            p.y,
                            p.z
                        ),
                        None => info!("  {} {:.0}%", detection.class_name, detection.confidence * 100.0),
                    }
                }
                last_line = line;
            }
        }
    });

    pipeline
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for Ctrl-C: {}", e);
            }
        })
        .await;

    reporter.abort();
    info!("{}", pipeline.overlay().status_line());
    Ok(())
}

fn load_config(cli: &Cli) -> anyhow::Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path).with_context(|| format!("loading {}", path.display()))?,
        None => ClientConfig::default(),
    };
    config.apply_env().context("reading SIGHTLINE_* environment")?;

    if let Some(ip) = &cli.server_ip {
        config.server_ip = ip.clone();
    }
    if let Some(port) = cli.server_port {
        config.server_port = port;
    }
    if cli.vr {
        config.vr_mode = true;
    }

    config.validate().map_err(anyhow::Error::msg)?;
    Ok(config)
}

#[cfg(feature = "opencv")]
fn camera_devices(synthetic: bool) -> Vec<Box<dyn CameraDevice>> {
    if synthetic {
        return vec![Box::new(SyntheticCamera::rear("synthetic"))];
    }
    vec![Box::new(sightline_eye::camera::OpenCvCamera::new(0))]
}

#[cfg(not(feature = "opencv"))]
fn camera_devices(_synthetic: bool) -> Vec<Box<dyn CameraDevice>> {
    vec![Box::new(SyntheticCamera::rear("synthetic"))]
}
