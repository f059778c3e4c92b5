//! Client pipeline against the reference server over loopback

use image::RgbImage;
use nalgebra::{Point3, Vector3};
use parking_lot::RwLock;
use sightline_core::Detection;
use sightline_eye::camera::{DeviceCameraSource, SyntheticCamera};
use sightline_eye::config::ClientConfig;
use sightline_eye::frame::FrameSource;
use sightline_eye::interpreter::{DetectionStore, ResponseInterpreter};
use sightline_eye::pipeline::CapturePipeline;
use sightline_eye::projection::{Projector, Viewpoint, Viewport};
use sightline_eye::render::RenderedViewSource;
use sightline_eye::scene::{Collider, Scene};
use sightline_eye::transport::websocket::WebSocketClient;
use sightline_eye::transport::{ConnectionState, Transport};
use sightline_server::{DetectionServer, Detector, ServerConfig, ServerError, StaticDetector};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;

struct FailingDetector;

impl Detector for FailingDetector {
    fn name(&self) -> &str {
        "failing"
    }

    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, ServerError> {
        Err(ServerError::Detector("model unavailable".to_string()))
    }
}

async fn spawn_server(detector: Arc<dyn Detector>) -> (SocketAddr, oneshot::Sender<()>) {
    let config = ServerConfig {
        bind: "127.0.0.1".to_string(),
        port: 0,
        ..ServerConfig::default()
    };
    let server = DetectionServer::bind(&config, detector).await.unwrap();
    let addr = server.local_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(server.serve_with_shutdown(async {
        let _ = stop_rx.await;
    }));
    (addr, stop_tx)
}

fn client_config(addr: SocketAddr, vr_mode: bool) -> ClientConfig {
    ClientConfig {
        server_ip: addr.ip().to_string(),
        server_port: addr.port(),
        vr_mode,
        capture_width: 64,
        capture_height: 48,
        device_width: 64,
        device_height: 48,
        send_interval: 0.02,
        ..ClientConfig::default()
    }
}

fn camera_pipeline(config: ClientConfig) -> CapturePipeline<WebSocketClient> {
    let source: Box<dyn FrameSource> = Box::new(DeviceCameraSource::open(
        vec![Box::new(SyntheticCamera::rear("loopback"))],
        &config,
    ));
    let transport = WebSocketClient::new(config.server_url());
    let interpreter = ResponseInterpreter::new(DetectionStore::new());
    CapturePipeline::new(config, source, transport, interpreter)
}

/// Tick in real time until `done` holds or five seconds pass.
async fn tick_until<F>(pipeline: &mut CapturePipeline<WebSocketClient>, done: F) -> bool
where
    F: Fn(&CapturePipeline<WebSocketClient>) -> bool,
{
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        pipeline.tick(Instant::now());
        if done(pipeline) {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    false
}

#[tokio::test]
async fn test_camera_frames_round_trip() {
    let fixed = StaticDetector::new(vec![Detection::new("person", 0.87, 0.25, 0.25, 0.5, 0.5)]);
    let (addr, _stop) = spawn_server(Arc::new(fixed)).await;

    let mut pipeline = camera_pipeline(client_config(addr, false));
    pipeline.start().await;
    assert_eq!(pipeline.transport().state(), ConnectionState::Connected);

    assert!(tick_until(&mut pipeline, |p| p.detections().len() == 1).await);
    let snapshot = pipeline.detections().snapshot();
    assert_eq!(snapshot[0].class_name, "person");
    assert!(snapshot[0].world_position.is_none());

    let overlay = pipeline.overlay();
    assert_eq!(overlay.status_line(), "Mode: Camera | Status: Connected | Detections: 1");
    assert_eq!(overlay.boxes(640, 480)[0].label, "person 87%");
    assert!(overlay.preview().is_some());

    pipeline.shutdown().await;
    assert_eq!(pipeline.transport().state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_error_replies_leave_detections_untouched() {
    let (addr, _stop) = spawn_server(Arc::new(FailingDetector)).await;

    let mut pipeline = camera_pipeline(client_config(addr, false));
    pipeline.start().await;
    let stats = pipeline.interpreter_stats();

    assert!(tick_until(&mut pipeline, |_| stats.rejected() >= 3).await);
    assert!(pipeline.detections().is_empty());
    assert_eq!(stats.applied(), 0);
    assert_eq!(stats.malformed(), 0);
    assert_eq!(pipeline.transport().state(), ConnectionState::Connected);

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_rendered_view_projects_into_scene() {
    let centered = StaticDetector::new(vec![
        Detection::new("target", 0.9, 0.45, 0.45, 0.1, 0.1),
        Detection::new("sky", 0.4, 0.0, 0.0, 0.05, 0.05),
    ]);
    let (addr, _stop) = spawn_server(Arc::new(centered)).await;
    let config = client_config(addr, true);

    let scene = Arc::new(
        Scene::new().with(Collider::sphere(Point3::new(0.0, 0.0, -6.0), 1.5, [200, 40, 40])),
    );
    let viewpoint = Arc::new(RwLock::new(Viewpoint::looking_at(
        Point3::origin(),
        Point3::new(0.0, 0.0, -1.0),
        60.0,
        Viewport::new(1280.0, 720.0),
    )));
    let source = RenderedViewSource::new(Arc::clone(&scene), &config).with_viewpoint(Arc::clone(&viewpoint));
    let interpreter = ResponseInterpreter::new(DetectionStore::new())
        .with_projector(Projector::new(Arc::clone(&viewpoint), scene));
    let transport = WebSocketClient::new(config.server_url());
    let mut pipeline = CapturePipeline::new(config, Box::new(source), transport, interpreter);

    pipeline.start().await;
    assert!(tick_until(&mut pipeline, |p| p.detections().len() == 2).await);

    let snapshot = pipeline.detections().snapshot();
    let target = snapshot[0].world_position.expect("target projected");
    assert!((target - Point3::new(0.0, 0.0, -4.5)).norm() < 1e-2);

    let sky = snapshot[1].world_position.expect("sky projected");
    assert!(((sky - Point3::origin()).norm() - 2.0).abs() < 1e-3);
    assert!(sky.coords.dot(&Vector3::new(0.0, 0.0, -1.0)) > 0.0);

    let overlay = pipeline.overlay();
    assert!(overlay.preview().is_none());
    assert!(overlay.status_line().starts_with("Mode: VR"));

    pipeline.shutdown().await;
}

#[tokio::test]
async fn test_unreachable_server_sends_nothing() {
    let unused = std::net::TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();

    let mut pipeline = camera_pipeline(client_config(unused, false));
    pipeline.start().await;
    assert_eq!(pipeline.transport().state(), ConnectionState::Disconnected);

    for _ in 0..10 {
        assert!(!pipeline.tick(Instant::now()).sent);
    }
    assert_eq!(pipeline.stats().frames_sent, 0);
    pipeline.shutdown().await;
}
