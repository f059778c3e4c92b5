// WebSocket handler: one JPEG in, one JSON reply out

use crate::detector::Detector;
use crate::error::ServerError;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use sightline_core::{Detection, ServerResponse};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct DetectionState {
    pub detector: Arc<dyn Detector>,
    pub max_message_size: usize,
}

/// WebSocket upgrade handler
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<DetectionState>>) -> Response {
    ws.max_message_size(state.max_message_size)
        .max_frame_size(state.max_message_size)
        .on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: Arc<DetectionState>) {
    let connection_id = Uuid::new_v4();
    info!("Client connected: {}", connection_id);

    while let Some(msg) = socket.recv().await {
        let reply = match msg {
            Ok(Message::Binary(frame)) => process_frame(frame, Arc::clone(&state.detector)).await,
            Ok(Message::Text(_)) => {
                warn!("Text message from {}, expected an image frame", connection_id);
                ServerResponse::error("expected a binary image frame")
            }
            Ok(Message::Close(_)) => {
                debug!("Connection {} closed by client", connection_id);
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => continue,
            Err(e) => {
                warn!("WebSocket error from {}: {}", connection_id, e);
                break;
            }
        };

        let json = match reply.to_json() {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize reply for {}: {}", connection_id, e);
                continue;
            }
        };
        if let Err(e) = socket.send(Message::Text(json)).await {
            warn!("Failed to reply to {}: {}", connection_id, e);
            break;
        }
    }

    info!("Client disconnected: {}", connection_id);
}

/// Decode and detect off the async runtime, then wrap the outcome.
async fn process_frame(frame: Vec<u8>, detector: Arc<dyn Detector>) -> ServerResponse {
    let outcome = tokio::task::spawn_blocking(move || run_detection(&frame, detector.as_ref())).await;

    match outcome {
        Ok(Ok((detections, inference_time))) => {
            if !detections.is_empty() {
                info!("Detected {} objects in {:.3}s", detections.len(), inference_time);
            }
            ServerResponse::success(detections, inference_time)
        }
        Ok(Err(e)) => {
            warn!("Error processing frame: {}", e);
            ServerResponse::error(e.to_string())
        }
        Err(e) => {
            error!("Detection task failed: {}", e);
            ServerResponse::error("detection task failed")
        }
    }
}

/// Decode one frame and run the detector over it.
///
/// Returns the detections and the detector's run time in seconds.
pub fn run_detection(frame: &[u8], detector: &dyn Detector) -> Result<(Vec<Detection>, f64), ServerError> {
    if frame.is_empty() {
        return Err(ServerError::Decode("empty frame".to_string()));
    }
    let image = image::load_from_memory(frame)?.to_rgb8();

    let started = Instant::now();
    let detections = detector.detect(&image)?;
    Ok((detections, started.elapsed().as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::{LuminanceDetector, StaticDetector};
    use image::{codecs::jpeg::JpegEncoder, ColorType, Rgb, RgbImage};

    fn jpeg(image: &RgbImage) -> Vec<u8> {
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, 90)
            .encode(image.as_raw(), image.width(), image.height(), ColorType::Rgb8)
            .unwrap();
        out
    }

    #[test]
    fn test_run_detection_on_jpeg() {
        let fixed = StaticDetector::new(vec![Detection::new("person", 0.8, 0.1, 0.1, 0.5, 0.5)]);
        let frame = jpeg(&RgbImage::from_pixel(32, 32, Rgb([100, 100, 100])));
        let (detections, inference_time) = run_detection(&frame, &fixed).unwrap();
        assert_eq!(detections.len(), 1);
        assert!(inference_time >= 0.0);
    }

    #[test]
    fn test_run_detection_rejects_garbage() {
        let detector = LuminanceDetector::default();
        assert!(matches!(run_detection(&[], &detector), Err(ServerError::Decode(_))));
        assert!(matches!(
            run_detection(b"definitely not an image", &detector),
            Err(ServerError::Image(_))
        ));
    }

    #[tokio::test]
    async fn test_process_frame_error_reply() {
        let reply = process_frame(vec![1, 2, 3], Arc::new(LuminanceDetector::default())).await;
        assert_eq!(reply.status, "error");
        assert!(reply.detections.is_empty());
        assert!(reply.message.is_some());
    }
}
