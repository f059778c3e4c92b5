//! Read-only presentation model: status line, labelled boxes and preview frame

use crate::config::CaptureMode;
use crate::transport::ConnectionState;
use image::RgbImage;
use sightline_core::Detection;
use std::fmt;
use std::sync::Arc;

/// Pixel rectangle with a top-left origin.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayBox {
    pub label: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl OverlayBox {
    pub fn from_detection(detection: &Detection, screen_width: f32, screen_height: f32) -> Self {
        Self {
            label: format!(
                "{} {:.0}%",
                detection.class_name,
                (detection.confidence * 100.0).clamp(0.0, 100.0)
            ),
            x: detection.x * screen_width,
            y: detection.y * screen_height,
            width: detection.width * screen_width,
            height: detection.height * screen_height,
        }
    }
}

#[derive(Debug, Clone)]
pub struct OverlayView {
    state: ConnectionState,
    mode: CaptureMode,
    detections: Arc<Vec<Detection>>,
    preview: Option<Arc<RgbImage>>,
}

impl OverlayView {
    pub fn new(
        state: ConnectionState,
        mode: CaptureMode,
        detections: Arc<Vec<Detection>>,
        preview: Option<Arc<RgbImage>>,
    ) -> Self {
        Self {
            state,
            mode,
            detections,
            preview,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    /// Last frame sent from a device camera. Always `None` in rendered-view mode.
    pub fn preview(&self) -> Option<&RgbImage> {
        self.preview.as_deref()
    }

    /// e.g. `Mode: VR | Status: Connected | Detections: 2`
    pub fn status_line(&self) -> String {
        let mode = match self.mode {
            CaptureMode::DeviceCamera => "Camera",
            CaptureMode::RenderedView => "VR",
        };
        format!(
            "Mode: {} | Status: {} | Detections: {}",
            mode,
            self.state,
            self.detections.len()
        )
    }

    pub fn boxes(&self, screen_width: u32, screen_height: u32) -> Vec<OverlayBox> {
        let (w, h) = (screen_width as f32, screen_height as f32);
        self.detections
            .iter()
            .map(|d| OverlayBox::from_detection(d, w, h))
            .collect()
    }
}

impl fmt::Display for OverlayView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status_line())
    }
}
