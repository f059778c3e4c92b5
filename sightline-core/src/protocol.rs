//! Detection server message format
//!
//! Outbound frames carry no envelope: the payload is the raw JPEG. Inbound
//! messages are UTF-8 JSON objects shaped like [`ServerResponse`].

use crate::error::{Error, Result};
use nalgebra::Point3;
use serde::{Deserialize, Serialize};

/// Status literal that marks a response as usable.
pub const STATUS_SUCCESS: &str = "success";
/// Status literal the server uses when a frame could not be processed.
pub const STATUS_ERROR: &str = "error";

/// A resolved position in scene space.
pub type WorldPoint = Point3<f32>;

/// One recognized object in a single frame.
///
/// Box coordinates are normalized to the frame: `(x, y)` is the top-left
/// corner with y growing downward, and `width`/`height` are fractions of the
/// frame size.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "className")]
    pub class_name: String,
    pub confidence: f32,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Filled in by the client in rendered-view mode only.
    #[serde(skip)]
    pub world_position: Option<WorldPoint>,
}

impl Detection {
    pub fn new(class_name: impl Into<String>, confidence: f32, x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
            x,
            y,
            width,
            height,
            world_position: None,
        }
    }

    /// Build from normalized corner coordinates `(x1, y1)`-`(x2, y2)`.
    pub fn from_corners(class_name: impl Into<String>, confidence: f32, x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        let (left, right) = if x1 <= x2 { (x1, x2) } else { (x2, x1) };
        let (top, bottom) = if y1 <= y2 { (y1, y2) } else { (y2, y1) };
        Self::new(class_name, confidence, left, top, right - left, bottom - top)
    }

    /// Normalized center of the box, y still growing downward.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// True when every box field and the confidence sit inside `[0, 1]`.
    pub fn is_normalized(&self) -> bool {
        let unit = |v: f32| (0.0..=1.0).contains(&v);
        unit(self.confidence)
            && unit(self.x)
            && unit(self.y)
            && unit(self.width)
            && unit(self.height)
            && self.x + self.width <= 1.0 + f32::EPSILON
            && self.y + self.height <= 1.0 + f32::EPSILON
    }
}

/// One reply from the detection server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerResponse {
    #[serde(default)]
    pub detections: Vec<Detection>,
    /// Seconds spent on the server, informational only.
    #[serde(default)]
    pub inference_time: f64,
    #[serde(default)]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ServerResponse {
    pub fn success(detections: Vec<Detection>, inference_time: f64) -> Self {
        Self {
            detections,
            inference_time,
            status: STATUS_SUCCESS.to_string(),
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            detections: Vec::new(),
            inference_time: 0.0,
            status: STATUS_ERROR.to_string(),
            message: Some(message.into()),
        }
    }

    /// Only the exact literal `"success"` is accepted.
    pub fn is_success(&self) -> bool {
        self.status == STATUS_SUCCESS
    }

    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Protocol(format!("response is not valid UTF-8: {}", e)))?;
        Self::from_json(text)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}
