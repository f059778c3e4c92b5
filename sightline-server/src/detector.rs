//! Pluggable detectors run on every decoded frame

use crate::config::{DetectorKind, ServerConfig};
use crate::error::ServerError;
use image::RgbImage;
use sightline_core::Detection;
use std::sync::Arc;

/// Object detector over one RGB frame.
///
/// Boxes are normalized to [0, 1] with a top-left origin.
pub trait Detector: Send + Sync {
    fn name(&self) -> &str;

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, ServerError>;
}

/// Build the detector named by the configuration.
pub fn from_config(config: &ServerConfig) -> Arc<dyn Detector> {
    match config.detector {
        DetectorKind::Luminance => Arc::new(LuminanceDetector::new(config.luminance_threshold)),
        DetectorKind::None => Arc::new(NullDetector),
    }
}

/// Reports the bounding box of all bright pixels as one `bright_region`.
#[derive(Debug, Clone)]
pub struct LuminanceDetector {
    threshold: u8,
    /// Minimum share of bright pixels before anything is reported.
    min_fraction: f32,
}

pub const BRIGHT_REGION: &str = "bright_region";

impl LuminanceDetector {
    pub fn new(threshold: u8) -> Self {
        Self {
            threshold,
            min_fraction: 0.001,
        }
    }

    pub fn with_min_fraction(mut self, min_fraction: f32) -> Self {
        self.min_fraction = min_fraction.clamp(0.0, 1.0);
        self
    }
}

impl Default for LuminanceDetector {
    fn default() -> Self {
        Self::new(200)
    }
}

fn luma(pixel: &image::Rgb<u8>) -> u8 {
    let [r, g, b] = pixel.0;
    ((299 * r as u32 + 587 * g as u32 + 114 * b as u32) / 1000) as u8
}

impl Detector for LuminanceDetector {
    fn name(&self) -> &str {
        "luminance"
    }

    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>, ServerError> {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(ServerError::Detector("empty image".to_string()));
        }

        let (mut min_x, mut min_y, mut max_x, mut max_y) = (u32::MAX, u32::MAX, 0u32, 0u32);
        let mut bright = 0u64;
        for (x, y, pixel) in image.enumerate_pixels() {
            if luma(pixel) >= self.threshold {
                bright += 1;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }

        let total = width as u64 * height as u64;
        if bright == 0 || (bright as f32 / total as f32) < self.min_fraction {
            return Ok(Vec::new());
        }

        let box_area = (max_x - min_x + 1) as u64 * (max_y - min_y + 1) as u64;
        let confidence = bright as f32 / box_area as f32;
        let (w, h) = (width as f32, height as f32);
        Ok(vec![Detection::from_corners(
            BRIGHT_REGION,
            confidence,
            min_x as f32 / w,
            min_y as f32 / h,
            (max_x + 1) as f32 / w,
            (max_y + 1) as f32 / h,
        )])
    }
}

/// Never detects anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullDetector;

impl Detector for NullDetector {
    fn name(&self) -> &str {
        "none"
    }

    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, ServerError> {
        Ok(Vec::new())
    }
}

/// Returns the same detections for every frame.
#[derive(Debug, Clone, Default)]
pub struct StaticDetector {
    detections: Vec<Detection>,
}

impl StaticDetector {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }
}

impl Detector for StaticDetector {
    fn name(&self) -> &str {
        "static"
    }

    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>, ServerError> {
        Ok(self.detections.clone())
    }
}
