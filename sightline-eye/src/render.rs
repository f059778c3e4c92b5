//! Rendered-view frame source
//!
//! Ray traces the scene from the tracked viewpoint into an off-screen target
//! at the capture resolution. The target buffer is handed out behind an `Arc`
//! and rendered into again in place once every earlier frame has been dropped.

use crate::config::ClientConfig;
use crate::frame::{FrameSource, RawFrame};
use crate::projection::{SharedViewpoint, Viewport};
use crate::scene::{Raycast, Scene};
use image::{Rgb, RgbImage};
use nalgebra::{Point2, Vector3};
use std::sync::Arc;
use tracing::info;

/// Anything past this distance is drawn as background.
const RENDER_FAR_PLANE: f32 = 50.0;
const BACKGROUND: [u8; 3] = [24, 26, 32];

pub struct RenderedViewSource {
    viewpoint: Option<SharedViewpoint>,
    scene: Arc<Scene>,
    target: Option<Arc<RgbImage>>,
    width: u32,
    height: u32,
}

impl RenderedViewSource {
    pub fn new(scene: Arc<Scene>, config: &ClientConfig) -> Self {
        Self {
            viewpoint: None,
            scene,
            target: None,
            width: config.capture_width,
            height: config.capture_height,
        }
    }

    /// Attach the viewpoint to render from. Until then `capture` yields nothing.
    pub fn attach(&mut self, viewpoint: SharedViewpoint) {
        self.viewpoint = Some(viewpoint);
    }

    pub fn with_viewpoint(mut self, viewpoint: SharedViewpoint) -> Self {
        self.attach(viewpoint);
        self
    }

    /// Viewport matching the rendered frames. A projector fed detections from
    /// these frames needs a viewpoint with this viewport.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(self.width as f32, self.height as f32)
    }

    fn render_into(&self, target: &mut RgbImage) {
        let Some(viewpoint) = self.viewpoint.as_ref() else {
            return;
        };
        let viewpoint = viewpoint.read();
        let viewport = self.viewport();
        let light = Vector3::new(0.3, 1.0, 0.5).normalize();
        let colliders = self.scene.colliders();

        for (x, y, pixel) in target.enumerate_pixels_mut() {
            // Image rows go top-down, screen space goes bottom-up.
            let screen = Point2::new(x as f32 + 0.5, self.height as f32 - (y as f32 + 0.5));
            let ray = viewpoint.ray_through(screen, viewport);
            *pixel = match self.scene.raycast(&ray, RENDER_FAR_PLANE) {
                Some(hit) => {
                    let base = colliders[hit.collider].color;
                    let diffuse = hit.normal.dot(&light).max(0.0);
                    let fog = 1.0 - (hit.distance / RENDER_FAR_PLANE).min(1.0) * 0.6;
                    let shade = (0.25 + 0.75 * diffuse) * fog;
                    Rgb(base.map(|c| (c as f32 * shade).round().clamp(0.0, 255.0) as u8))
                }
                None => Rgb(BACKGROUND),
            };
        }
    }
}

impl FrameSource for RenderedViewSource {
    fn capture(&mut self) -> Option<RawFrame> {
        self.viewpoint.as_ref()?;
        // A frame still held downstream keeps its pixels; render into a fresh buffer instead.
        let mut target = match self.target.take() {
            Some(shared) if Arc::strong_count(&shared) == 1 => shared,
            _ => Arc::new(RgbImage::new(self.width, self.height)),
        };
        if let Some(buffer) = Arc::get_mut(&mut target) {
            self.render_into(buffer);
        }
        self.target = Some(Arc::clone(&target));
        Some(RawFrame::from_shared(target))
    }

    fn release(&mut self) {
        if self.target.take().is_some() {
            info!("Render target released");
        }
    }

    fn describe(&self) -> String {
        format!(
            "rendered view {}x{} ({} colliders)",
            self.width,
            self.height,
            self.scene.colliders().len()
        )
    }
}
