//! Projection of 2-D detections into the 3-D scene (rendered-view mode)
//!
//! Screen space has its origin at the bottom-left with y growing upward,
//! while detection boxes have y growing downward, so the center's y is
//! flipped before the ray is cast.

use crate::scene::{Ray, Raycast};
use nalgebra::{Point2, Point3, UnitQuaternion, Vector3};
use parking_lot::RwLock;
use sightline_core::{Detection, WorldPoint};
use std::sync::Arc;

/// Rays stop after this many scene units.
pub const RAYCAST_MAX_DISTANCE: f32 = 10.0;
/// Distance along the ray used when nothing is hit.
pub const FALLBACK_DISTANCE: f32 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }
}

/// Pinhole camera looking down its local -Z axis with +Y up.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewpoint {
    pub position: Point3<f32>,
    pub orientation: UnitQuaternion<f32>,
    /// Vertical field of view in degrees.
    pub vertical_fov: f32,
    /// Current display viewport, used when projecting detections.
    pub viewport: Viewport,
}

impl Viewpoint {
    pub fn new(position: Point3<f32>, orientation: UnitQuaternion<f32>, vertical_fov: f32, viewport: Viewport) -> Self {
        Self {
            position,
            orientation,
            vertical_fov,
            viewport,
        }
    }

    /// Viewpoint at `position` facing `target`, with world +Y as up.
    pub fn looking_at(position: Point3<f32>, target: Point3<f32>, vertical_fov: f32, viewport: Viewport) -> Self {
        // face_towards maps local +Z onto its argument, so hand it the backward vector.
        let orientation = UnitQuaternion::face_towards(&(position - target), &Vector3::y());
        Self::new(position, orientation, vertical_fov, viewport)
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.orientation * -Vector3::z()
    }

    /// Ray from the viewpoint origin through `point`, given in pixels of `viewport`.
    pub fn ray_through(&self, point: Point2<f32>, viewport: Viewport) -> Ray {
        let ndc_x = if viewport.width > 0.0 { point.x / viewport.width * 2.0 - 1.0 } else { 0.0 };
        let ndc_y = if viewport.height > 0.0 { point.y / viewport.height * 2.0 - 1.0 } else { 0.0 };
        let tan_half = (self.vertical_fov.to_radians() / 2.0).tan();
        let local = Vector3::new(ndc_x * tan_half * viewport.aspect(), ndc_y * tan_half, -1.0);
        Ray::new(self.position, self.orientation * local)
    }

    /// Same as [`Viewpoint::ray_through`] over the current viewport.
    pub fn screen_point_to_ray(&self, point: Point2<f32>) -> Ray {
        self.ray_through(point, self.viewport)
    }
}

/// Viewpoint handle shared by the rendered-view source and the projector.
pub type SharedViewpoint = Arc<RwLock<Viewpoint>>;

/// Screen pixel for the center of `detection`, y flipped to grow upward.
pub fn detection_screen_point(detection: &Detection, viewport: Viewport) -> Point2<f32> {
    let (cx, cy) = detection.center();
    Point2::new(cx * viewport.width, (1.0 - cy) * viewport.height)
}

/// World position for one detection: the scene hit, or a point
/// [`FALLBACK_DISTANCE`] along the ray when the scene is missed.
pub fn project_detection(detection: &Detection, viewpoint: &Viewpoint, scene: &dyn Raycast) -> WorldPoint {
    let screen = detection_screen_point(detection, viewpoint.viewport);
    let ray = viewpoint.screen_point_to_ray(screen);
    match scene.raycast(&ray, RAYCAST_MAX_DISTANCE) {
        Some(hit) => hit.point,
        None => ray.at(FALLBACK_DISTANCE),
    }
}

/// Resolves world positions for whole detection lists.
#[derive(Clone)]
pub struct Projector {
    viewpoint: SharedViewpoint,
    scene: Arc<dyn Raycast>,
}

impl Projector {
    pub fn new(viewpoint: SharedViewpoint, scene: Arc<dyn Raycast>) -> Self {
        Self { viewpoint, scene }
    }

    /// Overwrite `world_position` on every detection. One ray cast each.
    pub fn project(&self, detections: &mut [Detection]) {
        let viewpoint = self.viewpoint.read();
        for detection in detections.iter_mut() {
            detection.world_position = Some(project_detection(detection, &viewpoint, self.scene.as_ref()));
        }
    }
}
