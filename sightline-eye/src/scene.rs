//! Scene geometry the rendered view draws and detections are ray cast against

use nalgebra::{Point3, Unit, Vector3};

/// Half-line from `origin` along a unit `direction`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f32>,
    pub direction: Unit<Vector3<f32>>,
}

impl Ray {
    pub fn new(origin: Point3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: Unit::new_normalize(direction),
        }
    }

    pub fn at(&self, distance: f32) -> Point3<f32> {
        self.origin + self.direction.into_inner() * distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub point: Point3<f32>,
    pub normal: Unit<Vector3<f32>>,
    pub distance: f32,
    /// Index of the collider that was hit.
    pub collider: usize,
}

/// Anything a ray can be cast against.
pub trait Raycast: Send + Sync {
    /// Closest hit within `max_distance`, if any.
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Sphere { center: Point3<f32>, radius: f32 },
    /// Infinite plane through `point`, visible from the side `normal` faces.
    Plane { point: Point3<f32>, normal: Unit<Vector3<f32>> },
    /// Axis-aligned box.
    Cuboid { min: Point3<f32>, max: Point3<f32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub shape: Shape,
    pub color: [u8; 3],
}

impl Collider {
    pub fn sphere(center: Point3<f32>, radius: f32, color: [u8; 3]) -> Self {
        Self {
            shape: Shape::Sphere { center, radius },
            color,
        }
    }

    pub fn plane(point: Point3<f32>, normal: Vector3<f32>, color: [u8; 3]) -> Self {
        Self {
            shape: Shape::Plane {
                point,
                normal: Unit::new_normalize(normal),
            },
            color,
        }
    }

    pub fn cuboid(a: Point3<f32>, b: Point3<f32>, color: [u8; 3]) -> Self {
        Self {
            shape: Shape::Cuboid {
                min: a.inf(&b),
                max: a.sup(&b),
            },
            color,
        }
    }

    /// Distance and surface normal of the nearest intersection in front of the ray.
    fn intersect(&self, ray: &Ray) -> Option<(f32, Unit<Vector3<f32>>)> {
        let dir = ray.direction.into_inner();
        match &self.shape {
            Shape::Sphere { center, radius } => {
                let oc = ray.origin - *center;
                let b = oc.dot(&dir);
                let c = oc.norm_squared() - radius * radius;
                let disc = b * b - c;
                if disc < 0.0 {
                    return None;
                }
                let sqrt = disc.sqrt();
                let t = if -b - sqrt >= 0.0 { -b - sqrt } else { -b + sqrt };
                if t < 0.0 {
                    return None;
                }
                let normal = Unit::new_normalize(ray.at(t) - *center);
                Some((t, normal))
            }
            Shape::Plane { point, normal } => {
                let n = normal.into_inner();
                let denom = n.dot(&dir);
                if denom.abs() < 1e-6 {
                    return None;
                }
                let t = (*point - ray.origin).dot(&n) / denom;
                if t < 0.0 {
                    return None;
                }
                let facing = if denom < 0.0 { *normal } else { -*normal };
                Some((t, facing))
            }
            Shape::Cuboid { min, max } => {
                // Slab test
                let mut t_near = f32::NEG_INFINITY;
                let mut t_far = f32::INFINITY;
                let mut near_axis = 0;
                for axis in 0..3 {
                    let inv = 1.0 / dir[axis];
                    let mut t0 = (min[axis] - ray.origin[axis]) * inv;
                    let mut t1 = (max[axis] - ray.origin[axis]) * inv;
                    if inv < 0.0 {
                        std::mem::swap(&mut t0, &mut t1);
                    }
                    if t0 > t_near {
                        t_near = t0;
                        near_axis = axis;
                    }
                    t_far = t_far.min(t1);
                    if t_far < t_near {
                        return None;
                    }
                }
                if t_far < 0.0 {
                    return None;
                }
                // Origin inside the box: report the exit face.
                let t = if t_near >= 0.0 { t_near } else { t_far };
                let mut normal = Vector3::zeros();
                normal[near_axis] = if dir[near_axis] > 0.0 { -1.0 } else { 1.0 };
                Some((t, Unit::new_unchecked(normal)))
            }
        }
    }
}

/// A flat list of colliders.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    colliders: Vec<Collider>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, collider: Collider) -> Self {
        self.colliders.push(collider);
        self
    }

    pub fn add(&mut self, collider: Collider) -> usize {
        self.colliders.push(collider);
        self.colliders.len() - 1
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    /// Small room used by the demo binary: a floor, a back wall and a few props.
    pub fn demo_room() -> Self {
        Scene::new()
            .with(Collider::plane(Point3::new(0.0, 0.0, 0.0), Vector3::y(), [90, 90, 100]))
            .with(Collider::plane(Point3::new(0.0, 0.0, -8.0), Vector3::z(), [150, 140, 120]))
            .with(Collider::sphere(Point3::new(-1.0, 0.5, -4.0), 0.5, [220, 60, 60]))
            .with(Collider::cuboid(
                Point3::new(0.5, 0.0, -5.0),
                Point3::new(1.5, 1.2, -4.0),
                [60, 180, 90],
            ))
    }
}

impl Raycast for Scene {
    fn raycast(&self, ray: &Ray, max_distance: f32) -> Option<RayHit> {
        self.colliders
            .iter()
            .enumerate()
            .filter_map(|(index, collider)| {
                collider
                    .intersect(ray)
                    .filter(|(t, _)| *t <= max_distance)
                    .map(|(t, normal)| RayHit {
                        point: ray.at(t),
                        normal,
                        distance: t,
                        collider: index,
                    })
            })
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forward_ray() -> Ray {
        Ray::new(Point3::origin(), -Vector3::z())
    }

    #[test]
    fn test_empty_scene_has_no_hit() {
        assert!(Scene::new().raycast(&forward_ray(), 10.0).is_none());
    }

    #[test]
    fn test_sphere_hit_distance() {
        let scene = Scene::new().with(Collider::sphere(Point3::new(0.0, 0.0, -5.0), 1.0, [0, 0, 0]));
        let hit = scene.raycast(&forward_ray(), 10.0).unwrap();
        assert!((hit.distance - 4.0).abs() < 1e-5);
        assert!((hit.point.z + 4.0).abs() < 1e-5);
        assert!((hit.normal.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_hit_beyond_max_distance_is_ignored() {
        let scene = Scene::new().with(Collider::sphere(Point3::new(0.0, 0.0, -20.0), 1.0, [0, 0, 0]));
        assert!(scene.raycast(&forward_ray(), 10.0).is_none());
    }

    #[test]
    fn test_plane_behind_ray_is_ignored() {
        let scene = Scene::new().with(Collider::plane(Point3::new(0.0, 0.0, 3.0), Vector3::z(), [0, 0, 0]));
        assert!(scene.raycast(&forward_ray(), 10.0).is_none());
    }

    #[test]
    fn test_cuboid_hit_and_nearest_wins() {
        let scene = Scene::new()
            .with(Collider::plane(Point3::new(0.0, 0.0, -6.0), Vector3::z(), [0, 0, 0]))
            .with(Collider::cuboid(
                Point3::new(-1.0, -1.0, -3.0),
                Point3::new(1.0, 1.0, -2.0),
                [0, 0, 0],
            ));
        let hit = scene.raycast(&forward_ray(), 10.0).unwrap();
        assert_eq!(hit.collider, 1);
        assert!((hit.distance - 2.0).abs() < 1e-5);
        assert!((hit.normal.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_at() {
        let ray = Ray::new(Point3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 3.0, 0.0));
        let p = ray.at(2.0);
        assert!((p - Point3::new(1.0, 2.0, 0.0)).norm() < 1e-6);
    }
}
