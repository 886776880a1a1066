//! Ray casting against model geometry.
//!
//! This module provides the occlusion test the marker engine relies on:
//!
//! - [`Ray`] - A 3D ray with origin and direction
//! - [`RayHit`] - Information about a ray-triangle intersection
//! - [`raycast_model`] - Every hit of a ray against all parts of a [`Model`]
//!
//! # Example
//!
//! ```
//! use vantage::{Model, MeshPart, RawGeometry, Ray, Vec3, raycast_model};
//!
//! let model = Model::new("cube", vec![MeshPart::new("cube", RawGeometry::cube(1.0))]);
//!
//! // From inside the cube, looking up +Z, the front face is half a unit away
//! let hits = raycast_model(&model, &Ray::new(Vec3::ZERO, Vec3::Z));
//! assert!((hits[0].distance - 0.5).abs() < 1e-5);
//! ```

use crate::model::Model;
use glam::Vec3;

/// Hits closer than this to the ray origin are ignored.
///
/// A ray origin sitting exactly on a surface therefore does not see that surface.
pub const RAY_EPSILON: f32 = 1e-5;

/// Slack on barycentric bounds so rays through shared edges still register.
const BARYCENTRIC_SLACK: f32 = 1e-6;

/// A ray in 3D space.
///
/// A ray has an origin point and a normalized direction. It represents
/// a half-line starting at the origin and extending in the direction.
#[derive(Clone, Copy, Debug)]
pub struct Ray {
    /// The starting point of the ray.
    pub origin: Vec3,
    /// The normalized direction of the ray.
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray with the given origin and direction.
    ///
    /// The direction will be normalized automatically.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Get a point along the ray at the given distance from the origin.
    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Test intersection with an axis-aligned bounding box (AABB).
    ///
    /// Returns the distance along the ray to the intersection point, or `None`
    /// if the ray doesn't intersect the box. A ray starting inside the box
    /// reports the exit distance.
    pub fn intersect_aabb(&self, min: Vec3, max: Vec3) -> Option<f32> {
        let mut t_min = f32::NEG_INFINITY;
        let mut t_max = f32::INFINITY;

        for i in 0..3 {
            let origin = self.origin[i];
            let dir = self.direction[i];
            let box_min = min[i];
            let box_max = max[i];

            if dir.abs() < f32::EPSILON {
                // Ray is parallel to this axis
                if origin < box_min || origin > box_max {
                    return None;
                }
            } else {
                let inv_dir = 1.0 / dir;
                let mut t1 = (box_min - origin) * inv_dir;
                let mut t2 = (box_max - origin) * inv_dir;

                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                }

                t_min = t_min.max(t1);
                t_max = t_max.min(t2);

                if t_min > t_max {
                    return None;
                }
            }
        }

        if t_min >= 0.0 {
            Some(t_min)
        } else if t_max >= 0.0 {
            Some(t_max)
        } else {
            None
        }
    }

    /// Double-sided Möller–Trumbore ray/triangle test.
    ///
    /// Returns the distance along the ray, or `None` when the ray misses, runs
    /// parallel to the triangle, or hits within [`RAY_EPSILON`] of its origin.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
        let edge1 = b - a;
        let edge2 = c - a;
        let pvec = self.direction.cross(edge2);
        let det = edge1.dot(pvec);

        if det.abs() < f32::EPSILON * edge1.length() * edge2.length() || det == 0.0 {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = self.origin - a;
        let u = tvec.dot(pvec) * inv_det;
        if !(-BARYCENTRIC_SLACK..=1.0 + BARYCENTRIC_SLACK).contains(&u) {
            return None;
        }

        let qvec = tvec.cross(edge1);
        let v = self.direction.dot(qvec) * inv_det;
        if v < -BARYCENTRIC_SLACK || u + v > 1.0 + BARYCENTRIC_SLACK {
            return None;
        }

        let t = edge2.dot(qvec) * inv_det;
        (t > RAY_EPSILON).then_some(t)
    }
}

/// Information about a ray-model intersection.
#[derive(Clone, Copy, Debug)]
pub struct RayHit {
    /// Index of the hit part in [`Model::parts`].
    pub part: usize,
    /// Distance from ray origin to the hit point.
    pub distance: f32,
    /// World-space position of the hit point.
    pub point: Vec3,
}

/// Cast a ray against every triangle of the model under its current transform.
///
/// Parts whose world bounds the ray misses are skipped without a triangle
/// walk.
///
/// # Returns
///
/// A vector of all hits, sorted by distance (closest first).
pub fn raycast_model(model: &Model, ray: &Ray) -> Vec<RayHit> {
    let mut hits = Vec::new();

    for (index, (world, part)) in model.world_parts().enumerate() {
        let bounds = part.geometry.bounds().transformed(&world);
        if bounds.is_empty() {
            continue;
        }
        // Pad so origins lying on a flat part's plane still reach the triangle test
        let pad = Vec3::splat(RAY_EPSILON);
        if ray.intersect_aabb(bounds.min - pad, bounds.max + pad).is_none() {
            continue;
        }

        for [a, b, c] in part.geometry.triangles() {
            let a = world.transform_point3(a);
            let b = world.transform_point3(b);
            let c = world.transform_point3(c);
            if let Some(distance) = ray.intersect_triangle(a, b, c) {
                hits.push(RayHit {
                    part: index,
                    distance,
                    point: ray.point_at(distance),
                });
            }
        }
    }

    hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    hits
}

/// Returns true if the ray hits any triangle of the model.
pub fn ray_hits_model(model: &Model, ray: &Ray) -> bool {
    !raycast_model(model, ray).is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawGeometry;
    use crate::model::MeshPart;

    fn unit_cube() -> Model {
        Model::new("cube", vec![MeshPart::new("cube", RawGeometry::cube(1.0))])
    }

    #[test]
    fn triangle_hit_distance() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, -1.0), Vec3::Z);
        let t = ray
            .intersect_triangle(Vec3::ZERO, Vec3::X, Vec3::Y)
            .expect("ray should hit");
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn triangle_is_double_sided() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::NEG_Z);
        assert!(ray.intersect_triangle(Vec3::ZERO, Vec3::X, Vec3::Y).is_some());
    }

    #[test]
    fn triangle_behind_origin_is_ignored() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, 1.0), Vec3::Z);
        assert!(ray.intersect_triangle(Vec3::ZERO, Vec3::X, Vec3::Y).is_none());
    }

    #[test]
    fn origin_on_surface_does_not_hit_it() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, 0.0), Vec3::Z);
        assert!(ray.intersect_triangle(Vec3::ZERO, Vec3::X, Vec3::Y).is_none());
    }

    #[test]
    fn aabb_from_inside_reports_exit() {
        let ray = Ray::new(Vec3::ZERO, Vec3::X);
        let t = ray.intersect_aabb(Vec3::splat(-1.0), Vec3::splat(1.0)).unwrap();
        assert!((t - 1.0).abs() < 1e-6);
    }

    #[test]
    fn raycast_from_cube_center_hits_front_face() {
        let hits = raycast_model(&unit_cube(), &Ray::new(Vec3::ZERO, Vec3::Z));
        assert!(!hits.is_empty());
        assert!((hits[0].distance - 0.5).abs() < 1e-5);
        assert!((hits[0].point.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn raycast_above_cube_misses() {
        let ray = Ray::new(Vec3::new(0.0, 0.0, 0.6), Vec3::Z);
        assert!(!ray_hits_model(&unit_cube(), &ray));
    }

    #[test]
    fn raycast_respects_model_transform() {
        let mut cube = unit_cube();
        cube.transform.position = Vec3::new(0.0, 0.0, 3.0);
        let hits = raycast_model(&cube, &Ray::new(Vec3::ZERO, Vec3::Z));
        assert!((hits[0].distance - 2.5).abs() < 1e-5);
        assert_eq!(hits.len(), 4, "two triangles on each of the near and far faces");
    }

    #[test]
    fn hits_are_sorted_by_distance() {
        let mut cube = unit_cube();
        cube.transform.position = Vec3::new(0.1, 0.1, 5.0);
        let hits = raycast_model(&cube, &Ray::new(Vec3::new(0.0, 0.0, 0.0), Vec3::Z));
        assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
    }
}
