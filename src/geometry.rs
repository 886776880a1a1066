//! CPU-side geometry and world-space bounds.
//!
//! This module holds the geometry every other part of the viewer reasons about:
//!
//! - [`RawGeometry`] - indexed triangle data as produced by the loaders
//! - [`Aabb`] - an axis-aligned bounding box with an explicit empty state
//! - [`world_bounds`] / [`compute_center`] - bounds of a [`Model`] under its
//!   *current* transform, recomputed on every call
//!
//! # Example
//!
//! ```
//! use vantage::{Model, MeshPart, RawGeometry, compute_center, Vec3};
//!
//! let mut model = Model::new("cube", vec![MeshPart::new("cube", RawGeometry::cube(1.0))]);
//! assert!(compute_center(&model).length() < 1e-6);
//!
//! model.transform.position = Vec3::new(2.0, 0.0, 0.0);
//! assert!((compute_center(&model).x - 2.0).abs() < 1e-6);
//! ```

use crate::mesh::Vertex3d;
use crate::model::Model;
use glam::{Mat4, Vec3};

/// Raw geometry data before GPU upload.
///
/// Loaders produce this representation; the marker engine ray-casts against it
/// and the renderer uploads it once per session.
#[derive(Clone, Debug, Default)]
pub struct RawGeometry {
    /// Vertex positions, normals, and UVs.
    pub vertices: Vec<Vertex3d>,
    /// Triangle indices.
    pub indices: Vec<u32>,
}

impl RawGeometry {
    /// Creates raw geometry from vertices and indices.
    pub fn new(vertices: Vec<Vertex3d>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Builds geometry from bare positions, computing smooth normals.
    pub fn from_positions(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        let vertices = positions
            .into_iter()
            .map(|p| Vertex3d::new(p, [0.0, 0.0, 0.0], [0.0, 0.0]))
            .collect();
        let mut geometry = Self::new(vertices, indices);
        geometry.recalculate_normals();
        geometry
    }

    /// Returns true if there is no triangle to draw or hit.
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty() || self.indices.len() < 3
    }

    /// Number of complete triangles.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Computes the local-space bounding box.
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::EMPTY;
        for v in &self.vertices {
            aabb.expand(Vec3::from(v.position));
        }
        aabb
    }

    /// Iterates triangles as local-space corner positions.
    ///
    /// Triangles referencing out-of-range vertices are skipped.
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.chunks_exact(3).filter_map(|tri| {
            let a = self.vertices.get(tri[0] as usize)?;
            let b = self.vertices.get(tri[1] as usize)?;
            let c = self.vertices.get(tri[2] as usize)?;
            Some([
                Vec3::from(a.position),
                Vec3::from(b.position),
                Vec3::from(c.position),
            ])
        })
    }

    /// Recalculates vertex normals from face geometry.
    ///
    /// This computes smooth normals by averaging the face normals
    /// of all triangles that share each vertex.
    pub fn recalculate_normals(&mut self) {
        for v in &mut self.vertices {
            v.normal = [0.0, 0.0, 0.0];
        }

        let vertex_count = self.vertices.len();
        for tri in self.indices.chunks_exact(3) {
            let [i0, i1, i2] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            if i0 >= vertex_count || i1 >= vertex_count || i2 >= vertex_count {
                continue;
            }

            let p0 = Vec3::from(self.vertices[i0].position);
            let p1 = Vec3::from(self.vertices[i1].position);
            let p2 = Vec3::from(self.vertices[i2].position);

            // Area weighted: |cross| is twice the triangle area
            let face_normal = (p1 - p0).cross(p2 - p0);

            for i in [i0, i1, i2] {
                let n = Vec3::from(self.vertices[i].normal) + face_normal;
                self.vertices[i].normal = n.into();
            }
        }

        for v in &mut self.vertices {
            v.normal = Vec3::from(v.normal).normalize_or_zero().into();
        }
    }

    /// An axis-aligned cube of edge length `size` centered at the origin.
    ///
    /// Each face has its own vertices so flat normals survive.
    pub fn cube(size: f32) -> Self {
        let h = size * 0.5;
        #[rustfmt::skip]
        let vertices = vec![
            // Front face (Z+)
            Vertex3d::new([-h, -h,  h], [ 0.0,  0.0,  1.0], [0.0, 0.0]),
            Vertex3d::new([ h, -h,  h], [ 0.0,  0.0,  1.0], [1.0, 0.0]),
            Vertex3d::new([ h,  h,  h], [ 0.0,  0.0,  1.0], [1.0, 1.0]),
            Vertex3d::new([-h,  h,  h], [ 0.0,  0.0,  1.0], [0.0, 1.0]),
            // Back face (Z-)
            Vertex3d::new([ h, -h, -h], [ 0.0,  0.0, -1.0], [0.0, 0.0]),
            Vertex3d::new([-h, -h, -h], [ 0.0,  0.0, -1.0], [1.0, 0.0]),
            Vertex3d::new([-h,  h, -h], [ 0.0,  0.0, -1.0], [1.0, 1.0]),
            Vertex3d::new([ h,  h, -h], [ 0.0,  0.0, -1.0], [0.0, 1.0]),
            // Top face (Y+)
            Vertex3d::new([-h,  h,  h], [ 0.0,  1.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([ h,  h,  h], [ 0.0,  1.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([ h,  h, -h], [ 0.0,  1.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([-h,  h, -h], [ 0.0,  1.0,  0.0], [0.0, 1.0]),
            // Bottom face (Y-)
            Vertex3d::new([-h, -h, -h], [ 0.0, -1.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([ h, -h, -h], [ 0.0, -1.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([ h, -h,  h], [ 0.0, -1.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([-h, -h,  h], [ 0.0, -1.0,  0.0], [0.0, 1.0]),
            // Right face (X+)
            Vertex3d::new([ h, -h,  h], [ 1.0,  0.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([ h, -h, -h], [ 1.0,  0.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([ h,  h, -h], [ 1.0,  0.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([ h,  h,  h], [ 1.0,  0.0,  0.0], [0.0, 1.0]),
            // Left face (X-)
            Vertex3d::new([-h, -h, -h], [-1.0,  0.0,  0.0], [0.0, 0.0]),
            Vertex3d::new([-h, -h,  h], [-1.0,  0.0,  0.0], [1.0, 0.0]),
            Vertex3d::new([-h,  h,  h], [-1.0,  0.0,  0.0], [1.0, 1.0]),
            Vertex3d::new([-h,  h, -h], [-1.0,  0.0,  0.0], [0.0, 1.0]),
        ];

        #[rustfmt::skip]
        let indices: Vec<u32> = vec![
            0,  1,  2,  2,  3,  0,  // front
            4,  5,  6,  6,  7,  4,  // back
            8,  9,  10, 10, 11, 8,  // top
            12, 13, 14, 14, 15, 12, // bottom
            16, 17, 18, 18, 19, 16, // right
            20, 21, 22, 22, 23, 20, // left
        ];

        Self::new(vertices, indices)
    }

    /// A UV sphere of the given radius centered at the origin.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut vertices = Vec::with_capacity(((segments + 1) * (rings + 1)) as usize);
        let mut indices = Vec::with_capacity((segments * rings * 6) as usize);

        for ring in 0..=rings {
            let phi = std::f32::consts::PI * ring as f32 / rings as f32;
            let y = phi.cos();
            let ring_radius = phi.sin();

            for seg in 0..=segments {
                let theta = 2.0 * std::f32::consts::PI * seg as f32 / segments as f32;
                let x = ring_radius * theta.cos();
                let z = ring_radius * theta.sin();

                vertices.push(Vertex3d::new(
                    [x * radius, y * radius, z * radius],
                    [x, y, z],
                    [seg as f32 / segments as f32, ring as f32 / rings as f32],
                ));
            }
        }

        for ring in 0..rings {
            for seg in 0..segments {
                let current = ring * (segments + 1) + seg;
                let next = current + segments + 1;

                indices.extend_from_slice(&[current, next, current + 1]);
                indices.extend_from_slice(&[current + 1, next, next + 1]);
            }
        }

        Self::new(vertices, indices)
    }

    /// A square of edge length `size` lying in the XY plane, facing +Z.
    pub fn plane_xy(size: f32) -> Self {
        let h = size * 0.5;
        let vertices = vec![
            Vertex3d::new([-h, -h, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex3d::new([h, -h, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex3d::new([h, h, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex3d::new([-h, h, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
        ];
        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }

    /// A line segment from the origin to `tip`, for line-list rendering.
    pub fn segment(tip: Vec3) -> Self {
        let vertices = vec![
            Vertex3d::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new(tip.into(), [0.0, 1.0, 0.0], [1.0, 0.0]),
        ];
        Self::new(vertices, vec![0, 1])
    }
}

/// Minimal axis-aligned box enclosing a set of points.
///
/// An empty box has `min = +inf` and `max = -inf`; expanding it by any point
/// yields a zero-size box at that point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

impl Aabb {
    /// The box that contains nothing.
    pub const EMPTY: Aabb = Aabb {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Center of the box; the origin for an empty box.
    pub fn center(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            (self.min + self.max) * 0.5
        }
    }

    /// Extent of the box; zero for an empty box.
    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// Bounds of this box after transforming its eight corners.
    pub fn transformed(&self, matrix: &Mat4) -> Aabb {
        if self.is_empty() {
            return Aabb::EMPTY;
        }
        let mut out = Aabb::EMPTY;
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { self.min.x } else { self.max.x },
                if i & 2 == 0 { self.min.y } else { self.max.y },
                if i & 4 == 0 { self.min.z } else { self.max.z },
            );
            out.expand(matrix.transform_point3(corner));
        }
        out
    }
}

/// World-space bounding box of every vertex of the model.
///
/// Vertices are transformed individually (not box corners), so the result is
/// the tight box under the model's current position, rotation, and scale.
pub fn world_bounds(model: &Model) -> Aabb {
    let mut aabb = Aabb::EMPTY;
    for (world, part) in model.world_parts() {
        for v in &part.geometry.vertices {
            aabb.expand(world.transform_point3(Vec3::from(v.position)));
        }
    }
    aabb
}

/// Centroid of the model's world-space bounding box.
///
/// A model without vertices reports the origin.
pub fn compute_center(model: &Model) -> Vec3 {
    world_bounds(model).center()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::MeshPart;
    use glam::Quat;

    #[test]
    fn raw_geometry_bounds() {
        let vertices = vec![
            Vertex3d::new([0.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new([1.0, 2.0, 3.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
            Vertex3d::new([-1.0, -1.0, -1.0], [0.0, 1.0, 0.0], [0.0, 0.0]),
        ];
        let geom = RawGeometry::new(vertices, vec![0, 1, 2]);

        let bounds = geom.bounds();
        assert_eq!(bounds.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_eq!(bounds.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn empty_bounds_center_at_origin() {
        let aabb = Aabb::EMPTY;
        assert!(aabb.is_empty());
        assert_eq!(aabb.center(), Vec3::ZERO);
        assert_eq!(aabb.size(), Vec3::ZERO);
    }

    #[test]
    fn unit_cube_center_is_origin() {
        let model = Model::new("cube", vec![MeshPart::new("cube", RawGeometry::cube(1.0))]);
        let bounds = world_bounds(&model);
        assert!((bounds.min - Vec3::splat(-0.5)).length() < 1e-6);
        assert!((bounds.max - Vec3::splat(0.5)).length() < 1e-6);
        assert!(compute_center(&model).length() < 1e-6);
    }

    #[test]
    fn center_follows_current_transform() {
        let mut model = Model::new("cube", vec![MeshPart::new("cube", RawGeometry::cube(1.0))]);
        model.transform.position = Vec3::new(1.0, -2.0, 3.0);
        let center = compute_center(&model);
        assert!((center - Vec3::new(1.0, -2.0, 3.0)).length() < 1e-5);

        model.transform.position = Vec3::ZERO;
        assert!(compute_center(&model).length() < 1e-5);
    }

    #[test]
    fn rotation_changes_world_bounds() {
        let geometry = RawGeometry::from_positions(
            vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            vec![0, 1, 2],
        );
        let mut model = Model::new("tri", vec![MeshPart::new("tri", geometry)]);
        model.transform.rotation = Vec3::new(0.0, 0.0, std::f32::consts::FRAC_PI_2);

        let bounds = world_bounds(&model);
        // +X edge now points along +Y
        assert!((bounds.max.y - 2.0).abs() < 1e-5);
        assert!(bounds.max.x.abs() < 1e-5);
    }

    #[test]
    fn part_local_matrix_is_applied() {
        let part = MeshPart::new("cube", RawGeometry::cube(1.0))
            .with_local(Mat4::from_translation(Vec3::new(0.0, 0.0, 4.0)));
        let model = Model::new("offset", vec![part]);
        assert!((compute_center(&model) - Vec3::new(0.0, 0.0, 4.0)).length() < 1e-5);
    }

    #[test]
    fn recalculated_normals_face_outward() {
        let mut geometry = RawGeometry::plane_xy(1.0);
        geometry.recalculate_normals();
        for v in &geometry.vertices {
            assert!((Vec3::from(v.normal) - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn transformed_box_covers_rotated_corners() {
        let aabb = Aabb::new(Vec3::splat(-0.5), Vec3::splat(0.5));
        let rotated = aabb.transformed(&Mat4::from_quat(Quat::from_rotation_z(
            std::f32::consts::FRAC_PI_4,
        )));
        let half_diagonal = 0.5 * std::f32::consts::SQRT_2;
        assert!((rotated.max.x - half_diagonal).abs() < 1e-5);
        assert!((rotated.max.z - 0.5).abs() < 1e-5);
    }

    #[test]
    fn sphere_fits_its_radius() {
        let sphere = RawGeometry::uv_sphere(0.25, 16, 8);
        let bounds = sphere.bounds();
        assert!((bounds.max.y - 0.25).abs() < 1e-5);
        assert!((bounds.min.y + 0.25).abs() < 1e-5);
        assert_eq!(sphere.triangle_count(), 16 * 8 * 2);
    }
}
