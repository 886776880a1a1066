//! The loaded model: a root transform over a flat list of mesh parts.
//!
//! Loaders flatten the source hierarchy: every [`MeshPart`] carries the
//! accumulated matrix of its ancestors in [`MeshPart::local`], so the only
//! transform mutated after loading is the model's root [`Transform`].

use crate::geometry::RawGeometry;
use glam::{EulerRot, Mat4, Quat, Vec3};

/// Linear RGBA color.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Builds a color from a packed `0xRRGGBB` value.
    pub const fn hex(rgb: u32) -> Self {
        Self::rgb(
            ((rgb >> 16) & 0xff) as f32 / 255.0,
            ((rgb >> 8) & 0xff) as f32 / 255.0,
            (rgb & 0xff) as f32 / 255.0,
        )
    }

    pub const WHITE: Color = Color::rgba(1.0, 1.0, 1.0, 1.0);
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const RED: Color = Color::rgb(1.0, 0.0, 0.0);
    pub const GREEN: Color = Color::rgb(0.0, 1.0, 0.0);
    pub const BLUE: Color = Color::rgb(0.0, 0.0, 1.0);
    /// Neutral gray given to parts whose source carries no material.
    pub const DEFAULT_SURFACE: Color = Color::rgb(0.8, 0.8, 0.8);

    pub fn to_array(self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Scales the color channels, leaving alpha untouched.
    pub fn scaled(self, factor: f32) -> Self {
        Self::rgba(self.r * factor, self.g * factor, self.b * factor, self.a)
    }
}

/// Position, Euler rotation, and scale of a scene node.
///
/// Rotation is stored as intrinsic XYZ Euler angles in radians so that
/// single-axis nudges from the transform console stay exact.
///
/// When converted to a matrix via [`Transform::matrix()`], transformations are
/// applied in the standard order: **Scale → Rotate → Translate** (SRT).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    /// Translation.
    pub position: Vec3,
    /// Intrinsic XYZ Euler angles in radians.
    pub rotation: Vec3,
    /// Scale factors for each axis.
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    pub fn position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    pub fn rotation(mut self, rotation: Vec3) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// The rotation as a quaternion.
    pub fn quat(&self) -> Quat {
        Quat::from_euler(
            EulerRot::XYZ,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        )
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.quat(), self.position)
    }
}

/// Surface appearance of a mesh part.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    pub color: Color,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            color: Color::DEFAULT_SURFACE,
        }
    }
}

/// One drawable sub-node of a model.
#[derive(Clone, Debug)]
pub struct MeshPart {
    pub name: String,
    /// Accumulated transform of the part relative to the model root.
    pub local: Mat4,
    pub geometry: RawGeometry,
    pub material: Material,
}

impl MeshPart {
    pub fn new(name: impl Into<String>, geometry: RawGeometry) -> Self {
        Self {
            name: name.into(),
            local: Mat4::IDENTITY,
            geometry,
            material: Material::default(),
        }
    }

    pub fn with_local(mut self, local: Mat4) -> Self {
        self.local = local;
        self
    }

    pub fn with_color(mut self, color: Color) -> Self {
        self.material.color = color;
        self
    }
}

/// A decoded asset ready to be placed in a scene.
#[derive(Clone, Debug)]
pub struct Model {
    pub name: String,
    /// Root transform, mutated by the transform console.
    pub transform: Transform,
    parts: Vec<MeshPart>,
}

impl Model {
    pub fn new(name: impl Into<String>, parts: Vec<MeshPart>) -> Self {
        Self {
            name: name.into(),
            transform: Transform::default(),
            parts,
        }
    }

    pub fn parts(&self) -> &[MeshPart] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [MeshPart] {
        &mut self.parts
    }

    pub fn triangle_count(&self) -> usize {
        self.parts.iter().map(|p| p.geometry.triangle_count()).sum()
    }

    /// True when no part carries a triangle.
    pub fn is_empty(&self) -> bool {
        self.parts.iter().all(|p| p.geometry.is_empty())
    }

    /// Visits every part together with its current world matrix.
    pub fn world_parts(&self) -> impl Iterator<Item = (Mat4, &MeshPart)> + '_ {
        let root = self.transform.matrix();
        self.parts.iter().map(move |part| (root * part.local, part))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_color_channels() {
        let c = Color::hex(0xff8000);
        assert!((c.r - 1.0).abs() < 1e-6);
        assert!((c.g - 128.0 / 255.0).abs() < 1e-6);
        assert!(c.b.abs() < 1e-6);
        assert_eq!(c.a, 1.0);
    }

    #[test]
    fn transform_matrix_order_is_srt() {
        let t = Transform::new()
            .position(Vec3::new(1.0, 0.0, 0.0))
            .scale(Vec3::splat(2.0));
        let p = t.matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert!((p - Vec3::new(3.0, 0.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn world_parts_compose_root_and_local() {
        let part = MeshPart::new("p", RawGeometry::cube(1.0))
            .with_local(Mat4::from_translation(Vec3::Y));
        let mut model = Model::new("m", vec![part]);
        model.transform.position = Vec3::X;

        let (world, _) = model.world_parts().next().unwrap();
        let origin = world.transform_point3(Vec3::ZERO);
        assert!((origin - Vec3::new(1.0, 1.0, 0.0)).length() < 1e-6);
    }

    #[test]
    fn empty_model_detection() {
        let model = Model::new("nothing", vec![MeshPart::new("p", RawGeometry::default())]);
        assert!(model.is_empty());
        assert_eq!(model.triangle_count(), 0);
    }
}
