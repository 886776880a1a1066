//! Discrete model edits triggered by direct user action.

use glam::Vec3;

use crate::model::{Color, Model};

/// Radians added per rotate command.
pub const ROTATION_STEP: f32 = 0.1;
/// World units added per translate command.
pub const TRANSLATION_STEP: f32 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    pub fn unit(self) -> Vec3 {
        match self {
            Axis::X => Vec3::X,
            Axis::Y => Vec3::Y,
            Axis::Z => Vec3::Z,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    pub fn sign(self) -> f32 {
        match self {
            Direction::Positive => 1.0,
            Direction::Negative => -1.0,
        }
    }
}

/// Rotates the model by one step about `axis`.
pub fn rotate_by(model: &mut Model, axis: Axis, direction: Direction) {
    model.transform.rotation += axis.unit() * ROTATION_STEP * direction.sign();
}

/// Moves the model by one step along `axis`.
pub fn translate_by(model: &mut Model, axis: Axis, direction: Direction) {
    model.transform.position += axis.unit() * TRANSLATION_STEP * direction.sign();
}

/// Gives every mesh part a fresh opaque color derived from `seed`.
pub fn recolor(model: &mut Model, seed: u32) {
    for (index, part) in model.parts_mut().iter_mut().enumerate() {
        let rgb = hash(index as u32, 0, seed) & 0x00ff_ffff;
        part.material.color = Color::hex(rgb);
    }
}

/// Simple hash function for procedural colors.
fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_add(x.wrapping_mul(374761393));
    h = h.wrapping_add(y.wrapping_mul(668265263));
    h ^= h >> 13;
    h = h.wrapping_mul(1274126177);
    h ^= h >> 16;
    h
}

/// Initial camera coordinates as entered by the user.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraCoordinates {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl CameraCoordinates {
    /// Parses three text fields. A blank or malformed field becomes 0.
    pub fn parse(x: &str, y: &str, z: &str) -> Self {
        Self {
            x: parse_axis("x", x),
            y: parse_axis("y", y),
            z: parse_axis("z", z),
        }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }
}

impl Default for CameraCoordinates {
    fn default() -> Self {
        Self {
            x: 5.0,
            y: 5.0,
            z: 5.0,
        }
    }
}

impl From<CameraCoordinates> for Vec3 {
    fn from(c: CameraCoordinates) -> Self {
        c.to_vec3()
    }
}

fn parse_axis(name: &str, text: &str) -> f32 {
    match text.trim().parse::<f32>() {
        Ok(value) if value.is_finite() => value,
        _ => {
            log::warn!("camera {name} coordinate {text:?} is not a number, using 0");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawGeometry;
    use crate::model::MeshPart;

    fn two_parts() -> Model {
        Model::new(
            "pair",
            vec![
                MeshPart::new("a", RawGeometry::cube(1.0)),
                MeshPart::new("b", RawGeometry::cube(1.0)),
            ],
        )
    }

    #[test]
    fn rotate_and_translate_step() {
        let mut model = two_parts();
        rotate_by(&mut model, Axis::Y, Direction::Positive);
        rotate_by(&mut model, Axis::X, Direction::Negative);
        translate_by(&mut model, Axis::Z, Direction::Negative);

        assert!((model.transform.rotation - Vec3::new(-0.1, 0.1, 0.0)).length() < 1e-6);
        assert!((model.transform.position - Vec3::new(0.0, 0.0, -0.1)).length() < 1e-6);
    }

    #[test]
    fn opposite_steps_cancel() {
        let mut model = two_parts();
        for axis in Axis::ALL {
            translate_by(&mut model, axis, Direction::Positive);
            translate_by(&mut model, axis, Direction::Negative);
        }
        assert!(model.transform.position.length() < 1e-6);
    }

    #[test]
    fn recolor_is_deterministic_per_seed() {
        let mut a = two_parts();
        let mut b = two_parts();
        recolor(&mut a, 7);
        recolor(&mut b, 7);
        assert_eq!(a.parts()[0].material.color, b.parts()[0].material.color);
        assert_ne!(a.parts()[0].material.color, a.parts()[1].material.color);
        assert_eq!(a.parts()[1].material.color.a, 1.0);

        recolor(&mut b, 8);
        assert_ne!(a.parts()[0].material.color, b.parts()[0].material.color);
    }

    #[test]
    fn malformed_coordinates_default_to_zero() {
        let c = CameraCoordinates::parse("1.5", "abc", "");
        assert_eq!(c.to_vec3(), Vec3::new(1.5, 0.0, 0.0));
        assert_eq!(CameraCoordinates::parse(" -2 ", "NaN", "inf").to_vec3(), Vec3::new(-2.0, 0.0, 0.0));
    }
}
