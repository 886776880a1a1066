//! Marker placement above a model.
//!
//! The engine starts a candidate point at the model's bounding center and casts
//! a ray along [`MarkerPlacement::axis`] against the model. While the ray still hits
//! geometry the candidate climbs by [`MarkerPlacement::step`] along
//! [`MarkerPlacement::climb`]. The first candidate with a clear ray is pushed
//! [`MarkerPlacement::surface_offset`] further along the axis so the marker
//! does not z-fight the surface it sits on.
//!
//! The search is bounded by [`MarkerPlacement::max_iterations`]; a model that
//! keeps occluding the candidate yields [`PlacementError::NoConvergence`] instead
//! of an endless loop.
//!
//! # Example
//!
//! ```
//! use vantage::{MarkerPlacement, Model, MeshPart, RawGeometry, Vec3};
//!
//! let cube = Model::new("cube", vec![MeshPart::new("cube", RawGeometry::cube(1.0))]);
//! let position = MarkerPlacement::default().find(&cube).unwrap();
//! assert!(position.z > 0.5);
//! ```

use crate::geometry::compute_center;
use crate::model::{Color, Model};
use crate::picking::{Ray, ray_hits_model};
use crate::scene::Scene;
use glam::Vec3;
use thiserror::Error;

/// Radius of the marker sphere in world units.
pub const MARKER_RADIUS: f32 = 0.05;

/// Bright warning orange; the marker is drawn unlit.
pub const MARKER_COLOR: Color = Color::hex(0xff6a00);

/// Errors raised while searching for a marker position.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PlacementError {
    #[error("marker search did not clear the model after {iterations} steps (last candidate {candidate})")]
    NoConvergence { iterations: u32, candidate: Vec3 },
    #[error("marker search step must be positive and finite, got {0}")]
    InvalidStep(f32),
    #[error("marker search axis must be a non-zero vector")]
    ZeroAxis,
}

/// Parameters of the incremental ray-cast search.
#[derive(Clone, Copy, Debug)]
pub struct MarkerPlacement {
    /// Direction of the occlusion ray and of the final surface offset.
    pub axis: Vec3,
    /// Direction the candidate climbs while the ray is blocked.
    pub climb: Vec3,
    /// Climb distance per iteration.
    pub step: f32,
    /// Clearance added along `axis` once the ray is free.
    pub surface_offset: f32,
    /// Upper bound on climb iterations.
    pub max_iterations: u32,
}

impl Default for MarkerPlacement {
    fn default() -> Self {
        Self {
            axis: Vec3::Z,
            climb: Vec3::Z,
            step: 0.1,
            surface_offset: 0.05,
            max_iterations: 10_000,
        }
    }
}

impl MarkerPlacement {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn axis(mut self, axis: Vec3) -> Self {
        self.axis = axis;
        self
    }

    pub fn climb(mut self, climb: Vec3) -> Self {
        self.climb = climb;
        self
    }

    pub fn step(mut self, step: f32) -> Self {
        self.step = step;
        self
    }

    pub fn surface_offset(mut self, offset: f32) -> Self {
        self.surface_offset = offset;
        self
    }

    pub fn max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Finds the first unobstructed point above the model's center.
    pub fn find(&self, model: &Model) -> Result<Vec3, PlacementError> {
        if !(self.step.is_finite() && self.step > 0.0) {
            return Err(PlacementError::InvalidStep(self.step));
        }
        let axis = self.axis.try_normalize().ok_or(PlacementError::ZeroAxis)?;
        let climb = self.climb.try_normalize().ok_or(PlacementError::ZeroAxis)?;

        let center = compute_center(model);

        // Candidates are computed from the start point, not accumulated,
        // so float drift cannot skip past a thin surface.
        for iteration in 0..=self.max_iterations {
            let candidate = center + climb * (self.step * iteration as f32);
            if !ray_hits_model(model, &Ray::new(candidate, axis)) {
                log::debug!("marker candidate cleared after {iteration} steps at {candidate}");
                return Ok(candidate + axis * self.surface_offset);
            }
        }

        Err(PlacementError::NoConvergence {
            iterations: self.max_iterations,
            candidate: center + climb * (self.step * self.max_iterations as f32),
        })
    }
}

/// Finds a marker position with the default offset and iteration bound.
///
/// Only the ray direction follows `axis`; the candidate always climbs along +Z.
pub fn find_marker_position(model: &Model, axis: Vec3, step: f32) -> Result<Vec3, PlacementError> {
    MarkerPlacement::default().axis(axis).step(step).find(model)
}

/// The small unlit sphere floating above the model.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Marker {
    pub position: Vec3,
    pub radius: f32,
    pub color: Color,
}

impl Marker {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            radius: MARKER_RADIUS,
            color: MARKER_COLOR,
        }
    }
}

/// Spawns a marker at `position` into the scene.
///
/// Calling this twice adds two markers; callers own the once-per-session rule.
pub fn place_marker(position: Vec3, scene: &mut Scene) -> hecs::Entity {
    scene.add_marker(Marker::at(position))
}
