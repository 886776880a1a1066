//! The per-session scene graph, stored in a `hecs` world.
//!
//! A scene always holds exactly one model entity plus the fixed furniture
//! every session gets: an axis indicator, an ambient light, and a directional
//! light aimed at the origin. Markers are added by
//! [`place_marker`](crate::marker::place_marker).

use glam::Vec3;
use hecs::{Entity, World};

use crate::marker::Marker;
use crate::model::{Color, Model};

/// Colored lines along +X (red), +Y (green), and +Z (blue) from the origin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisIndicator {
    pub size: f32,
}

impl Default for AxisIndicator {
    fn default() -> Self {
        Self { size: 5.0 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: Color,
    pub intensity: f32,
}

impl Default for AmbientLight {
    fn default() -> Self {
        Self {
            color: Color::hex(0x404040),
            intensity: 1.0,
        }
    }
}

/// A light shining from `position` toward `target`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: Color,
    pub intensity: f32,
    pub position: Vec3,
    pub target: Vec3,
}

impl Default for DirectionalLight {
    fn default() -> Self {
        Self {
            color: Color::WHITE,
            intensity: 1.0,
            position: Vec3::new(5.0, 10.0, 7.5),
            target: Vec3::ZERO,
        }
    }
}

impl DirectionalLight {
    /// Unit vector the light travels along.
    pub fn direction(&self) -> Vec3 {
        (self.target - self.position).normalize_or(Vec3::NEG_Y)
    }
}

pub struct Scene {
    world: World,
    model: Entity,
    pub background: Color,
}

impl Scene {
    /// Builds the scene around `model`.
    pub fn new(model: Model) -> Self {
        let mut world = World::new();
        let model = world.spawn((model,));
        world.spawn((AxisIndicator::default(),));
        world.spawn((AmbientLight::default(),));
        world.spawn((DirectionalLight::default(),));

        Self {
            world,
            model,
            background: Color::hex(0x202020),
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn model_entity(&self) -> Entity {
        self.model
    }

    /// The model, unless it has been taken out with [`Scene::take_model`].
    pub fn model(&self) -> Option<hecs::Ref<'_, Model>> {
        self.world.get::<&Model>(self.model).ok()
    }

    pub fn model_mut(&mut self) -> Option<&mut Model> {
        self.world.query_one_mut::<&mut Model>(self.model).ok()
    }

    /// Removes the model from the scene and hands it back.
    pub fn take_model(&mut self) -> Option<Model> {
        self.world.remove_one::<Model>(self.model).ok()
    }

    pub fn add_marker(&mut self, marker: Marker) -> Entity {
        log::debug!("marker placed at {}", marker.position);
        self.world.spawn((marker,))
    }

    pub fn markers(&self) -> Vec<Marker> {
        self.world
            .query::<&Marker>()
            .iter()
            .map(|(_, marker)| *marker)
            .collect()
    }

    pub fn marker_count(&self) -> usize {
        self.world.query::<&Marker>().iter().count()
    }

    pub fn axis_indicator(&self) -> Option<AxisIndicator> {
        self.first::<AxisIndicator>()
    }

    pub fn ambient_light(&self) -> AmbientLight {
        self.first::<AmbientLight>().unwrap_or_default()
    }

    pub fn directional_light(&self) -> DirectionalLight {
        self.first::<DirectionalLight>().unwrap_or_default()
    }

    fn first<T: hecs::Component + Copy>(&self) -> Option<T> {
        self.world
            .query::<&T>()
            .iter()
            .next()
            .map(|(_, value)| *value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawGeometry;
    use crate::model::MeshPart;

    fn cube_scene() -> Scene {
        Scene::new(Model::new(
            "cube",
            vec![MeshPart::new("cube", RawGeometry::cube(1.0))],
        ))
    }

    #[test]
    fn new_scene_has_fixed_furniture() {
        let scene = cube_scene();
        assert_eq!(scene.axis_indicator(), Some(AxisIndicator { size: 5.0 }));
        assert_eq!(scene.marker_count(), 0);
        assert_eq!(scene.world().len(), 4);
        assert_eq!(scene.directional_light().target, Vec3::ZERO);
    }

    #[test]
    fn light_points_at_origin() {
        let light = cube_scene().directional_light();
        let expected = (-light.position).normalize();
        assert!((light.direction() - expected).length() < 1e-6);
    }

    #[test]
    fn model_is_mutable_in_place() {
        let mut scene = cube_scene();
        scene.model_mut().unwrap().transform.position.x = 2.0;
        assert_eq!(scene.model().unwrap().transform.position.x, 2.0);
    }

    #[test]
    fn take_model_empties_the_slot() {
        let mut scene = cube_scene();
        let model = scene.take_model().unwrap();
        assert_eq!(model.name, "cube");
        assert!(scene.model().is_none());
        assert!(scene.take_model().is_none());
    }
}
