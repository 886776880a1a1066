//! # Vantage
//!
//! **An interactive 3D model inspection viewer.**
//!
//! Load a glTF, GLB, OBJ, FBX or STL file and Vantage drops a marker on the
//! top surface of the model, aims the camera at its center and lets you fly
//! around it with the mouse.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vantage::*;
//!
//! fn main() {
//!     let config = AppConfig::new()
//!         .format(FormatTag::Glb)
//!         .camera("5", "5", "5")
//!         .asset("models/helmet.glb");
//!
//!     run(config).unwrap();
//! }
//! ```
//!
//! ## Layers
//!
//! - **Geometry** - [`RawGeometry`], [`Model`] and ray casting with [`Ray`].
//! - **Marker placement** - [`MarkerPlacement`] walks a candidate point up through the
//!   model until nothing is above it.
//! - **Sessions** - [`Session`] owns one scene, camera, renderer and render loop and
//!   tears all of it down exactly once.
//! - **Viewer** - [`Viewer`] decodes uploads through a [`LoaderRegistry`] and swaps
//!   sessions.
//!
//! Headless use works through [`HeadlessCanvas`], which is what the tests drive.

mod app;
mod camera;
mod console;
mod geometry;
mod gpu;
pub mod input;
mod loader;
mod marker;
mod mesh;
mod mesh_pass;
mod model;
mod navigation;
mod picking;
mod render;
pub mod scene;
mod session;
mod viewer;

pub use app::{AppConfig, ViewerEvent, run};
pub use camera::{Camera, DEFAULT_FAR, DEFAULT_FOV, DEFAULT_NEAR};
pub use console::{
    Axis, CameraCoordinates, Direction, ROTATION_STEP, TRANSLATION_STEP, recolor, rotate_by,
    translate_by,
};
pub use geometry::{Aabb, RawGeometry, compute_center, world_bounds};
pub use gpu::{GpuContext, RenderError};
pub use input::{InputEvent, InputSurface, InputTranslator, ListenerId, Propagation};
pub use loader::{
    DecodeError, FbxLoader, FormatTag, GltfLoader, LoaderRegistry, ModelLoader, ObjLoader,
    StlLoader,
};
pub use marker::{
    MARKER_COLOR, MARKER_RADIUS, Marker, MarkerPlacement, PlacementError, find_marker_position,
    place_marker,
};
pub use mesh::{Mesh, Vertex3d};
pub use mesh_pass::{DrawCall, MeshPass, Topology};
pub use model::{Color, Material, MeshPart, Model, Transform};
pub use navigation::{
    CameraNavigator, NAVIGATION_EVENTS, NavigationState, Sensitivity, attach_navigation,
};
pub use picking::{RAY_EPSILON, Ray, RayHit, ray_hits_model, raycast_model};
pub use render::{WgpuRenderer, WindowCanvas};
pub use scene::Scene;
pub use session::{
    Canvas, HeadlessCanvas, RecordingRenderer, RenderLoop, RenderStats, Renderer, Session,
    SessionError,
};
pub use viewer::{Viewer, ViewerError};

// Re-export glam math types for convenience
pub use glam::{Mat4, Quat, Vec2, Vec3, Vec4};

// Re-export commonly used winit types for convenience
pub use winit::event::MouseButton;
pub use winit::keyboard::KeyCode;

// ECS world holding the scene
pub use hecs::{Entity, World};
