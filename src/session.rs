//! Scene session lifecycle.
//!
//! A [`Session`] owns everything tied to one loaded model: the scene, the
//! camera, a renderer bound to the canvas, the render loop and the navigation
//! listeners attached to the shared [`InputSurface`].
//!
//! Teardown happens exactly once, either through [`Session::end`] or when the
//! session is dropped. It cancels the render loop, detaches every listener the
//! session attached and disposes the renderer. Callers must end the previous
//! session before starting the next one on the same surface.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use glam::Vec3;
use thiserror::Error;

use crate::camera::Camera;
use crate::geometry::compute_center;
use crate::gpu::RenderError;
use crate::input::{InputSurface, ListenerId};
use crate::marker::{MarkerPlacement, PlacementError, place_marker};
use crate::model::Model;
use crate::navigation::{CameraNavigator, attach_navigation};
use crate::scene::Scene;

/// Draws a scene from a camera. One renderer lives exactly as long as one session.
pub trait Renderer {
    fn render(&mut self, scene: &Scene, camera: &Camera);

    /// Called when the drawing surface changes size.
    fn resize(&mut self, _width: u32, _height: u32) {}

    /// Releases graphics resources. Called once, at session teardown.
    fn dispose(&mut self);
}

/// A drawing target that can produce renderers.
pub trait Canvas {
    type Renderer: Renderer;

    /// Current size in physical pixels.
    fn dimensions(&self) -> (u32, u32);

    fn create_renderer(&self) -> Result<Self::Renderer, RenderError>;
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to bind a renderer to the canvas")]
    Renderer(#[from] RenderError),
}

/// A self-rescheduling frame loop.
///
/// The host calls [`Session::frame`] on every paint and schedules another
/// paint while the loop is running. There is no throttling.
#[derive(Debug, Default)]
pub struct RenderLoop {
    running: bool,
    frames: u64,
}

impl RenderLoop {
    pub fn start(&mut self) {
        self.running = true;
    }

    pub fn cancel(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Frames rendered since the loop started.
    pub fn frames(&self) -> u64 {
        self.frames
    }
}

pub struct Session<R: Renderer> {
    scene: Scene,
    camera: Rc<RefCell<Camera>>,
    renderer: R,
    render_loop: RenderLoop,
    surface: Rc<RefCell<InputSurface>>,
    listeners: Vec<ListenerId>,
    placement: Result<Vec3, PlacementError>,
    ended: bool,
}

impl<R: Renderer> Session<R> {
    /// Builds the scene around `model` and starts rendering and navigation.
    ///
    /// The camera starts at `camera_position` facing the model's center. A
    /// marker search that fails to converge is logged and recorded; the
    /// session still starts, just without a marker.
    pub fn start<C>(
        model: Model,
        camera_position: Vec3,
        canvas: &C,
        surface: Rc<RefCell<InputSurface>>,
    ) -> Result<Self, SessionError>
    where
        C: Canvas<Renderer = R>,
    {
        let renderer = canvas.create_renderer()?;
        Ok(Self::with_renderer(
            model,
            camera_position,
            renderer,
            canvas.dimensions(),
            surface,
        ))
    }

    /// Like [`Session::start`], with a renderer the caller already bound.
    ///
    /// `(width, height)` sizes the camera aspect.
    pub fn with_renderer(
        model: Model,
        camera_position: Vec3,
        renderer: R,
        (width, height): (u32, u32),
        surface: Rc<RefCell<InputSurface>>,
    ) -> Self {
        let center = compute_center(&model);
        let placement = MarkerPlacement::default().find(&model);
        let name = model.name.clone();

        let mut scene = Scene::new(model);
        match &placement {
            Ok(position) => {
                place_marker(*position, &mut scene);
            }
            Err(err) => log::warn!("{name}: no marker placed: {err}"),
        }

        let camera = Rc::new(RefCell::new(
            Camera::new(width, height)
                .at(camera_position)
                .looking_at(center),
        ));

        let mut render_loop = RenderLoop::default();
        render_loop.start();

        let navigator = Rc::new(RefCell::new(CameraNavigator::new()));
        let listeners = attach_navigation(&mut surface.borrow_mut(), navigator, camera.clone());

        log::info!(
            "session started for {name} ({width}x{height}, camera at {camera_position}, center {center})"
        );

        Self {
            scene,
            camera,
            renderer,
            render_loop,
            surface,
            listeners,
            placement,
            ended: false,
        }
    }

    /// Renders one frame. Returns whether another frame should be scheduled.
    pub fn frame(&mut self) -> bool {
        if !self.render_loop.running {
            return false;
        }
        let camera = *self.camera.borrow();
        self.renderer.render(&self.scene, &camera);
        self.render_loop.frames += 1;
        true
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.renderer.resize(width, height);
    }

    /// Ends the session and hands the model back.
    pub fn end(mut self) -> Option<Model> {
        self.teardown();
        self.scene.take_model()
    }

    fn teardown(&mut self) {
        if self.ended {
            return;
        }
        self.ended = true;
        self.render_loop.cancel();

        let mut surface = self.surface.borrow_mut();
        for id in self.listeners.drain(..) {
            surface.detach(id);
        }
        drop(surface);

        self.renderer.dispose();
        log::info!("session ended after {} frames", self.render_loop.frames);
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    /// A snapshot of the camera pose.
    pub fn camera(&self) -> Camera {
        *self.camera.borrow()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn placement(&self) -> &Result<Vec3, PlacementError> {
        &self.placement
    }

    pub fn marker_position(&self) -> Option<Vec3> {
        self.placement.as_ref().ok().copied()
    }

    pub fn render_loop(&self) -> &RenderLoop {
        &self.render_loop
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<R: Renderer> Drop for Session<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Counters shared between a [`RecordingRenderer`] and whoever inspects it.
#[derive(Clone, Debug, Default)]
pub struct RenderStats {
    pub created: Rc<Cell<u32>>,
    pub frames: Rc<Cell<u32>>,
    pub disposed: Rc<Cell<u32>>,
    pub resized: Rc<Cell<u32>>,
}

/// A renderer that only counts calls.
#[derive(Debug)]
pub struct RecordingRenderer {
    stats: RenderStats,
    /// Markers seen in the last rendered scene.
    pub last_marker_count: usize,
}

impl Renderer for RecordingRenderer {
    fn render(&mut self, scene: &Scene, _camera: &Camera) {
        self.stats.frames.set(self.stats.frames.get() + 1);
        self.last_marker_count = scene.marker_count();
    }

    fn resize(&mut self, _width: u32, _height: u32) {
        self.stats.resized.set(self.stats.resized.get() + 1);
    }

    fn dispose(&mut self) {
        self.stats.disposed.set(self.stats.disposed.get() + 1);
    }
}

/// A GPU-free canvas for tests and tooling.
#[derive(Clone, Debug, Default)]
pub struct HeadlessCanvas {
    pub width: u32,
    pub height: u32,
    pub stats: RenderStats,
    /// When set, [`Canvas::create_renderer`] fails as if no surface format were available.
    pub unavailable: Rc<Cell<bool>>,
}

impl HeadlessCanvas {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            stats: RenderStats::default(),
            unavailable: Rc::new(Cell::new(false)),
        }
    }
}

impl Canvas for HeadlessCanvas {
    type Renderer = RecordingRenderer;

    fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn create_renderer(&self) -> Result<RecordingRenderer, RenderError> {
        if self.unavailable.get() {
            return Err(RenderError::NoSurfaceFormat);
        }
        self.stats.created.set(self.stats.created.get() + 1);
        Ok(RecordingRenderer {
            stats: self.stats.clone(),
            last_marker_count: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RawGeometry;
    use crate::input::{InputEvent, PointerButton};
    use crate::model::MeshPart;

    fn cube() -> Model {
        Model::new("cube", vec![MeshPart::new("cube", RawGeometry::cube(1.0))])
    }

    fn start(
        canvas: &HeadlessCanvas,
        surface: &Rc<RefCell<InputSurface>>,
    ) -> Session<RecordingRenderer> {
        Session::start(cube(), Vec3::splat(5.0), canvas, surface.clone()).unwrap()
    }

    #[test]
    fn start_places_one_marker_and_aims_camera() {
        let canvas = HeadlessCanvas::new(800, 600);
        let surface = Rc::new(RefCell::new(InputSurface::new()));
        let session = start(&canvas, &surface);

        assert_eq!(session.scene().marker_count(), 1);
        let marker = session.marker_position().unwrap();
        assert!(marker.z > 0.5 && marker.z < 0.7);

        let camera = session.camera();
        let expected = (Vec3::ZERO - Vec3::splat(5.0)).normalize();
        assert!((camera.forward() - expected).length() < 1e-4);
        assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
        assert!(session.render_loop().is_running());
    }

    #[test]
    fn frames_render_until_end() {
        let canvas = HeadlessCanvas::new(64, 64);
        let surface = Rc::new(RefCell::new(InputSurface::new()));
        let mut session = start(&canvas, &surface);

        assert!(session.frame());
        assert!(session.frame());
        assert_eq!(canvas.stats.frames.get(), 2);
        assert_eq!(session.renderer().last_marker_count, 1);
        assert_eq!(session.render_loop().frames(), 2);

        let model = session.end().unwrap();
        assert_eq!(model.name, "cube");
        assert_eq!(canvas.stats.disposed.get(), 1);
    }

    #[test]
    fn end_detaches_every_listener() {
        let canvas = HeadlessCanvas::new(64, 64);
        let surface = Rc::new(RefCell::new(InputSurface::new()));
        let session = start(&canvas, &surface);
        assert!(session.listener_count() > 0);
        assert_eq!(surface.borrow().listener_count(), session.listener_count());

        session.end();
        assert_eq!(surface.borrow().listener_count(), 0);
    }

    #[test]
    fn drop_tears_down_exactly_once() {
        let canvas = HeadlessCanvas::new(64, 64);
        let surface = Rc::new(RefCell::new(InputSurface::new()));
        {
            let _session = start(&canvas, &surface);
        }
        assert_eq!(canvas.stats.disposed.get(), 1);
        assert_eq!(surface.borrow().listener_count(), 0);

        start(&canvas, &surface).end();
        assert_eq!(canvas.stats.disposed.get(), 2);
    }

    #[test]
    fn swap_leaves_only_new_session_listening() {
        let canvas = HeadlessCanvas::new(64, 64);
        let surface = Rc::new(RefCell::new(InputSurface::new()));

        let first = start(&canvas, &surface);
        let per_session = surface
            .borrow_mut()
            .dispatch(&InputEvent::Wheel { delta: 1.0 })
            .handlers_invoked;
        assert_eq!(per_session, 1);

        first.end();
        let second = start(&canvas, &surface);
        let after_swap = surface
            .borrow_mut()
            .dispatch(&InputEvent::Wheel { delta: 1.0 })
            .handlers_invoked;
        assert_eq!(after_swap, per_session);
        assert_eq!(surface.borrow().listener_count(), second.listener_count());
    }

    #[test]
    fn input_moves_session_camera() {
        let canvas = HeadlessCanvas::new(64, 64);
        let surface = Rc::new(RefCell::new(InputSurface::new()));
        let session = start(&canvas, &surface);
        let before = session.camera();

        let mut s = surface.borrow_mut();
        s.dispatch(&InputEvent::PointerDown {
            button: PointerButton::Primary,
            x: 0.0,
            y: 0.0,
        });
        s.dispatch(&InputEvent::PointerMove { x: 10.0, y: 0.0 });
        drop(s);

        let after = session.camera();
        assert!((after.rotation.y - (before.rotation.y - 0.01)).abs() < 1e-5);
    }

    #[test]
    fn unavailable_canvas_fails_start_without_listeners() {
        let canvas = HeadlessCanvas::new(64, 64);
        canvas.unavailable.set(true);
        let surface = Rc::new(RefCell::new(InputSurface::new()));

        let result = Session::start(cube(), Vec3::splat(5.0), &canvas, surface.clone());
        assert!(matches!(result, Err(SessionError::Renderer(_))));
        assert_eq!(surface.borrow().listener_count(), 0);
        assert_eq!(canvas.stats.created.get(), 0);
    }

    #[test]
    fn placement_failure_still_starts_session() {
        let canvas = HeadlessCanvas::new(64, 64);
        let surface = Rc::new(RefCell::new(InputSurface::new()));
        // Far taller than the default search can climb.
        let mut tall = Model::new(
            "tower",
            vec![MeshPart::new("tower", RawGeometry::cube(1.0))],
        );
        tall.transform.scale = Vec3::new(1.0, 1.0, 5000.0);

        let mut session = Session::start(tall, Vec3::splat(5.0), &canvas, surface).unwrap();
        assert!(matches!(
            session.placement(),
            Err(PlacementError::NoConvergence { .. })
        ));
        assert_eq!(session.scene().marker_count(), 0);
        assert!(session.frame());
    }
}
