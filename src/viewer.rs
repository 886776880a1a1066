//! The viewer: format selection, model loading, and session replacement.
//!
//! [`Viewer`] is what a UI layer talks to. It owns the shared
//! [`InputSurface`], the loader table and at most one live [`Session`]. Any
//! change of model or of the initial camera coordinates ends the current
//! session before the next one starts.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use thiserror::Error;

use crate::console::{self, Axis, CameraCoordinates, Direction};
use crate::input::{Dispatch, InputEvent, InputSurface};
use crate::loader::{DecodeError, FormatTag, LoaderRegistry};
use crate::model::Model;
use crate::session::{Canvas, Session, SessionError};

#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub struct Viewer<C: Canvas> {
    canvas: C,
    surface: Rc<RefCell<InputSurface>>,
    loaders: LoaderRegistry,
    format: FormatTag,
    camera_position: Vec3,
    session: Option<Session<C::Renderer>>,
    /// Model whose session could not start, kept for the next restart.
    retained: Option<Model>,
}

impl<C: Canvas> Viewer<C> {
    pub fn new(canvas: C) -> Self {
        Self {
            canvas,
            surface: Rc::new(RefCell::new(InputSurface::new())),
            loaders: LoaderRegistry::new(),
            format: FormatTag::Gltf,
            camera_position: CameraCoordinates::default().to_vec3(),
            session: None,
            retained: None,
        }
    }

    pub fn with_loaders(mut self, loaders: LoaderRegistry) -> Self {
        self.loaders = loaders;
        self
    }

    pub fn with_format(mut self, format: FormatTag) -> Self {
        self.format = format;
        self
    }

    pub fn with_camera_position(mut self, position: Vec3) -> Self {
        self.camera_position = position;
        self
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn loaders(&self) -> &LoaderRegistry {
        &self.loaders
    }

    pub fn format(&self) -> FormatTag {
        self.format
    }

    pub fn select_format(&mut self, format: FormatTag) {
        if self.format != format {
            log::info!("upload format set to {format}");
        }
        self.format = format;
    }

    pub fn camera_position(&self) -> Vec3 {
        self.camera_position
    }

    pub fn session(&self) -> Option<&Session<C::Renderer>> {
        self.session.as_ref()
    }

    pub fn surface(&self) -> &Rc<RefCell<InputSurface>> {
        &self.surface
    }

    /// Decodes `bytes` with the selected format without touching the session.
    pub fn decode(&self, bytes: &[u8], name: &str) -> Result<Model, DecodeError> {
        self.loaders.load(self.format, bytes, name)
    }

    /// Decodes and shows a model.
    ///
    /// On a decode error the current session, if any, stays up.
    pub fn load(&mut self, bytes: &[u8], name: &str) -> Result<(), ViewerError> {
        let model = self.decode(bytes, name)?;
        self.show_model(model)?;
        Ok(())
    }

    /// Replaces the current session with one built around `model`.
    ///
    /// If no renderer can be bound the model is kept, so a later
    /// [`Viewer::set_initial_camera_position`] can retry with it.
    pub fn show_model(&mut self, model: Model) -> Result<(), SessionError> {
        self.end_session();
        let renderer = match self.canvas.create_renderer() {
            Ok(renderer) => renderer,
            Err(err) => {
                log::warn!("{}: renderer unavailable, keeping model", model.name);
                self.retained = Some(model);
                return Err(err.into());
            }
        };
        self.session = Some(Session::with_renderer(
            model,
            self.camera_position,
            renderer,
            self.canvas.dimensions(),
            self.surface.clone(),
        ));
        Ok(())
    }

    /// True when a model is loaded, whether or not its session is running.
    pub fn has_model(&self) -> bool {
        self.session.is_some() || self.retained.is_some()
    }

    /// Sets the initial camera position from three text fields and restarts
    /// the session with the current model.
    ///
    /// Malformed fields become 0.
    pub fn set_initial_camera_position(
        &mut self,
        x: &str,
        y: &str,
        z: &str,
    ) -> Result<(), SessionError> {
        self.camera_position = CameraCoordinates::parse(x, y, z).to_vec3();
        match self.end_session() {
            Some(model) => self.show_model(model),
            None => Ok(()),
        }
    }

    /// Ends the current session, returning its model.
    ///
    /// Without a session, hands back the model kept from a failed start.
    pub fn end_session(&mut self) -> Option<Model> {
        match self.session.take() {
            Some(session) => {
                self.retained = None;
                session.end()
            }
            None => self.retained.take(),
        }
    }

    fn with_model(&mut self, edit: impl FnOnce(&mut Model)) -> bool {
        match self
            .session
            .as_mut()
            .and_then(|s| s.scene_mut().model_mut())
        {
            Some(model) => {
                edit(model);
                true
            }
            None => false,
        }
    }

    /// Returns false when no model is loaded.
    pub fn rotate_model(&mut self, axis: Axis, direction: Direction) -> bool {
        self.with_model(|m| console::rotate_by(m, axis, direction))
    }

    pub fn translate_model(&mut self, axis: Axis, direction: Direction) -> bool {
        self.with_model(|m| console::translate_by(m, axis, direction))
    }

    pub fn recolor_model(&mut self, seed: u32) -> bool {
        self.with_model(|m| console::recolor(m, seed))
    }

    /// Renders one frame of the current session.
    pub fn frame(&mut self) -> bool {
        self.session.as_mut().is_some_and(|s| s.frame())
    }

    /// Resizes the drawing surface. The camera aspect is left as it was.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(session) = self.session.as_mut() {
            session.resize(width, height);
        }
    }

    pub fn dispatch(&mut self, event: &InputEvent) -> Dispatch {
        self.surface.borrow_mut().dispatch(event)
    }

    pub fn shutdown(&mut self) {
        self.end_session();
    }
}
