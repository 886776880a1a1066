//! Raw input events and the window-wide input surface.
//!
//! Windowing events are translated into [`InputEvent`]s by an
//! [`InputTranslator`] and dispatched through an [`InputSurface`]. Listeners
//! are attached per [`EventKind`] and removed by the [`ListenerId`] returned
//! from [`InputSurface::attach`], so a session can take back exactly what it
//! registered.
//!
//! ```
//! use vantage::input::{EventKind, InputEvent, InputSurface, Propagation};
//!
//! let mut surface = InputSurface::new();
//! let id = surface.attach(EventKind::Wheel, Box::new(|_| Propagation::Continue));
//! assert_eq!(surface.dispatch(&InputEvent::Wheel { delta: 1.0 }).handlers_invoked, 1);
//!
//! surface.detach(id);
//! assert_eq!(surface.dispatch(&InputEvent::Wheel { delta: 1.0 }).handlers_invoked, 0);
//! ```

use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

/// Wheel distance reported for one line (notch) of scrolling.
pub const PIXELS_PER_LINE: f32 = 120.0;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
    Other(u16),
}

impl From<MouseButton> for PointerButton {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Self::Primary,
            MouseButton::Right => Self::Secondary,
            MouseButton::Middle => Self::Middle,
            MouseButton::Back => Self::Other(3),
            MouseButton::Forward => Self::Other(4),
            MouseButton::Other(n) => Self::Other(n),
        }
    }
}

/// A keyboard key. Left and right modifier keys collapse into one variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Shift,
    Control,
    Alt,
    Code(KeyCode),
}

impl From<KeyCode> for Key {
    fn from(code: KeyCode) -> Self {
        match code {
            KeyCode::ShiftLeft | KeyCode::ShiftRight => Self::Shift,
            KeyCode::ControlLeft | KeyCode::ControlRight => Self::Control,
            KeyCode::AltLeft | KeyCode::AltRight => Self::Alt,
            other => Self::Code(other),
        }
    }
}

/// A raw input event in window coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum InputEvent {
    PointerDown { button: PointerButton, x: f32, y: f32 },
    PointerUp { button: PointerButton, x: f32, y: f32 },
    PointerMove { x: f32, y: f32 },
    /// Vertical wheel distance. Positive values scroll toward the user.
    Wheel { delta: f32 },
    KeyDown(Key),
    KeyUp(Key),
    /// The platform asked to open a context menu.
    ContextMenu,
}

impl InputEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::PointerDown { .. } => EventKind::PointerDown,
            Self::PointerUp { .. } => EventKind::PointerUp,
            Self::PointerMove { .. } => EventKind::PointerMove,
            Self::Wheel { .. } => EventKind::Wheel,
            Self::KeyDown(_) => EventKind::KeyDown,
            Self::KeyUp(_) => EventKind::KeyUp,
            Self::ContextMenu => EventKind::ContextMenu,
        }
    }
}

/// Discriminant of [`InputEvent`], used to subscribe listeners.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    PointerDown,
    PointerUp,
    PointerMove,
    Wheel,
    KeyDown,
    KeyUp,
    ContextMenu,
}

/// What a listener asks of the host after handling an event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Propagation {
    #[default]
    Continue,
    /// Suppress the platform's default action (e.g. the native context menu).
    PreventDefault,
}

/// Handle to an attached listener. Never reused within one surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&InputEvent) -> Propagation>;

/// Result of dispatching one event.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Dispatch {
    pub handlers_invoked: usize,
    pub default_prevented: bool,
}

/// The window-wide event target listeners attach to.
#[derive(Default)]
pub struct InputSurface {
    next_id: u64,
    listeners: Vec<(ListenerId, EventKind, Listener)>,
}

impl InputSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach(&mut self, kind: EventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, kind, listener));
        log::debug!("attached {kind:?} listener {id:?}");
        id
    }

    /// Removes a listener. Returns false if the id is not attached.
    pub fn detach(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(attached, _, _)| *attached != id);
        let removed = self.listeners.len() != before;
        if removed {
            log::debug!("detached listener {id:?}");
        }
        removed
    }

    /// Calls every listener subscribed to the event's kind, in attach order.
    pub fn dispatch(&mut self, event: &InputEvent) -> Dispatch {
        let kind = event.kind();
        let mut result = Dispatch::default();
        for (_, _, listener) in self.listeners.iter_mut().filter(|(_, k, _)| *k == kind) {
            result.handlers_invoked += 1;
            if listener(event) == Propagation::PreventDefault {
                result.default_prevented = true;
            }
        }
        result
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn listener_count_for(&self, kind: EventKind) -> usize {
        self.listeners.iter().filter(|(_, k, _)| *k == kind).count()
    }
}

/// Turns winit window events into [`InputEvent`]s.
///
/// winit reports button presses without a position, so the translator keeps
/// the last cursor position and stamps it onto pointer events.
#[derive(Default)]
pub struct InputTranslator {
    cursor: Vec2,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known cursor position in window coordinates.
    pub fn cursor(&self) -> Vec2 {
        self.cursor
    }

    /// Translate a window event. Events the viewer doesn't use yield nothing.
    pub fn translate(&mut self, event: &WindowEvent) -> Vec<InputEvent> {
        match event {
            WindowEvent::CursorMoved { position, .. } => {
                vec![self.cursor_moved(position.x as f32, position.y as f32)]
            }
            WindowEvent::MouseInput { state, button, .. } => self.mouse_button(*state, *button),
            WindowEvent::MouseWheel { delta, .. } => vec![self.wheel(*delta)],
            WindowEvent::KeyboardInput { event, .. } => match event.physical_key {
                PhysicalKey::Code(code) if !event.repeat => vec![self.key(code, event.state)],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }

    pub fn cursor_moved(&mut self, x: f32, y: f32) -> InputEvent {
        self.cursor = Vec2::new(x, y);
        InputEvent::PointerMove { x, y }
    }

    /// A secondary press also raises [`InputEvent::ContextMenu`], as desktop
    /// platforms do.
    pub fn mouse_button(&mut self, state: ElementState, button: MouseButton) -> Vec<InputEvent> {
        let button = PointerButton::from(button);
        let Vec2 { x, y } = self.cursor;
        match state {
            ElementState::Pressed if button == PointerButton::Secondary => vec![
                InputEvent::PointerDown { button, x, y },
                InputEvent::ContextMenu,
            ],
            ElementState::Pressed => vec![InputEvent::PointerDown { button, x, y }],
            ElementState::Released => vec![InputEvent::PointerUp { button, x, y }],
        }
    }

    /// winit reports positive values when scrolling away from the user; the
    /// viewer uses the opposite sign, in pixels.
    pub fn wheel(&mut self, delta: MouseScrollDelta) -> InputEvent {
        let delta = match delta {
            MouseScrollDelta::LineDelta(_, y) => -y * PIXELS_PER_LINE,
            MouseScrollDelta::PixelDelta(pos) => -pos.y as f32,
        };
        InputEvent::Wheel { delta }
    }

    pub fn key(&mut self, code: KeyCode, state: ElementState) -> InputEvent {
        match state {
            ElementState::Pressed => InputEvent::KeyDown(code.into()),
            ElementState::Released => InputEvent::KeyUp(code.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    fn counter(count: &Rc<Cell<u32>>) -> Listener {
        let count = count.clone();
        Box::new(move |_| {
            count.set(count.get() + 1);
            Propagation::Continue
        })
    }

    #[test]
    fn dispatch_reaches_only_matching_kind() {
        let mut surface = InputSurface::new();
        let wheels = Rc::new(Cell::new(0));
        let moves = Rc::new(Cell::new(0));
        surface.attach(EventKind::Wheel, counter(&wheels));
        surface.attach(EventKind::PointerMove, counter(&moves));

        let result = surface.dispatch(&InputEvent::Wheel { delta: -120.0 });
        assert_eq!(result.handlers_invoked, 1);
        assert_eq!(wheels.get(), 1);
        assert_eq!(moves.get(), 0);
    }

    #[test]
    fn detach_removes_exactly_one_listener() {
        let mut surface = InputSurface::new();
        let count = Rc::new(Cell::new(0));
        let first = surface.attach(EventKind::KeyDown, counter(&count));
        surface.attach(EventKind::KeyDown, counter(&count));

        assert!(surface.detach(first));
        assert!(!surface.detach(first));
        surface.dispatch(&InputEvent::KeyDown(Key::Shift));
        assert_eq!(count.get(), 1);
        assert_eq!(surface.listener_count(), 1);
    }

    #[test]
    fn listener_ids_are_not_reused() {
        let mut surface = InputSurface::new();
        let a = surface.attach(EventKind::Wheel, Box::new(|_| Propagation::Continue));
        surface.detach(a);
        let b = surface.attach(EventKind::Wheel, Box::new(|_| Propagation::Continue));
        assert_ne!(a, b);
        assert!(!surface.detach(a));
        assert_eq!(surface.listener_count_for(EventKind::Wheel), 1);
    }

    #[test]
    fn prevent_default_is_reported() {
        let mut surface = InputSurface::new();
        surface.attach(EventKind::ContextMenu, Box::new(|_| Propagation::PreventDefault));
        let result = surface.dispatch(&InputEvent::ContextMenu);
        assert!(result.default_prevented);
        assert!(!surface.dispatch(&InputEvent::Wheel { delta: 1.0 }).default_prevented);
    }

    #[test]
    fn buttons_carry_last_cursor_position() {
        let mut translator = InputTranslator::new();
        translator.cursor_moved(12.0, 34.0);
        let events = translator.mouse_button(ElementState::Pressed, MouseButton::Left);
        assert_eq!(
            events,
            vec![InputEvent::PointerDown {
                button: PointerButton::Primary,
                x: 12.0,
                y: 34.0
            }]
        );
    }

    #[test]
    fn secondary_press_requests_context_menu() {
        let mut translator = InputTranslator::new();
        let events = translator.mouse_button(ElementState::Pressed, MouseButton::Right);
        assert_eq!(events.len(), 2);
        assert_eq!(events[1], InputEvent::ContextMenu);
    }

    #[test]
    fn wheel_sign_follows_page_convention() {
        let mut translator = InputTranslator::new();
        // Scrolling away from the user
        assert_eq!(
            translator.wheel(MouseScrollDelta::LineDelta(0.0, 1.0)),
            InputEvent::Wheel { delta: -PIXELS_PER_LINE }
        );
        let pixel = winit::dpi::PhysicalPosition::new(0.0, -30.0);
        assert_eq!(
            translator.wheel(MouseScrollDelta::PixelDelta(pixel)),
            InputEvent::Wheel { delta: 30.0 }
        );
    }

    #[test]
    fn left_and_right_shift_are_one_key() {
        let mut translator = InputTranslator::new();
        assert_eq!(
            translator.key(KeyCode::ShiftRight, ElementState::Pressed),
            InputEvent::KeyDown(Key::Shift)
        );
        assert_eq!(
            translator.key(KeyCode::ShiftLeft, ElementState::Released),
            InputEvent::KeyUp(Key::Shift)
        );
        assert_eq!(Key::from(KeyCode::KeyQ), Key::Code(KeyCode::KeyQ));
    }
}
