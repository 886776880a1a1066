//! Mouse and wheel camera navigation.
//!
//! [`CameraNavigator`] is a small state machine over [`InputEvent`]s:
//!
//! | Input                       | Effect                                  |
//! |-----------------------------|-----------------------------------------|
//! | primary drag                | pitch and yaw (`rotation.x`, `rotation.y`) |
//! | secondary drag              | pan along world X and Y                 |
//! | wheel                       | move along world Z                      |
//! | wheel with Shift held       | move along world Y                      |
//! | context menu                | always suppressed                       |
//!
//! Both buttons may be held at once; rotation and pan then apply in the same
//! move. Nothing is clamped.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec2;

use crate::camera::Camera;
use crate::input::{EventKind, InputEvent, InputSurface, Key, ListenerId, PointerButton, Propagation};

/// Per-axis scale factors applied to raw input deltas.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sensitivity {
    /// Radians per pixel of primary drag.
    pub rotate: f32,
    /// World units per pixel of secondary drag.
    pub pan: f32,
    /// World units per wheel pixel along Z.
    pub zoom: f32,
    /// World units per wheel pixel along Y.
    pub height: f32,
    /// Multiplier applied on top of every other factor.
    pub global: f32,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            rotate: 0.01,
            pan: 0.1,
            zoom: 0.1,
            height: 0.1,
            global: 0.1,
        }
    }
}

/// Transient per-session navigation state.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct NavigationState {
    pub left_down: bool,
    pub right_down: bool,
    pub modifier_down: bool,
    /// Pointer position seen by the previous pointer event.
    pub last_pointer: Vec2,
}

impl NavigationState {
    pub fn is_idle(&self) -> bool {
        !self.left_down && !self.right_down
    }
}

/// Applies input events to a [`Camera`].
#[derive(Clone, Debug)]
pub struct CameraNavigator {
    state: NavigationState,
    sensitivity: Sensitivity,
    modifier: Option<Key>,
}

impl Default for CameraNavigator {
    fn default() -> Self {
        Self::new()
    }
}

impl CameraNavigator {
    /// A navigator with the default sensitivities and Shift as height modifier.
    pub fn new() -> Self {
        Self::with_sensitivity(Sensitivity::default())
    }

    pub fn with_sensitivity(sensitivity: Sensitivity) -> Self {
        Self {
            state: NavigationState::default(),
            sensitivity,
            modifier: Some(Key::Shift),
        }
    }

    /// Key that switches the wheel from depth to height.
    pub fn modifier_key(mut self, key: Key) -> Self {
        self.modifier = Some(key);
        self
    }

    pub fn state(&self) -> &NavigationState {
        &self.state
    }

    pub fn sensitivity(&self) -> &Sensitivity {
        &self.sensitivity
    }

    /// Updates the state and the camera for one event.
    pub fn handle(&mut self, event: &InputEvent, camera: &mut Camera) -> Propagation {
        match *event {
            InputEvent::PointerDown { button, x, y } => {
                match button {
                    PointerButton::Primary => self.state.left_down = true,
                    PointerButton::Secondary => self.state.right_down = true,
                    _ => return Propagation::Continue,
                }
                self.state.last_pointer = Vec2::new(x, y);
            }
            InputEvent::PointerUp { button, .. } => match button {
                PointerButton::Primary => self.state.left_down = false,
                PointerButton::Secondary => self.state.right_down = false,
                _ => {}
            },
            InputEvent::PointerMove { x, y } => self.pointer_moved(Vec2::new(x, y), camera),
            InputEvent::Wheel { delta } => self.wheel(delta, camera),
            InputEvent::KeyDown(key) if Some(key) == self.modifier => {
                self.state.modifier_down = true;
            }
            InputEvent::KeyUp(key) if Some(key) == self.modifier => {
                self.state.modifier_down = false;
            }
            InputEvent::KeyDown(_) | InputEvent::KeyUp(_) => {}
            InputEvent::ContextMenu => return Propagation::PreventDefault,
        }
        Propagation::Continue
    }

    fn pointer_moved(&mut self, pointer: Vec2, camera: &mut Camera) {
        let delta = pointer - self.state.last_pointer;
        let s = self.sensitivity;

        if self.state.left_down {
            camera.rotation.x -= delta.y * s.rotate * s.global;
            camera.rotation.y -= delta.x * s.rotate * s.global;
        }
        if self.state.right_down {
            camera.position.x -= delta.x * s.pan * s.global;
            camera.position.y += delta.y * s.pan * s.global;
        }

        self.state.last_pointer = pointer;
    }

    fn wheel(&mut self, delta: f32, camera: &mut Camera) {
        let s = self.sensitivity;
        if self.state.modifier_down {
            camera.position.y += delta * s.height * s.global;
        } else {
            camera.position.z += delta * s.zoom * s.global;
        }
    }
}

/// Every event kind the navigator listens to.
pub const NAVIGATION_EVENTS: [EventKind; 7] = [
    EventKind::PointerDown,
    EventKind::PointerUp,
    EventKind::PointerMove,
    EventKind::Wheel,
    EventKind::KeyDown,
    EventKind::KeyUp,
    EventKind::ContextMenu,
];

/// Attaches one listener per navigation event kind to the surface.
///
/// The returned ids must be handed back to [`InputSurface::detach`] when the
/// session ends.
pub fn attach_navigation(
    surface: &mut InputSurface,
    navigator: Rc<RefCell<CameraNavigator>>,
    camera: Rc<RefCell<Camera>>,
) -> Vec<ListenerId> {
    NAVIGATION_EVENTS
        .iter()
        .map(|&kind| {
            let navigator = navigator.clone();
            let camera = camera.clone();
            surface.attach(
                kind,
                Box::new(move |event| {
                    navigator
                        .borrow_mut()
                        .handle(event, &mut camera.borrow_mut())
                }),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn down(button: PointerButton, x: f32, y: f32) -> InputEvent {
        InputEvent::PointerDown { button, x, y }
    }

    fn up(button: PointerButton) -> InputEvent {
        InputEvent::PointerUp { button, x: 0.0, y: 0.0 }
    }

    fn moved(x: f32, y: f32) -> InputEvent {
        InputEvent::PointerMove { x, y }
    }

    fn run(events: &[InputEvent]) -> Camera {
        let mut navigator = CameraNavigator::new();
        let mut camera = Camera::default();
        for event in events {
            navigator.handle(event, &mut camera);
        }
        camera
    }

    #[test]
    fn left_drag_accumulates_rotation() {
        let camera = run(&[
            down(PointerButton::Primary, 100.0, 100.0),
            moved(110.0, 95.0),
            moved(130.0, 120.0),
        ]);
        // dx = 30, dy = 20 summed over the sequence
        assert!((camera.rotation.y - (-30.0 * 0.01 * 0.1)).abs() < 1e-6);
        assert!((camera.rotation.x - (-20.0 * 0.01 * 0.1)).abs() < 1e-6);
        assert_eq!(camera.position, Vec3::ZERO);
    }

    #[test]
    fn rotation_sum_is_order_independent() {
        let a = run(&[
            down(PointerButton::Primary, 0.0, 0.0),
            moved(5.0, -3.0),
            moved(2.0, 4.0),
            moved(9.0, 1.0),
        ]);
        let b = run(&[
            down(PointerButton::Primary, 0.0, 0.0),
            moved(7.0, 4.0),
            moved(4.0, 1.0),
            moved(9.0, 1.0),
        ]);
        assert!((a.rotation - b.rotation).length() < 1e-6);
        assert!((a.rotation.y - (-9.0 * 0.001)).abs() < 1e-6);
    }

    #[test]
    fn right_drag_pans() {
        let camera = run(&[
            down(PointerButton::Secondary, 10.0, 10.0),
            moved(20.0, 30.0),
        ]);
        assert!((camera.position.x - (-10.0 * 0.1 * 0.1)).abs() < 1e-6);
        assert!((camera.position.y - (20.0 * 0.1 * 0.1)).abs() < 1e-6);
        assert_eq!(camera.rotation, Vec3::ZERO);
    }

    #[test]
    fn both_buttons_rotate_and_pan_together() {
        let camera = run(&[
            down(PointerButton::Primary, 0.0, 0.0),
            down(PointerButton::Secondary, 0.0, 0.0),
            moved(10.0, 0.0),
        ]);
        assert!(camera.rotation.y < 0.0);
        assert!(camera.position.x < 0.0);
    }

    #[test]
    fn move_after_release_changes_nothing() {
        let mut navigator = CameraNavigator::new();
        let mut camera = Camera::default();
        for event in [
            down(PointerButton::Primary, 0.0, 0.0),
            down(PointerButton::Secondary, 0.0, 0.0),
            moved(5.0, 5.0),
            up(PointerButton::Primary),
            up(PointerButton::Secondary),
        ] {
            navigator.handle(&event, &mut camera);
        }
        let before = camera;
        navigator.handle(&moved(500.0, -200.0), &mut camera);
        assert_eq!(camera, before);
        assert!(navigator.state().is_idle());
        assert_eq!(navigator.state().last_pointer, Vec2::new(500.0, -200.0));
    }

    #[test]
    fn pointer_move_tracks_position_while_idle() {
        let mut navigator = CameraNavigator::new();
        let mut camera = Camera::default();
        navigator.handle(&moved(50.0, 50.0), &mut camera);
        navigator.handle(&down(PointerButton::Primary, 50.0, 50.0), &mut camera);
        navigator.handle(&moved(60.0, 50.0), &mut camera);
        assert!((camera.rotation.y - (-10.0 * 0.001)).abs() < 1e-6);
    }

    #[test]
    fn wheel_without_modifier_changes_depth_only() {
        let camera = run(&[InputEvent::Wheel { delta: 120.0 }]);
        assert!((camera.position.z - 120.0 * 0.1 * 0.1).abs() < 1e-5);
        assert_eq!(camera.position.y, 0.0);
        assert_eq!(camera.position.x, 0.0);
    }

    #[test]
    fn wheel_with_modifier_changes_height_only() {
        let camera = run(&[
            InputEvent::KeyDown(Key::Shift),
            InputEvent::Wheel { delta: -120.0 },
        ]);
        assert!((camera.position.y + 120.0 * 0.1 * 0.1).abs() < 1e-5);
        assert_eq!(camera.position.z, 0.0);
    }

    #[test]
    fn releasing_modifier_restores_depth() {
        let camera = run(&[
            InputEvent::KeyDown(Key::Shift),
            InputEvent::KeyUp(Key::Shift),
            InputEvent::Wheel { delta: 10.0 },
        ]);
        assert_eq!(camera.position.y, 0.0);
        assert!(camera.position.z > 0.0);
    }

    #[test]
    fn other_keys_do_not_toggle_modifier() {
        let mut navigator = CameraNavigator::new();
        let mut camera = Camera::default();
        navigator.handle(&InputEvent::KeyDown(Key::Control), &mut camera);
        assert!(!navigator.state().modifier_down);
    }

    #[test]
    fn context_menu_is_always_suppressed() {
        let mut navigator = CameraNavigator::new();
        let mut camera = Camera::default();
        assert_eq!(
            navigator.handle(&InputEvent::ContextMenu, &mut camera),
            Propagation::PreventDefault
        );
        assert_eq!(camera, Camera::default());
    }

    #[test]
    fn attached_navigation_drives_shared_camera() {
        let mut surface = InputSurface::new();
        let navigator = Rc::new(RefCell::new(CameraNavigator::new()));
        let camera = Rc::new(RefCell::new(Camera::default()));
        let ids = attach_navigation(&mut surface, navigator, camera.clone());
        assert_eq!(ids.len(), NAVIGATION_EVENTS.len());

        surface.dispatch(&InputEvent::Wheel { delta: 100.0 });
        assert!((camera.borrow().position.z - 1.0).abs() < 1e-5);
        assert!(surface.dispatch(&InputEvent::ContextMenu).default_prevented);
    }
}
