//! Maps window input to engine controls.
//!
//! The engine never sees raw events. [`Controls`] turns them into
//! [`Control`] values the demo loop applies: settings patches, fluid
//! impulses, pause and reset.
//!
//! | input | effect |
//! |-------|--------|
//! | pointer over window | predator follows it |
//! | touch drag | predator follows the finger |
//! | pointer leaves | predator removed |
//! | left drag | impulse into the fluid along the drag |
//! | Space | pause / resume |
//! | R | reset |
//! | W | toggle wrap / clamp |
//! | F | toggle fluid coupling |
//! | C | cycle color mode |
//! | ↑ / ↓ | double / halve agent count (snapped to a square) |

use std::time::Instant;

use glam::Vec2;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::keyboard::{KeyCode, PhysicalKey};

use crate::fluid::Impulse;
use crate::grid::nearest_square;
use crate::settings::{Settings, SettingsPatch, PREDATOR_ABSENT};

/// Drags shorter than this (unit-square distance) produce no direction.
pub const DRAG_DEAD_ZONE: f32 = 0.002;
/// Gaussian width of drag impulses.
pub const DRAG_IMPULSE_RADIUS: f32 = 1e-4;
/// Impulse magnitude per unit of drag speed (unit-square distance per millisecond).
pub const DRAG_IMPULSE_GAIN: f32 = 300.0;

/// Something the demo loop should do in response to input.
#[derive(Clone, Debug, PartialEq)]
pub enum Control {
    Settings(SettingsPatch),
    Impulse(Impulse),
    TogglePause,
    Reset,
}

#[derive(Clone, Copy, Debug)]
struct Drag {
    last_position: Vec2,
    last_time: Instant,
}

/// Pointer and keyboard state needed to derive controls.
#[derive(Debug)]
pub struct Controls {
    window_size: (u32, u32),
    cursor: Option<Vec2>,
    drag: Option<Drag>,
}

impl Controls {
    pub fn new(window_size: (u32, u32)) -> Self {
        Self {
            window_size,
            cursor: None,
            drag: None,
        }
    }

    pub fn set_window_size(&mut self, width: u32, height: u32) {
        self.window_size = (width, height);
    }

    /// Last cursor position in the unit square (y up), if over the window.
    pub fn cursor(&self) -> Option<Vec2> {
        self.cursor
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Translate one window event.
    pub fn handle_event(&mut self, event: &WindowEvent, settings: &Settings) -> Vec<Control> {
        let now = Instant::now();
        match event {
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return Vec::new();
                }
                match event.physical_key {
                    PhysicalKey::Code(key) => key_control(key, settings).into_iter().collect(),
                    PhysicalKey::Unidentified(_) => Vec::new(),
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(Vec2::new(position.x as f32, position.y as f32), now)
            }
            WindowEvent::Touch(touch) => self.touch(
                touch.phase,
                Vec2::new(touch.location.x as f32, touch.location.y as f32),
                now,
            ),
            WindowEvent::CursorLeft { .. } => self.cursor_left(),
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.left_button(*state == ElementState::Pressed, now);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// Pixel position (origin top-left) to unit square (origin bottom-left).
    pub fn to_unit(&self, pixels: Vec2) -> Vec2 {
        let (w, h) = self.window_size;
        let size = Vec2::new(w.max(1) as f32, h.max(1) as f32);
        Vec2::new(pixels.x / size.x, 1.0 - pixels.y / size.y)
    }

    pub fn cursor_moved(&mut self, pixels: Vec2, now: Instant) -> Vec<Control> {
        let position = self.to_unit(pixels);
        self.cursor = Some(position);

        let mut controls = vec![Control::Settings(
            SettingsPatch::new().predator_position(position),
        )];
        if let Some(drag) = self.drag.as_mut() {
            let diff = position - drag.last_position;
            let len = diff.length();
            let direction = if len < DRAG_DEAD_ZONE {
                Vec2::ZERO
            } else {
                diff / len
            };
            let elapsed_ms = (now.duration_since(drag.last_time).as_secs_f32() * 1000.0).max(1.0);
            let magnitude = len / elapsed_ms * DRAG_IMPULSE_GAIN;

            drag.last_position = position;
            drag.last_time = now;
            controls.push(Control::Impulse(Impulse::new(
                position,
                direction,
                DRAG_IMPULSE_RADIUS,
                magnitude,
            )));
        }
        controls
    }

    /// A finger on the window steers the predator like the cursor does.
    pub fn touch(&mut self, phase: TouchPhase, pixels: Vec2, now: Instant) -> Vec<Control> {
        match phase {
            TouchPhase::Started | TouchPhase::Moved => self.cursor_moved(pixels, now),
            TouchPhase::Ended | TouchPhase::Cancelled => Vec::new(),
        }
    }

    pub fn cursor_left(&mut self) -> Vec<Control> {
        self.cursor = None;
        self.drag = None;
        vec![Control::Settings(
            SettingsPatch::new().predator_position(PREDATOR_ABSENT),
        )]
    }

    pub fn left_button(&mut self, pressed: bool, now: Instant) {
        self.drag = match (pressed, self.cursor) {
            (true, Some(position)) => Some(Drag {
                last_position: position,
                last_time: now,
            }),
            _ => None,
        };
    }
}

/// Control bound to `key`, given the settings it toggles.
pub fn key_control(key: KeyCode, settings: &Settings) -> Option<Control> {
    let patch = SettingsPatch::new();
    let control = match key {
        KeyCode::Space => Control::TogglePause,
        KeyCode::KeyR => Control::Reset,
        KeyCode::KeyW => Control::Settings(patch.boundary(settings.boundary.toggled())),
        KeyCode::KeyF => Control::Settings(patch.fluid_enabled(!settings.fluid_enabled)),
        KeyCode::KeyC => Control::Settings(patch.color_mode(settings.color_mode.next())),
        KeyCode::ArrowUp => Control::Settings(
            patch.agent_count(nearest_square(settings.agent_count.saturating_mul(2))),
        ),
        KeyCode::ArrowDown => {
            Control::Settings(patch.agent_count(nearest_square(settings.agent_count / 2)))
        }
        _ => return None,
    };
    Some(control)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{BoundaryMode, ColorMode};
    use std::time::Duration;

    #[test]
    fn test_to_unit_flips_y() {
        let controls = Controls::new((800, 600));
        assert_eq!(controls.to_unit(Vec2::new(0.0, 600.0)), Vec2::ZERO);
        assert_eq!(controls.to_unit(Vec2::new(400.0, 150.0)), Vec2::new(0.5, 0.75));
    }

    #[test]
    fn test_cursor_sets_and_clears_predator() {
        let mut controls = Controls::new((100, 100));
        let moved = controls.cursor_moved(Vec2::new(50.0, 50.0), Instant::now());
        assert_eq!(
            moved,
            vec![Control::Settings(
                SettingsPatch::new().predator_position(Vec2::splat(0.5))
            )]
        );
        let left = controls.cursor_left();
        assert_eq!(
            left,
            vec![Control::Settings(
                SettingsPatch::new().predator_position(PREDATOR_ABSENT)
            )]
        );
        assert!(controls.cursor().is_none());
    }

    #[test]
    fn test_touch_move_steers_predator() {
        let mut controls = Controls::new((200, 100));
        let t0 = Instant::now();
        let moved = controls.touch(TouchPhase::Moved, Vec2::new(50.0, 25.0), t0);
        assert_eq!(
            moved,
            vec![Control::Settings(
                SettingsPatch::new().predator_position(Vec2::new(0.25, 0.75))
            )]
        );
        assert_eq!(controls.cursor(), Some(Vec2::new(0.25, 0.75)));

        let lifted = controls.touch(TouchPhase::Ended, Vec2::new(60.0, 25.0), t0);
        assert!(lifted.is_empty());
        assert_eq!(controls.cursor(), Some(Vec2::new(0.25, 0.75)));
    }

    #[test]
    fn test_drag_emits_impulse() {
        let mut controls = Controls::new((100, 100));
        let t0 = Instant::now();
        controls.cursor_moved(Vec2::new(10.0, 50.0), t0);
        controls.left_button(true, t0);
        let out = controls.cursor_moved(Vec2::new(30.0, 50.0), t0 + Duration::from_millis(10));
        let impulse = out
            .iter()
            .find_map(|c| match c {
                Control::Impulse(i) => Some(*i),
                _ => None,
            })
            .expect("drag should emit an impulse");
        assert_eq!(impulse.direction, Vec2::X);
        assert_eq!(impulse.radius, DRAG_IMPULSE_RADIUS);
        assert!((impulse.magnitude - 0.2 / 10.0 * DRAG_IMPULSE_GAIN).abs() < 1e-3);
    }

    #[test]
    fn test_tiny_drag_has_no_direction() {
        let mut controls = Controls::new((1000, 1000));
        let t0 = Instant::now();
        controls.cursor_moved(Vec2::new(500.0, 500.0), t0);
        controls.left_button(true, t0);
        let out = controls.cursor_moved(Vec2::new(501.0, 500.0), t0 + Duration::from_millis(16));
        assert!(out.iter().any(
            |c| matches!(c, Control::Impulse(i) if i.direction == Vec2::ZERO)
        ));
    }

    #[test]
    fn test_release_ends_drag() {
        let mut controls = Controls::new((100, 100));
        let t0 = Instant::now();
        controls.cursor_moved(Vec2::new(10.0, 10.0), t0);
        controls.left_button(true, t0);
        assert!(controls.is_dragging());
        controls.left_button(false, t0);
        let out = controls.cursor_moved(Vec2::new(90.0, 90.0), t0);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn test_key_bindings() {
        let settings = Settings::default();
        assert_eq!(key_control(KeyCode::Space, &settings), Some(Control::TogglePause));
        assert_eq!(key_control(KeyCode::KeyR, &settings), Some(Control::Reset));
        assert_eq!(
            key_control(KeyCode::KeyW, &settings),
            Some(Control::Settings(SettingsPatch::new().boundary(BoundaryMode::Wrap)))
        );
        assert_eq!(
            key_control(KeyCode::KeyC, &settings),
            Some(Control::Settings(SettingsPatch::new().color_mode(ColorMode::Velocity)))
        );
        assert_eq!(
            key_control(KeyCode::ArrowUp, &settings),
            Some(Control::Settings(SettingsPatch::new().agent_count(121)))
        );
        assert_eq!(
            key_control(KeyCode::ArrowDown, &settings),
            Some(Control::Settings(SettingsPatch::new().agent_count(36)))
        );
        assert_eq!(key_control(KeyCode::KeyQ, &settings), None);
    }
}
