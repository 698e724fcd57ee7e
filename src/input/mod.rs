//! Keyboard and mouse state for the fly camera and debug shortcuts.
//!
//! Held keys drive movement every frame; debug toggles fire once per press
//! through [`InputState::take_pressed`].

use rustc_hash::FxHashSet;
use winit::event::ElementState;
pub use winit::keyboard::KeyCode;

use crate::camera::Movement;

#[derive(Debug, Default)]
pub struct InputState {
    held: FxHashSet<KeyCode>,
    /// Presses not yet consumed, in arrival order
    pressed: Vec<KeyCode>,
    mouse_delta: (f32, f32),
    cursor_locked: bool,
    last_mouse_pos: Option<(f32, f32)>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn process_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                // Key repeat arrives as more presses of a held key
                if self.held.insert(key) {
                    self.pressed.push(key);
                }
            }
            ElementState::Released => {
                self.held.remove(&key);
            }
        }
    }

    /// Accumulate relative motion; only counted while the cursor is captured
    pub fn process_mouse_motion(&mut self, delta: (f64, f64)) {
        if !self.cursor_locked {
            return;
        }
        // Some X11 setups report absolute positions as raw motion
        if delta.0.abs() > 100.0 || delta.1.abs() > 100.0 {
            let current = (delta.0 as f32, delta.1 as f32);
            if let Some(last) = self.last_mouse_pos {
                let dx = current.0 - last.0;
                let dy = current.1 - last.1;
                if dx.abs() < 100.0 && dy.abs() < 100.0 {
                    self.mouse_delta.0 += dx;
                    self.mouse_delta.1 += dy;
                }
            }
            self.last_mouse_pos = Some(current);
        } else {
            self.mouse_delta.0 += delta.0 as f32;
            self.mouse_delta.1 += delta.1 as f32;
        }
    }

    pub fn is_key_held(&self, key: KeyCode) -> bool {
        self.held.contains(&key)
    }

    pub fn sprint(&self) -> bool {
        self.is_key_held(KeyCode::ShiftLeft) || self.is_key_held(KeyCode::ShiftRight)
    }

    pub fn crawl(&self) -> bool {
        self.is_key_held(KeyCode::ControlLeft) || self.is_key_held(KeyCode::ControlRight)
    }

    /// Camera movements for the keys currently held
    pub fn movements(&self) -> Vec<Movement> {
        [
            (KeyCode::KeyW, Movement::Forward),
            (KeyCode::KeyS, Movement::Backward),
            (KeyCode::KeyA, Movement::Left),
            (KeyCode::KeyD, Movement::Right),
        ]
        .into_iter()
        .filter(|(key, _)| self.is_key_held(*key))
        .map(|(_, movement)| movement)
        .collect()
    }

    /// Drain the presses since the last call
    pub fn take_pressed(&mut self) -> Vec<KeyCode> {
        std::mem::take(&mut self.pressed)
    }

    pub fn take_mouse_delta(&mut self) -> (f32, f32) {
        std::mem::take(&mut self.mouse_delta)
    }

    pub fn set_cursor_locked(&mut self, locked: bool) {
        self.cursor_locked = locked;
        self.last_mouse_pos = None;
        self.mouse_delta = (0.0, 0.0);
    }

    pub fn is_cursor_locked(&self) -> bool {
        self.cursor_locked
    }

    /// Focus loss: forget held keys so nothing stays stuck
    pub fn release_all(&mut self) {
        self.held.clear();
        self.pressed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_presses_fire_once() {
        let mut input = InputState::new();
        input.process_key(KeyCode::KeyM, ElementState::Pressed);
        input.process_key(KeyCode::KeyM, ElementState::Pressed);
        assert_eq!(input.take_pressed(), vec![KeyCode::KeyM]);
        assert!(input.take_pressed().is_empty());

        input.process_key(KeyCode::KeyM, ElementState::Released);
        input.process_key(KeyCode::KeyM, ElementState::Pressed);
        assert_eq!(input.take_pressed(), vec![KeyCode::KeyM]);
    }

    #[test]
    fn held_keys_map_to_movements() {
        let mut input = InputState::new();
        input.process_key(KeyCode::KeyW, ElementState::Pressed);
        input.process_key(KeyCode::KeyD, ElementState::Pressed);
        input.process_key(KeyCode::ShiftLeft, ElementState::Pressed);
        assert_eq!(input.movements(), vec![Movement::Forward, Movement::Right]);
        assert!(input.sprint());
        assert!(!input.crawl());
    }

    #[test]
    fn mouse_motion_needs_capture() {
        let mut input = InputState::new();
        input.process_mouse_motion((3.0, -2.0));
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));

        input.set_cursor_locked(true);
        input.process_mouse_motion((3.0, -2.0));
        input.process_mouse_motion((1.0, 1.0));
        assert_eq!(input.take_mouse_delta(), (4.0, -1.0));
        assert_eq!(input.take_mouse_delta(), (0.0, 0.0));
    }
}
