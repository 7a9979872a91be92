//! Keyboard and mouse bindings for the camera.
//!
//! | input | action |
//! |-------|--------|
//! | W / S | forward / back |
//! | A / D | left / right |
//! | Shift / Ctrl | up / down |
//! | Q / E | roll |
//! | right mouse drag | look |
//! | wheel | zoom (orbit) |
//! | T | cycle builtin textures |
//! | Escape | quit |

use glam::{Vec2, Vec3};
use vkpipe_platform::{InputState, KeyCode, MouseButton};
use vkpipe_scene::CameraInput;

/// Swaps every renderable's first texture for the next builtin one.
pub const CYCLE_TEXTURE: KeyCode = KeyCode::KeyT;
pub const QUIT: KeyCode = KeyCode::Escape;

/// Largest per-frame cursor movement passed to the camera, in pixels.
pub const MAX_MOUSE_DELTA: f32 = 100.0;

/// `1.0` when only a positive key is held, `-1.0` when only a negative one is.
fn axis(input: &InputState, positive: &[KeyCode], negative: &[KeyCode]) -> f32 {
    let held = |keys: &[KeyCode]| keys.iter().any(|&key| input.is_key_pressed(key));
    match (held(positive), held(negative)) {
        (true, false) => 1.0,
        (false, true) => -1.0,
        _ => 0.0,
    }
}

/// Samples this frame's camera intent.
pub fn camera_input(input: &InputState) -> CameraInput {
    let (dx, dy) = input.mouse_delta();
    // The press frame's delta includes the jump to where the button went down.
    let looking =
        input.is_mouse_pressed(MouseButton::Right) && !input.is_mouse_just_pressed(MouseButton::Right);

    CameraInput {
        mouse_delta: Vec2::new(dx, dy).clamp(Vec2::splat(-MAX_MOUSE_DELTA), Vec2::splat(MAX_MOUSE_DELTA)),
        looking,
        movement: Vec3::new(
            axis(input, &[KeyCode::KeyD], &[KeyCode::KeyA]),
            axis(
                input,
                &[KeyCode::ShiftLeft, KeyCode::ShiftRight],
                &[KeyCode::ControlLeft, KeyCode::ControlRight],
            ),
            axis(input, &[KeyCode::KeyW], &[KeyCode::KeyS]),
        ),
        roll: axis(input, &[KeyCode::KeyE], &[KeyCode::KeyQ]),
        scroll: input.scroll_delta().1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_input_is_neutral() {
        assert_eq!(camera_input(&InputState::new()), CameraInput::default());
    }

    #[test]
    fn test_movement_axes() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        input.on_key_pressed(KeyCode::KeyA);
        input.on_key_pressed(KeyCode::ShiftLeft);
        let sampled = camera_input(&input);
        assert_eq!(sampled.movement, Vec3::new(-1.0, 1.0, 1.0));
    }

    #[test]
    fn test_opposing_keys_cancel() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyW);
        input.on_key_pressed(KeyCode::KeyS);
        input.on_key_pressed(KeyCode::KeyQ);
        input.on_key_pressed(KeyCode::KeyE);
        let sampled = camera_input(&input);
        assert_eq!(sampled.movement.z, 0.0);
        assert_eq!(sampled.roll, 0.0);
    }

    #[test]
    fn test_roll_direction() {
        let mut input = InputState::new();
        input.on_key_pressed(KeyCode::KeyQ);
        assert_eq!(camera_input(&input).roll, -1.0);
    }

    #[test]
    fn test_looking_skips_press_frame() {
        let mut input = InputState::new();
        input.on_mouse_pressed(MouseButton::Right);
        assert!(!camera_input(&input).looking);

        input.begin_frame();
        assert!(camera_input(&input).looking);
    }

    #[test]
    fn test_mouse_delta_clamped() {
        let mut input = InputState::new();
        input.on_mouse_moved(0.0, 0.0);
        input.on_mouse_moved(500.0, -20.0);
        let sampled = camera_input(&input);
        assert_eq!(sampled.mouse_delta, Vec2::new(MAX_MOUSE_DELTA, -20.0));
    }
}
