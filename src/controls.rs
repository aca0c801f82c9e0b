//! Keyboard bindings for nudging the avatar around the scene.

use crate::rig::Vec3;
use crate::state::AvatarStore;

/// World units moved per key press.
pub const MOVE_STEP: f32 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlAction {
    Move(Vec3),
    Reset,
}

/// Map a DOM `KeyboardEvent.key` value to an action.
pub fn action_for_key(key: &str) -> Option<ControlAction> {
    let offset = match key {
        "ArrowLeft" | "a" | "A" => Vec3::new(-MOVE_STEP, 0.0, 0.0),
        "ArrowRight" | "d" | "D" => Vec3::new(MOVE_STEP, 0.0, 0.0),
        "PageUp" | "q" | "Q" => Vec3::new(0.0, MOVE_STEP, 0.0),
        "PageDown" | "e" | "E" => Vec3::new(0.0, -MOVE_STEP, 0.0),
        "ArrowUp" | "w" | "W" => Vec3::new(0.0, 0.0, -MOVE_STEP),
        "ArrowDown" | "s" | "S" => Vec3::new(0.0, 0.0, MOVE_STEP),
        "r" | "R" => return Some(ControlAction::Reset),
        _ => return None,
    };
    Some(ControlAction::Move(offset))
}

/// Apply a key press to the avatar. Ignored while the user is typing in a
/// text field. Returns true if the transform was touched.
pub fn handle_key(store: &AvatarStore, key: &str, typing: bool) -> bool {
    if typing {
        return false;
    }
    match action_for_key(key) {
        Some(ControlAction::Move(offset)) => {
            store.translate(offset);
            true
        }
        Some(ControlAction::Reset) => {
            store.reset_transform();
            true
        }
        None => false,
    }
}
