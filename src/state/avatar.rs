//! Avatar model, transform and pose store.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::rig::Vec3;

pub const DEFAULT_POSITION: Vec3 = Vec3::new(-0.20, 0.50, -1.60);
pub const DEFAULT_ROTATION: Vec3 = Vec3::ZERO;
pub const DEFAULT_SCALE: f32 = 1.0;

/// Root transform of the avatar in world space. Rotation is in radians.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AvatarTransform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: f32,
}

impl Default for AvatarTransform {
    fn default() -> Self {
        Self {
            position: DEFAULT_POSITION,
            rotation: DEFAULT_ROTATION,
            scale: DEFAULT_SCALE,
        }
    }
}

/// Full-body gesture. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvatarPose {
    #[default]
    Idle,
    Dancing,
    Jumping,
    Waving,
}

impl AvatarPose {
    /// Fold independent gesture toggles into one pose.
    /// Dancing wins over jumping, jumping over waving.
    pub fn from_flags(dancing: bool, jumping: bool, waving: bool) -> Self {
        if dancing {
            Self::Dancing
        } else if jumping {
            Self::Jumping
        } else if waving {
            Self::Waving
        } else {
            Self::Idle
        }
    }
}

impl std::fmt::Display for AvatarPose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Dancing => write!(f, "dancing"),
            Self::Jumping => write!(f, "jumping"),
            Self::Waving => write!(f, "waving"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarState {
    pub model_id: String,
    pub transform: AvatarTransform,
    pub pose: AvatarPose,
}

/// Single-writer store for [`AvatarState`]. Subscribers are woken on change.
#[derive(Debug)]
pub struct AvatarStore {
    tx: watch::Sender<AvatarState>,
}

impl AvatarStore {
    pub fn new(model_id: impl Into<String>) -> Self {
        let (tx, _) = watch::channel(AvatarState {
            model_id: model_id.into(),
            transform: AvatarTransform::default(),
            pose: AvatarPose::Idle,
        });
        Self { tx }
    }

    pub fn get(&self) -> AvatarState {
        self.tx.borrow().clone()
    }

    pub fn transform(&self) -> AvatarTransform {
        self.tx.borrow().transform
    }

    pub fn pose(&self) -> AvatarPose {
        self.tx.borrow().pose
    }

    pub fn subscribe(&self) -> watch::Receiver<AvatarState> {
        self.tx.subscribe()
    }

    /// Returns false when the model was already selected.
    pub fn set_model(&self, model_id: &str) -> bool {
        self.tx.send_if_modified(|s| {
            if s.model_id == model_id {
                return false;
            }
            s.model_id = model_id.to_string();
            true
        })
    }

    pub fn set_position(&self, position: Vec3) {
        self.modify_transform(|t| t.position = position);
    }

    /// Move the avatar by `offset` in world units.
    pub fn translate(&self, offset: Vec3) {
        self.modify_transform(|t| {
            t.position.x += offset.x;
            t.position.y += offset.y;
            t.position.z += offset.z;
        });
    }

    pub fn set_rotation(&self, rotation: Vec3) {
        self.modify_transform(|t| t.rotation = rotation);
    }

    /// Negative scales are clamped to 0.
    pub fn set_scale(&self, scale: f32) {
        self.modify_transform(|t| t.scale = scale.max(0.0));
    }

    pub fn reset_transform(&self) {
        self.modify_transform(|t| *t = AvatarTransform::default());
    }

    pub fn set_pose(&self, pose: AvatarPose) {
        self.tx.send_if_modified(|s| {
            let changed = s.pose != pose;
            s.pose = pose;
            changed
        });
    }

    fn modify_transform(&self, f: impl FnOnce(&mut AvatarTransform)) {
        self.tx.send_if_modified(|s| {
            let before = s.transform;
            f(&mut s.transform);
            s.transform != before
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transform() {
        let store = AvatarStore::new("carlotta.vrm");
        let t = store.transform();
        assert_eq!(t.position, Vec3::new(-0.20, 0.50, -1.60));
        assert_eq!(t.rotation, Vec3::ZERO);
        assert_eq!(t.scale, 1.0);
        assert_eq!(store.pose(), AvatarPose::Idle);
    }

    #[test]
    fn test_pose_flag_priority() {
        assert_eq!(AvatarPose::from_flags(true, true, true), AvatarPose::Dancing);
        assert_eq!(AvatarPose::from_flags(false, true, true), AvatarPose::Jumping);
        assert_eq!(AvatarPose::from_flags(false, false, true), AvatarPose::Waving);
        assert_eq!(AvatarPose::from_flags(false, false, false), AvatarPose::Idle);
    }

    #[test]
    fn test_scale_clamped_and_reset_restores_default() {
        let store = AvatarStore::new("carlotta.vrm");
        store.set_scale(-2.0);
        assert_eq!(store.transform().scale, 0.0);
        store.set_rotation(Vec3::new(0.0, 1.2, 0.0));
        store.translate(Vec3::new(0.1, 0.0, -0.1));
        store.reset_transform();
        assert_eq!(store.transform(), AvatarTransform::default());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let store = AvatarStore::new("carlotta.vrm");
        let mut rx = store.subscribe();
        assert!(!store.set_model("carlotta.vrm"));
        assert!(!rx.has_changed().unwrap());

        assert!(store.set_model("phoebe.vrm"));
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow_and_update().model_id, "phoebe.vrm");

        store.set_pose(AvatarPose::Waving);
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().pose, AvatarPose::Waving);
    }
}
