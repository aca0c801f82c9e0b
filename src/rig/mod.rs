//! Humanoid rig abstraction.
//!
//! The renderer owns the actual skinned mesh. On this side a rig is a set of
//! named joints plus expression weights that the animation engine writes every
//! frame and that get shipped back as a [`RigSnapshot`].

pub mod loader;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// Humanoid bones the engine animates. Names follow the VRM humanoid spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Bone {
    Hips,
    Spine,
    Chest,
    Neck,
    Head,
    LeftUpperArm,
    RightUpperArm,
    LeftLowerArm,
    RightLowerArm,
    LeftHand,
    RightHand,
    LeftUpperLeg,
    RightUpperLeg,
}

impl Bone {
    pub const ALL: [Bone; 13] = [
        Bone::Hips,
        Bone::Spine,
        Bone::Chest,
        Bone::Neck,
        Bone::Head,
        Bone::LeftUpperArm,
        Bone::RightUpperArm,
        Bone::LeftLowerArm,
        Bone::RightLowerArm,
        Bone::LeftHand,
        Bone::RightHand,
        Bone::LeftUpperLeg,
        Bone::RightUpperLeg,
    ];
}

/// Local transform of one bone. Rotation is Euler XYZ in radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Joint {
    pub rotation: Vec3,
    pub position: Vec3,
}

impl Joint {
    pub fn reset_rotation(&mut self) {
        self.rotation = Vec3::ZERO;
    }
}

/// Expression presets a standard VRM model exposes.
pub const STANDARD_EXPRESSIONS: [&str; 12] = [
    "aa", "ih", "ou", "ee", "oh", "blink", "neutral", "happy", "angry", "sad", "surprised",
    "relaxed",
];

/// Serializable pose of a rig at one instant.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RigSnapshot {
    pub joints: BTreeMap<Bone, Joint>,
    pub expressions: BTreeMap<String, f32>,
}

/// A posable humanoid. Missing bones and unknown expressions are not errors:
/// `joint_mut` returns `None` and `set_expression` does nothing.
pub trait Rig: Send {
    fn joint_mut(&mut self, bone: Bone) -> Option<&mut Joint>;

    fn expression(&self, name: &str) -> Option<f32>;

    fn set_expression(&mut self, name: &str, weight: f32);

    /// Per-frame hook for secondary motion (spring bones and the like).
    fn update(&mut self, delta: f32);

    fn snapshot(&self) -> RigSnapshot;
}

/// In-memory rig holding only the bones and expressions the model declares.
#[derive(Debug, Clone, Default)]
pub struct HumanoidRig {
    joints: BTreeMap<Bone, Joint>,
    expressions: BTreeMap<String, f32>,
    physics_time: f32,
}

impl HumanoidRig {
    pub fn new<B, E, S>(bones: B, expressions: E) -> Self
    where
        B: IntoIterator<Item = Bone>,
        E: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            joints: bones.into_iter().map(|b| (b, Joint::default())).collect(),
            expressions: expressions.into_iter().map(|e| (e.into(), 0.0)).collect(),
            physics_time: 0.0,
        }
    }

    /// Every bone in [`Bone::ALL`] and every standard expression.
    pub fn standard() -> Self {
        Self::new(Bone::ALL, STANDARD_EXPRESSIONS)
    }

    pub fn joint(&self, bone: Bone) -> Option<&Joint> {
        self.joints.get(&bone)
    }

    /// Seconds of secondary motion simulated so far.
    pub fn physics_time(&self) -> f32 {
        self.physics_time
    }
}

impl Rig for HumanoidRig {
    fn joint_mut(&mut self, bone: Bone) -> Option<&mut Joint> {
        self.joints.get_mut(&bone)
    }

    fn expression(&self, name: &str) -> Option<f32> {
        self.expressions.get(name).copied()
    }

    fn set_expression(&mut self, name: &str, weight: f32) {
        if let Some(w) = self.expressions.get_mut(name) {
            *w = weight;
        }
    }

    fn update(&mut self, delta: f32) {
        self.physics_time += delta.max(0.0);
    }

    fn snapshot(&self) -> RigSnapshot {
        RigSnapshot {
            joints: self.joints.clone(),
            expressions: self.expressions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_rig_has_all_bones() {
        let mut rig = HumanoidRig::standard();
        for bone in Bone::ALL {
            assert!(rig.joint_mut(bone).is_some(), "{:?} missing", bone);
        }
        assert_eq!(rig.expression("aa"), Some(0.0));
    }

    #[test]
    fn test_missing_bone_and_expression_are_noops() {
        let mut rig = HumanoidRig::new([Bone::Hips], ["aa"]);
        assert!(rig.joint_mut(Bone::Head).is_none());
        rig.set_expression("blink", 1.0);
        assert_eq!(rig.expression("blink"), None);
        rig.set_expression("aa", 0.7);
        assert_eq!(rig.expression("aa"), Some(0.7));
    }

    #[test]
    fn test_snapshot_serializes_bone_names() {
        let mut rig = HumanoidRig::new([Bone::LeftUpperArm], Vec::<String>::new());
        rig.joint_mut(Bone::LeftUpperArm).unwrap().rotation.z = 1.0;
        let json = serde_json::to_value(rig.snapshot()).unwrap();
        assert_eq!(json["joints"]["leftUpperArm"]["rotation"]["z"], 1.0);
    }

    #[test]
    fn test_update_accumulates_physics_time() {
        let mut rig = HumanoidRig::standard();
        rig.update(0.5);
        rig.update(-1.0);
        rig.update(0.25);
        assert!((rig.physics_time() - 0.75).abs() < 1e-6);
    }
}
