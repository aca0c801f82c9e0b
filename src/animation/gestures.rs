//! Body posing: idle layering and the full-body gesture overlays.

use std::f32::consts::PI;

use crate::rig::{Bone, Joint, Rig};
use crate::state::AvatarPose;

use super::math::natural_sine;

/// Upper arm Z angle that brings a T-posed model down to a relaxed A-pose.
pub const ARM_REST_Z: f32 = PI / 2.8;
const LOWER_ARM_REST_Z: f32 = 0.15;
/// Beats per second for the dance and jump cycles.
const DANCE_SPEED: f32 = 5.0;
const JUMP_SPEED: f32 = 5.0;
const JUMP_HEIGHT: f32 = 0.5;
const WAVE_SPEED: f32 = 8.0;

fn with_joint(rig: &mut dyn Rig, bone: Bone, f: impl FnOnce(&mut Joint)) {
    if let Some(joint) = rig.joint_mut(bone) {
        f(joint);
    }
}

/// One-time correction applied when a rig is mounted.
pub fn apply_base_pose(rig: &mut dyn Rig) {
    for bone in [Bone::Hips, Bone::LeftUpperLeg, Bone::RightUpperLeg] {
        with_joint(rig, bone, Joint::reset_rotation);
    }
    with_joint(rig, Bone::LeftUpperArm, |j| {
        j.reset_rotation();
        j.rotation.z = ARM_REST_Z;
    });
    with_joint(rig, Bone::RightUpperArm, |j| {
        j.reset_rotation();
        j.rotation.z = -ARM_REST_Z;
    });
    with_joint(rig, Bone::LeftLowerArm, |j| j.rotation.z = -LOWER_ARM_REST_Z);
    with_joint(rig, Bone::RightLowerArm, |j| j.rotation.z = LOWER_ARM_REST_Z);
}

/// Pose the body for time `t` (seconds since start).
pub fn apply_pose(rig: &mut dyn Rig, pose: AvatarPose, t: f32, talk_intensity: f32) {
    match pose {
        AvatarPose::Dancing => dance(rig, t),
        AvatarPose::Jumping => jump(rig, t),
        AvatarPose::Waving => wave(rig, t),
        AvatarPose::Idle => idle(rig, t, talk_intensity),
    }
}

fn dance(rig: &mut dyn Rig, t: f32) {
    let beat = t * DANCE_SPEED;
    let counter = (beat * 0.5 + PI).sin() * 0.05;

    with_joint(rig, Bone::Hips, Joint::reset_rotation);
    for bone in [Bone::Spine, Bone::Chest] {
        with_joint(rig, bone, |j| {
            j.reset_rotation();
            j.rotation.y = counter;
        });
    }
    with_joint(rig, Bone::LeftUpperArm, |j| {
        j.reset_rotation();
        j.rotation.z = PI * 0.4;
        j.rotation.x = beat.sin() * 0.2;
    });
    with_joint(rig, Bone::RightUpperArm, |j| {
        j.reset_rotation();
        j.rotation.z = -PI * 0.4;
        j.rotation.x = beat.sin() * 0.2;
    });
    with_joint(rig, Bone::LeftLowerArm, Joint::reset_rotation);
    with_joint(rig, Bone::RightLowerArm, Joint::reset_rotation);
    with_joint(rig, Bone::Head, |j| {
        j.reset_rotation();
        j.rotation.x = beat.sin().abs() * 0.1;
    });
}

fn jump(rig: &mut dyn Rig, t: f32) {
    let phase = t * JUMP_SPEED;
    with_joint(rig, Bone::Hips, |j| {
        j.reset_rotation();
        // |sin| only ever lifts
        j.position.y = phase.sin().abs() * JUMP_HEIGHT;
    });
    with_joint(rig, Bone::LeftUpperArm, |j| {
        j.reset_rotation();
        j.rotation.z = PI * 0.4;
    });
    with_joint(rig, Bone::RightUpperArm, |j| {
        j.reset_rotation();
        j.rotation.z = -PI * 0.4;
    });
}

fn wave(rig: &mut dyn Rig, t: f32) {
    let phase = t * WAVE_SPEED;
    with_joint(rig, Bone::RightUpperArm, |j| {
        j.reset_rotation();
        j.rotation.z = -PI * 0.8;
        j.rotation.x = PI * 0.1;
    });
    with_joint(rig, Bone::RightLowerArm, |j| {
        j.reset_rotation();
        j.rotation.z = -PI * 0.1 + phase.sin() * 0.2;
    });
    with_joint(rig, Bone::RightHand, |j| {
        j.reset_rotation();
        j.rotation.x = phase.cos() * 0.1;
    });
}

fn idle(rig: &mut dyn Rig, t: f32, talk: f32) {
    let breath = ((t * 0.8).sin() * 0.5 + (t * 0.8 * 0.33).sin() * 0.5) * 0.03;

    // undo whatever a gesture left behind
    with_joint(rig, Bone::Hips, |j| {
        j.reset_rotation();
        j.position.y = 0.0;
    });
    for bone in [Bone::Spine, Bone::Chest] {
        with_joint(rig, bone, |j| {
            j.rotation.y = 0.0;
            j.rotation.z = 0.0;
            j.rotation.x = breath;
        });
    }

    let sway = natural_sine(t, 1.5) * 0.02;
    let lift = talk * 0.15;
    with_joint(rig, Bone::LeftUpperArm, |j| {
        j.rotation.z = ARM_REST_Z + breath * 2.0 - lift + sway;
        j.rotation.x = 0.05;
    });
    with_joint(rig, Bone::RightUpperArm, |j| {
        j.rotation.z = -ARM_REST_Z - breath * 2.0 + lift - sway;
        j.rotation.x = 0.05;
    });
    with_joint(rig, Bone::LeftLowerArm, |j| {
        j.rotation.z = -LOWER_ARM_REST_Z - talk * 0.1;
    });
    with_joint(rig, Bone::RightLowerArm, |j| {
        j.rotation.z = LOWER_ARM_REST_Z + talk * 0.1;
    });

    let nod = natural_sine(t, 0.4) * 0.04;
    let drift = natural_sine(t, 0.25) * 0.05;
    let bob = (t * 10.0).sin() * 0.03 * talk;
    with_joint(rig, Bone::Neck, |j| {
        j.rotation.y = drift * 0.4;
        j.rotation.x = nod * 0.4 + bob * 0.3;
    });
    with_joint(rig, Bone::Head, |j| {
        j.rotation.y = drift * 0.6;
        j.rotation.x = nod * 0.6 + bob * 0.7;
        j.rotation.z = -drift * 0.2;
    });
}
