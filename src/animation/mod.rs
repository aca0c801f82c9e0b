//! Per-frame avatar animation.
//!
//! Each tick layers, in order: blink, lip sync, emotion blend, body pose,
//! then the rig's own secondary motion. The engine runs on the session task
//! and never blocks.

pub mod blink;
pub mod emotion;
pub mod gestures;
pub mod lipsync;
pub mod math;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use crate::rig::{Rig, RigSnapshot};
use crate::state::{AvatarPose, AvatarTransform, Emotion};

use blink::BlinkState;
use lipsync::TalkState;

/// Everything one frame reads from the outside world.
#[derive(Debug, Clone, Copy)]
pub struct FrameInput {
    /// Seconds since the engine clock started.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
    pub pose: AvatarPose,
    pub emotion: Emotion,
    /// Current speech amplitude, 0..1.
    pub volume: f32,
    pub transform: AvatarTransform,
}

/// What the renderer applies for one frame.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePose {
    pub model_id: String,
    pub root: AvatarTransform,
    #[serde(flatten)]
    pub rig: RigSnapshot,
}

/// Identifies one model swap. Only the newest ticket may install a rig.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

pub struct AnimationEngine {
    rig: Option<Box<dyn Rig>>,
    model_id: Option<String>,
    generation: u64,
    blink: BlinkState,
    talk: TalkState,
    rng: StdRng,
}

impl Default for AnimationEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl AnimationEngine {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Engine with a fixed random source (blink timing).
    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rig: None,
            model_id: None,
            generation: 0,
            blink: BlinkState::default(),
            talk: TalkState::default(),
            rng,
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.rig.is_some()
    }

    /// Model id of the rig currently mounted or being loaded.
    pub fn model_id(&self) -> Option<&str> {
        self.model_id.as_deref()
    }

    /// Drop the current rig and start a swap to `model_id`. Frames return
    /// `None` until [`finish_load`](Self::finish_load) installs the result.
    pub fn begin_load(&mut self, model_id: &str) -> LoadTicket {
        self.generation += 1;
        self.rig = None;
        self.model_id = Some(model_id.to_string());
        debug!(model = model_id, generation = self.generation, "Rig released for swap");
        LoadTicket(self.generation)
    }

    /// Install a loaded rig. Returns false (and drops the rig) if a newer
    /// swap has started since `ticket` was issued.
    pub fn finish_load(&mut self, ticket: LoadTicket, mut rig: Box<dyn Rig>) -> bool {
        if ticket.0 != self.generation {
            debug!(ticket = ticket.0, current = self.generation, "Discarding stale rig");
            return false;
        }
        gestures::apply_base_pose(rig.as_mut());
        self.blink = BlinkState::default();
        self.talk = TalkState::default();
        self.rig = Some(rig);
        info!(model = self.model_id.as_deref().unwrap_or(""), "Rig mounted");
        true
    }

    /// Abandon the swap for `ticket` (load failed). Stale tickets are ignored.
    pub fn cancel_load(&mut self, ticket: LoadTicket) {
        if ticket.0 == self.generation {
            self.model_id = None;
        }
    }

    /// Current smoothed talk intensity.
    pub fn talk_intensity(&self) -> f32 {
        self.talk.intensity
    }

    pub fn tick(&mut self, input: FrameInput) -> Option<FramePose> {
        let rig = self.rig.as_deref_mut()?;
        let delta = input.delta.max(0.0);

        let suspend_blink = input.emotion == Emotion::Happy;
        if let Some(weight) = self.blink.update(delta, suspend_blink, &mut self.rng) {
            rig.set_expression("blink", weight);
        }

        let mouth = self.talk.update(delta, input.volume);
        rig.set_expression("aa", mouth);

        emotion::blend_emotions(rig, input.emotion, delta);
        gestures::apply_pose(rig, input.pose, input.elapsed, self.talk.intensity);

        rig.update(delta);

        Some(FramePose {
            model_id: self.model_id.clone().unwrap_or_default(),
            root: input.transform,
            rig: rig.snapshot(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::{Bone, HumanoidRig};

    fn engine() -> AnimationEngine {
        AnimationEngine::with_rng(StdRng::seed_from_u64(11))
    }

    fn input(elapsed: f32, pose: AvatarPose, emotion: Emotion, volume: f32) -> FrameInput {
        FrameInput {
            elapsed,
            delta: 1.0 / 60.0,
            pose,
            emotion,
            volume,
            transform: AvatarTransform::default(),
        }
    }

    fn mounted() -> AnimationEngine {
        let mut engine = engine();
        let ticket = engine.begin_load("carlotta.vrm");
        assert!(engine.finish_load(ticket, Box::new(HumanoidRig::standard())));
        engine
    }

    #[test]
    fn test_no_frames_without_rig() {
        let mut engine = engine();
        assert!(engine.tick(input(0.0, AvatarPose::Idle, Emotion::Neutral, 0.0)).is_none());
    }

    #[test]
    fn test_stale_ticket_discarded() {
        let mut engine = engine();
        let old = engine.begin_load("phoebe.vrm");
        let new = engine.begin_load("yinlin.vrm");
        assert!(!engine.finish_load(old, Box::new(HumanoidRig::standard())));
        assert!(!engine.is_loaded());
        assert!(engine.finish_load(new, Box::new(HumanoidRig::standard())));
        assert_eq!(engine.model_id(), Some("yinlin.vrm"));
    }

    #[test]
    fn test_swap_releases_rig_immediately() {
        let mut engine = mounted();
        engine.begin_load("chixia.vrm");
        assert!(engine.tick(input(0.0, AvatarPose::Idle, Emotion::Neutral, 0.0)).is_none());
    }

    #[test]
    fn test_blink_bounded_and_zero_while_happy() {
        let mut engine = mounted();
        for i in 0..600 {
            let emotion = if (200..400).contains(&i) { Emotion::Happy } else { Emotion::Neutral };
            let frame = engine
                .tick(input(i as f32 / 60.0, AvatarPose::Idle, emotion, 0.0))
                .unwrap();
            let blink = frame.rig.expressions["blink"];
            assert!((0.0..=1.0).contains(&blink));
            if emotion == Emotion::Happy {
                assert_eq!(blink, 0.0);
            }
        }
    }

    #[test]
    fn test_dancing_hips_y_is_zero() {
        let mut engine = mounted();
        for i in 0..300 {
            let frame = engine
                .tick(input(i as f32 / 60.0, AvatarPose::Dancing, Emotion::Neutral, 0.3))
                .unwrap();
            assert_eq!(frame.rig.joints[&Bone::Hips].rotation.y, 0.0);
        }
    }

    #[test]
    fn test_volume_opens_mouth_and_root_passes_through() {
        let mut engine = mounted();
        let mut frame = None;
        for i in 0..30 {
            let mut inp = input(i as f32 / 60.0, AvatarPose::Idle, Emotion::Neutral, 0.25);
            inp.transform.scale = 2.0;
            frame = engine.tick(inp);
        }
        let frame = frame.unwrap();
        assert!(frame.rig.expressions["aa"] > 0.5);
        assert_eq!(frame.root.scale, 2.0);
        assert!(engine.talk_intensity() > 0.9);
    }

    #[test]
    fn test_emotion_blends_in() {
        let mut engine = mounted();
        let mut last = 0.0;
        for i in 0..120 {
            let frame = engine
                .tick(input(i as f32 / 60.0, AvatarPose::Idle, Emotion::Sad, 0.0))
                .unwrap();
            let sad = frame.rig.expressions["sad"];
            assert!(sad >= last);
            last = sad;
        }
        assert!(last > 0.9);
    }

    #[test]
    fn test_frame_serializes_flat() {
        let mut engine = mounted();
        let frame = engine.tick(input(0.0, AvatarPose::Idle, Emotion::Neutral, 0.0)).unwrap();
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["modelId"], "carlotta.vrm");
        assert!(json["joints"]["hips"].is_object());
        assert!(json["expressions"]["aa"].is_number());
        assert!(json["root"]["position"].is_object());
    }
}
