use crate::rig::Rig;
use crate::state::Emotion;

use super::math::lerp;

const BLEND_RATE: f32 = 4.0;
const SETTLE_EPSILON: f32 = 0.001;

/// Ease every expressive preset toward 1 for the target emotion and 0 for the
/// rest. Presets already within epsilon of their target are left alone.
pub fn blend_emotions(rig: &mut dyn Rig, target: Emotion, delta: f32) {
    for emotion in Emotion::EXPRESSIVE {
        let name = emotion.as_str();
        let Some(current) = rig.expression(name) else {
            continue;
        };
        let goal = if emotion == target { 1.0 } else { 0.0 };
        if (current - goal).abs() > SETTLE_EPSILON {
            rig.set_expression(name, lerp(current, goal, delta * BLEND_RATE));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rig::HumanoidRig;

    #[test]
    fn test_blends_toward_target() {
        let mut rig = HumanoidRig::standard();
        rig.set_expression("sad", 0.5);
        blend_emotions(&mut rig, Emotion::Happy, 0.1);
        assert!((rig.expression("happy").unwrap() - 0.4).abs() < 1e-6);
        assert!((rig.expression("sad").unwrap() - 0.3).abs() < 1e-6);
        assert_eq!(rig.expression("angry"), Some(0.0));
    }

    #[test]
    fn test_settled_values_untouched() {
        let mut rig = HumanoidRig::standard();
        rig.set_expression("relaxed", 0.9995);
        blend_emotions(&mut rig, Emotion::Relaxed, 0.1);
        assert_eq!(rig.expression("relaxed"), Some(0.9995));
    }

    #[test]
    fn test_neutral_fades_everything() {
        let mut rig = HumanoidRig::standard();
        rig.set_expression("angry", 1.0);
        for _ in 0..200 {
            blend_emotions(&mut rig, Emotion::Neutral, 0.05);
        }
        assert!(rig.expression("angry").unwrap() <= SETTLE_EPSILON);
        assert_eq!(rig.expression("neutral"), Some(0.0));
    }
}
