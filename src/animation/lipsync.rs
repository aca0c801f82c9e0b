//! Volume-driven mouth opening and talk intensity.

use super::math::lerp;

/// Below this the output is treated as silence.
pub const NOISE_GATE: f32 = 0.05;
const MOUTH_GAIN: f32 = 3.5;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TalkState {
    /// Smoothed 0..1 "is talking" amount, drives body gestures.
    pub intensity: f32,
    /// Smoothed mouth opening written to the `aa` viseme.
    pub mouth: f32,
}

impl TalkState {
    /// Advance one frame and return the mouth weight.
    pub fn update(&mut self, delta: f32, volume: f32) -> f32 {
        let talking = volume > NOISE_GATE;
        self.intensity = lerp(self.intensity, if talking { 1.0 } else { 0.0 }, delta * 8.0);

        let target = if volume < NOISE_GATE {
            0.0
        } else {
            (volume * MOUTH_GAIN).min(1.0)
        };
        // open fast, close smooth
        let rate = if target > self.mouth { 25.0 } else { 10.0 };
        self.mouth = lerp(self.mouth, target, delta * rate);
        self.mouth
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence_stays_closed() {
        let mut talk = TalkState::default();
        for _ in 0..10 {
            assert_eq!(talk.update(0.016, 0.04), 0.0);
        }
        assert_eq!(talk.intensity, 0.0);
    }

    #[test]
    fn test_opens_toward_target() {
        let mut talk = TalkState::default();
        let first = talk.update(0.016, 0.2);
        assert!(first > 0.0 && first < 0.7);
        for _ in 0..120 {
            talk.update(0.016, 0.2);
        }
        assert!((talk.mouth - 0.7).abs() < 1e-3);
        assert!(talk.intensity > 0.99);
    }

    #[test]
    fn test_huge_delta_does_not_overshoot() {
        let mut talk = TalkState::default();
        assert_eq!(talk.update(5.0, 1.0), 1.0);
        assert_eq!(talk.intensity, 1.0);
        assert_eq!(talk.update(5.0, 0.0), 0.0);
    }
}
