//! Eyelid blink cycle: wait, snap closed, open a little slower.

use rand::Rng;

use super::math::smoothstep;

const CLOSE_SPEED: f32 = 15.0;
const OPEN_SPEED: f32 = 8.0;
const INITIAL_DELAY: f32 = 2.0;

#[derive(Debug, Clone, PartialEq)]
pub struct BlinkState {
    pub is_blinking: bool,
    /// Progress through the current half of the blink, 0..1.
    pub phase: f32,
    /// Seconds until the next blink starts.
    pub next_delay: f32,
    pub closing: bool,
}

impl Default for BlinkState {
    fn default() -> Self {
        Self {
            is_blinking: false,
            phase: 0.0,
            next_delay: INITIAL_DELAY,
            closing: true,
        }
    }
}

impl BlinkState {
    /// Advance by `delta` seconds. Returns the weight to write to the `blink`
    /// expression, or `None` while waiting between blinks.
    ///
    /// `suspended` cancels any blink in progress and pins the weight at 0
    /// (eyes are already shaped by the expression).
    pub fn update<R: Rng + ?Sized>(&mut self, delta: f32, suspended: bool, rng: &mut R) -> Option<f32> {
        if suspended {
            self.is_blinking = false;
            self.closing = true;
            self.phase = 0.0;
            return Some(0.0);
        }

        self.next_delay -= delta;
        if self.next_delay <= 0.0 && !self.is_blinking {
            self.is_blinking = true;
            self.closing = true;
            self.phase = 0.0;
        }

        if !self.is_blinking {
            return None;
        }

        if self.closing {
            self.phase += delta * CLOSE_SPEED;
            let weight = smoothstep(self.phase);
            if self.phase >= 1.0 {
                self.closing = false;
                self.phase = 0.0;
            }
            Some(weight)
        } else {
            self.phase += delta * OPEN_SPEED;
            if self.phase >= 1.0 {
                self.is_blinking = false;
                self.closing = true;
                self.phase = 0.0;
                self.next_delay = next_blink_delay(rng);
                Some(0.0)
            } else {
                Some(1.0 - smoothstep(self.phase))
            }
        }
    }
}

/// Mostly 2 to 5 seconds, with an occasional quick double blink.
fn next_blink_delay<R: Rng + ?Sized>(rng: &mut R) -> f32 {
    if rng.gen::<f32>() > 0.8 {
        0.5
    } else {
        2.0 + rng.gen::<f32>() * 3.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_waits_initial_delay() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut blink = BlinkState::default();
        assert_eq!(blink.update(1.0, false, &mut rng), None);
        assert_eq!(blink.update(0.9, false, &mut rng), None);
        assert!(blink.update(0.2, false, &mut rng).is_some());
        assert!(blink.is_blinking);
    }

    #[test]
    fn test_full_cycle_stays_in_range_and_ends_at_zero() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut blink = BlinkState::default();
        let mut saw_closed = false;
        let mut last = None;
        for _ in 0..2000 {
            let w = blink.update(1.0 / 60.0, false, &mut rng);
            if let Some(w) = w {
                assert!((0.0..=1.0).contains(&w));
                if w > 0.99 {
                    saw_closed = true;
                }
            }
            if last.is_some() && w.is_none() {
                assert_eq!(last, Some(0.0));
            }
            last = w;
        }
        assert!(saw_closed);
    }

    #[test]
    fn test_next_delay_distribution() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..500 {
            let d = next_blink_delay(&mut rng);
            assert!(d == 0.5 || (2.0..=5.0).contains(&d));
        }
    }

    #[test]
    fn test_suspend_cancels_blink() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut blink = BlinkState::default();
        blink.update(2.05, false, &mut rng);
        assert!(blink.is_blinking);

        assert_eq!(blink.update(0.016, true, &mut rng), Some(0.0));
        assert!(!blink.is_blinking);
        assert_eq!(blink.update(0.016, true, &mut rng), Some(0.0));
    }
}
