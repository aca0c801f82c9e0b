//! Live speech amplitude.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

/// Current normalised output volume in `[0, 1]`, stored as f32 bits.
///
/// Written once per frame by the speech pipeline, read by the animation engine.
#[derive(Debug, Default)]
pub struct AudioLevel {
    bits: AtomicU32,
}

impl AudioLevel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.bits.load(Ordering::Acquire))
    }

    /// Store a level. NaN becomes 0, everything else is clamped to `[0, 1]`.
    pub fn set(&self, level: f32) {
        let level = if level.is_nan() { 0.0 } else { level.clamp(0.0, 1.0) };
        self.bits.store(level.to_bits(), Ordering::Release);
    }

    pub fn reset(&self) {
        self.set(0.0);
    }
}
