//! Output loudness for lip sync, computed like a Web Audio `AnalyserNode`
//! with `fftSize = 32`: Blackman window, magnitude spectrum, temporal
//! smoothing, then byte-scaled decibels averaged over the bins.

use std::f32::consts::PI;

pub const FFT_SIZE: usize = 32;
pub const BIN_COUNT: usize = FFT_SIZE / 2;

const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;
const SMOOTHING: f32 = 0.8;
/// Average byte value that counts as full volume.
const FULL_SCALE_AVERAGE: f32 = 100.0;

#[derive(Debug, Clone)]
pub struct VolumeAnalyser {
    window: [f32; FFT_SIZE],
    smoothed: [f32; BIN_COUNT],
}

impl Default for VolumeAnalyser {
    fn default() -> Self {
        Self::new()
    }
}

impl VolumeAnalyser {
    pub fn new() -> Self {
        let mut window = [0.0; FFT_SIZE];
        let n = FFT_SIZE as f32;
        for (i, w) in window.iter_mut().enumerate() {
            let x = i as f32 / n;
            *w = 0.42 - 0.5 * (2.0 * PI * x).cos() + 0.08 * (4.0 * PI * x).cos();
        }
        Self {
            window,
            smoothed: [0.0; BIN_COUNT],
        }
    }

    /// Forget smoothing history (new clip or stop).
    pub fn reset(&mut self) {
        self.smoothed = [0.0; BIN_COUNT];
    }

    /// Byte frequency data for the latest `FFT_SIZE` samples. Shorter input
    /// is zero-padded at the front.
    pub fn byte_frequency_data(&mut self, samples: &[f32]) -> [u8; BIN_COUNT] {
        let mut frame = [0.0f32; FFT_SIZE];
        let take = samples.len().min(FFT_SIZE);
        frame[FFT_SIZE - take..].copy_from_slice(&samples[samples.len() - take..]);
        for (s, w) in frame.iter_mut().zip(self.window.iter()) {
            *s *= w;
        }

        let mut bytes = [0u8; BIN_COUNT];
        for (k, byte) in bytes.iter_mut().enumerate() {
            let (mut re, mut im) = (0.0f32, 0.0f32);
            for (i, s) in frame.iter().enumerate() {
                let angle = -2.0 * PI * (k * i) as f32 / FFT_SIZE as f32;
                re += s * angle.cos();
                im += s * angle.sin();
            }
            let magnitude = (re * re + im * im).sqrt() / FFT_SIZE as f32;
            self.smoothed[k] = SMOOTHING * self.smoothed[k] + (1.0 - SMOOTHING) * magnitude;

            let db = if self.smoothed[k] > 0.0 {
                20.0 * self.smoothed[k].log10()
            } else {
                f32::NEG_INFINITY
            };
            let scaled = 255.0 * (db - MIN_DB) / (MAX_DB - MIN_DB);
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
        bytes
    }

    /// Normalised 0..1 level: mean byte value / 100, capped at 1.
    pub fn level(&mut self, samples: &[f32]) -> f32 {
        let bytes = self.byte_frequency_data(samples);
        let sum: u32 = bytes.iter().map(|&b| b as u32).sum();
        let average = sum as f32 / BIN_COUNT as f32;
        (average / FULL_SCALE_AVERAGE).min(1.0)
    }
}
