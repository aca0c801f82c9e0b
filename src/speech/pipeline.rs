//! Sentence in, ordered playback and live volume out.
//!
//! Sentences are synthesized concurrently but enter the queue in the order
//! they were submitted. Each submission takes a sequence number. Results
//! wait in `ready` until every earlier number has been released. A failed
//! synthesis releases its number with no clip.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info};

use super::level::{VolumeAnalyser, FFT_SIZE};
use super::output::{AudioOutput, PlaybackEvent};
use super::queue::{PlaybackStart, SpeechQueue};
use super::{synthesize_or_skip, SpeechClip, SpeechSynthesizer};
use crate::state::AudioLevel;

/// Result of one background synthesis.
#[derive(Debug)]
pub struct SynthesisResult {
    epoch: u64,
    seq: u64,
    clip: Option<SpeechClip>,
}

/// Things the session forwards to the front-end.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    SpeakingStart { text: String },
    SpeakingEnd,
}

pub struct SpeechPipeline {
    synth: Option<Arc<dyn SpeechSynthesizer>>,
    output: Box<dyn AudioOutput>,
    queue: SpeechQueue,
    level: Arc<AudioLevel>,
    analyser: VolumeAnalyser,
    results_tx: mpsc::UnboundedSender<SynthesisResult>,
    /// Bumped by `stop_all`; results from older epochs are dropped.
    epoch: u64,
    next_seq: u64,
    next_release: u64,
    ready: BTreeMap<u64, Option<SpeechClip>>,
    playing_since: Option<Instant>,
}

impl SpeechPipeline {
    /// `synth = None` runs without speech: sentences are dropped.
    pub fn new(
        synth: Option<Arc<dyn SpeechSynthesizer>>,
        output: Box<dyn AudioOutput>,
        level: Arc<AudioLevel>,
    ) -> (Self, mpsc::UnboundedReceiver<SynthesisResult>) {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let pipeline = Self {
            synth,
            output,
            queue: SpeechQueue::new(),
            level,
            analyser: VolumeAnalyser::new(),
            results_tx,
            epoch: 0,
            next_seq: 0,
            next_release: 0,
            ready: BTreeMap::new(),
            playing_since: None,
        };
        (pipeline, results_rx)
    }

    pub fn queue(&self) -> &SpeechQueue {
        &self.queue
    }

    /// Number of submitted sentences still being synthesized or waiting on
    /// an earlier one.
    pub fn in_flight(&self) -> u64 {
        self.next_seq - self.next_release
    }

    /// Start synthesizing `sentence` in the background.
    pub fn submit(&mut self, sentence: &str) {
        let Some(synth) = self.synth.clone() else {
            debug!("No speech synthesizer configured, skipping sentence");
            return;
        };
        if sentence.trim().is_empty() {
            return;
        }

        let seq = self.next_seq;
        self.next_seq += 1;
        let epoch = self.epoch;
        let text = sentence.to_string();
        let tx = self.results_tx.clone();

        tokio::spawn(async move {
            let clip = synthesize_or_skip(synth.as_ref(), &text).await;
            let _ = tx.send(SynthesisResult { epoch, seq, clip });
        });
    }

    /// Accept a finished synthesis and release everything now in order.
    pub fn on_synthesized(&mut self, result: SynthesisResult, now: Instant) -> Vec<SpeechEvent> {
        if result.epoch != self.epoch || result.seq < self.next_release {
            debug!(seq = result.seq, "Dropping synthesis from a stopped reply");
            return Vec::new();
        }
        self.ready.insert(result.seq, result.clip);

        let mut events = Vec::new();
        while let Some(clip) = self.ready.remove(&self.next_release) {
            self.next_release += 1;
            if let Some(start) = clip.and_then(|c| self.queue.enqueue(c)) {
                events.push(self.start(start, now));
            }
        }
        events
    }

    /// The output finished (or failed) a clip.
    pub fn on_playback(&mut self, event: PlaybackEvent, now: Instant) -> Vec<SpeechEvent> {
        if let PlaybackEvent::Failed { error, .. } = &event {
            info!("Skipping clip after playback error: {}", error);
        }
        let was_playing = self
            .queue
            .playing()
            .map(|p| p.playback_id == event.playback_id())
            .unwrap_or(false);
        if !was_playing {
            return Vec::new();
        }

        self.playing_since = None;
        self.level.reset();
        self.analyser.reset();
        match self.queue.on_terminal(event.playback_id()) {
            Some(next) => vec![self.start(next, now)],
            None => vec![SpeechEvent::SpeakingEnd],
        }
    }

    /// Update the shared level from the samples under the playhead. Writes 0
    /// when nothing is playing. Call once per frame.
    pub fn sample_level(&mut self, now: Instant) -> f32 {
        let (Some(playing), Some(since)) = (self.queue.playing(), self.playing_since) else {
            self.level.reset();
            return 0.0;
        };

        let clip = &playing.clip;
        let elapsed = now.saturating_duration_since(since).as_secs_f64();
        let head = (elapsed * clip.sample_rate as f64) as usize;
        if head >= clip.samples.len() {
            // audio ran out, the ended report is on its way
            self.analyser.reset();
            self.level.reset();
            return 0.0;
        }
        let start = head.saturating_sub(FFT_SIZE);

        let level = self.analyser.level(&clip.samples[start..head]);
        self.level.set(level);
        level
    }

    /// Halt output, drop queued and in-flight speech, zero the level.
    /// Returns `SpeakingEnd` if something was audible.
    pub fn stop_all(&mut self) -> Vec<SpeechEvent> {
        let was_playing = self.queue.is_playing();

        self.epoch += 1;
        self.ready.clear();
        self.next_release = self.next_seq;
        self.queue.stop_all();
        self.output.stop();
        self.playing_since = None;
        self.analyser.reset();
        self.level.reset();

        if was_playing {
            vec![SpeechEvent::SpeakingEnd]
        } else {
            Vec::new()
        }
    }

    fn start(&mut self, start: PlaybackStart, now: Instant) -> SpeechEvent {
        info!(
            playback_id = start.playback_id,
            secs = start.clip.duration_secs(),
            "Speaking"
        );
        let text = start.clip.text.clone();
        self.playing_since = Some(now);
        self.analyser.reset();
        self.output.play(start.playback_id, start.clip);
        SpeechEvent::SpeakingStart { text }
    }
}
