//! FIFO of synthesized clips with at most one playing.

use std::collections::VecDeque;
use std::sync::Arc;

use super::SpeechClip;

/// Instruction to start playing `clip`. `playback_id` identifies this play
/// so late "ended" reports from a cancelled clip can be told apart.
#[derive(Debug, Clone)]
pub struct PlaybackStart {
    pub playback_id: u64,
    pub clip: Arc<SpeechClip>,
}

#[derive(Debug, Default)]
pub struct SpeechQueue {
    pending: VecDeque<Arc<SpeechClip>>,
    playing: Option<PlaybackStart>,
    next_id: u64,
}

impl SpeechQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a clip. Returns a start instruction if nothing was playing.
    pub fn enqueue(&mut self, clip: SpeechClip) -> Option<PlaybackStart> {
        self.pending.push_back(Arc::new(clip));
        if self.playing.is_some() {
            return None;
        }
        self.start_next()
    }

    /// The current clip ended or failed. Stale ids (already stopped) are
    /// ignored. Returns the next clip to play, if any.
    pub fn on_terminal(&mut self, playback_id: u64) -> Option<PlaybackStart> {
        match &self.playing {
            Some(p) if p.playback_id == playback_id => {
                self.playing = None;
                self.start_next()
            }
            _ => None,
        }
    }

    /// Drop everything, including the playing entry.
    pub fn stop_all(&mut self) {
        self.pending.clear();
        self.playing = None;
    }

    pub fn playing(&self) -> Option<&PlaybackStart> {
        self.playing.as_ref()
    }

    pub fn is_playing(&self) -> bool {
        self.playing.is_some()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.playing.is_none() && self.pending.is_empty()
    }

    fn start_next(&mut self) -> Option<PlaybackStart> {
        let clip = self.pending.pop_front()?;
        self.next_id += 1;
        let start = PlaybackStart {
            playback_id: self.next_id,
            clip,
        };
        self.playing = Some(start.clone());
        Some(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clip(text: &str) -> SpeechClip {
        SpeechClip::new(text, vec![0.1; 10], 16_000)
    }

    #[test]
    fn test_plays_in_order_one_at_a_time() {
        let mut q = SpeechQueue::new();
        let first = q.enqueue(clip("one")).unwrap();
        assert!(q.enqueue(clip("two")).is_none());
        assert!(q.enqueue(clip("three")).is_none());
        assert_eq!(q.pending_len(), 2);

        let second = q.on_terminal(first.playback_id).unwrap();
        assert_eq!(second.clip.text, "two");
        // failure advances just like a normal end
        let third = q.on_terminal(second.playback_id).unwrap();
        assert_eq!(third.clip.text, "three");
        assert!(q.on_terminal(third.playback_id).is_none());
        assert!(q.is_empty());
    }

    #[test]
    fn test_never_two_playing() {
        let mut q = SpeechQueue::new();
        let mut starts = 0;
        let mut current = None;
        for i in 0..20 {
            if let Some(s) = q.enqueue(clip(&format!("s{}", i))) {
                assert!(current.is_none());
                current = Some(s.playback_id);
                starts += 1;
            }
            if i % 3 == 0 {
                if let Some(id) = current.take() {
                    current = q.on_terminal(id).map(|s| s.playback_id);
                    if current.is_some() {
                        starts += 1;
                    }
                }
            }
            assert_eq!(q.is_playing(), current.is_some());
        }
        assert!(starts > 1);
    }

    #[test]
    fn test_stale_terminal_ignored() {
        let mut q = SpeechQueue::new();
        let first = q.enqueue(clip("one")).unwrap();
        q.stop_all();
        assert!(q.is_empty());

        let again = q.enqueue(clip("two")).unwrap();
        assert_ne!(again.playback_id, first.playback_id);
        assert!(q.on_terminal(first.playback_id).is_none());
        assert!(q.is_playing());
    }
}
