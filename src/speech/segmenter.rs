//! Splits a streaming reply into speakable sentences.

use once_cell::sync::Lazy;
use regex::Regex;

use super::emotion::classify;
use crate::state::Emotion;

/// Shortest prefix ending in `.`, `!` or `?` that is followed by whitespace.
/// `(?s)` lets a sentence span line breaks.
static SENTENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^(.+?[.!?])\s+(.*)").expect("sentence regex is valid")
});

/// Result of feeding one chunk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Segment {
    /// Emotion cue found anywhere in the pending text, if any.
    pub emotion: Option<Emotion>,
    /// A completed sentence ready for synthesis.
    pub sentence: Option<String>,
}

#[derive(Debug, Default)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk, classify the pending text and cut off at most one
    /// finished sentence. The whitespace after the sentence is dropped.
    pub fn push(&mut self, chunk: &str) -> Segment {
        self.buffer.push_str(chunk);
        let emotion = classify(&self.buffer);

        let parts = SENTENCE_RE
            .captures(&self.buffer)
            .map(|caps| (caps[1].to_string(), caps[2].to_string()));
        let sentence = parts.map(|(sentence, rest)| {
            self.buffer = rest;
            sentence
        });

        Segment { emotion, sentence }
    }

    /// Take whatever is left once the reply is complete. Blank leftovers are
    /// discarded.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        if rest.trim().is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_chunk_two_sentences() {
        let mut seg = SentenceSegmenter::new();
        let out = seg.push("Hello there. How are you?");
        assert_eq!(out.sentence.as_deref(), Some("Hello there."));
        assert_eq!(seg.pending(), "How are you?");
        assert_eq!(seg.finish().as_deref(), Some("How are you?"));
        assert_eq!(seg.finish(), None);
    }

    #[test]
    fn test_waits_for_whitespace_after_punctuation() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.push("It costs 3.").sentence, None);
        assert_eq!(seg.push("50 dollars! ").sentence.as_deref(), Some("It costs 3.50 dollars!"));
        assert_eq!(seg.pending(), "");
    }

    #[test]
    fn test_no_characters_lost_across_chunks() {
        let reply = "Oh! *blushes* Did you\nreally mean that? I... I think so. Bye";
        let mut seg = SentenceSegmenter::new();
        let mut sentences = Vec::new();
        for ch in reply.chars() {
            if let Some(s) = seg.push(&ch.to_string()).sentence {
                sentences.push(s);
            }
        }
        sentences.extend(seg.finish());

        assert_eq!(
            sentences,
            vec!["Oh!", "*blushes* Did you\nreally mean that?", "I...", "I think so.", "Bye"]
        );
    }

    #[test]
    fn test_emotion_tracks_pending_buffer() {
        let mut seg = SentenceSegmenter::new();
        assert_eq!(seg.push("The sky").emotion, None);
        assert_eq!(seg.push(" is lovely").emotion, Some(Emotion::Happy));
        // the happy sentence is cut off here, only "Sorry" remains pending
        assert_eq!(seg.push(". Sorry").emotion, Some(Emotion::Happy));
        assert_eq!(seg.push(" for that").emotion, Some(Emotion::Sad));
    }

    #[test]
    fn test_blank_remainder_discarded() {
        let mut seg = SentenceSegmenter::new();
        seg.push("Done.  \n ");
        assert_eq!(seg.finish(), None);
    }

    #[test]
    fn test_reset_clears() {
        let mut seg = SentenceSegmenter::new();
        seg.push("half a thought");
        seg.reset();
        assert_eq!(seg.finish(), None);
    }
}
