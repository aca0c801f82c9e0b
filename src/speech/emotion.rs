//! Keyword-based emotion classifier for reply text.

use crate::state::Emotion;

/// Checked in order; the first category with any hit wins.
const RULES: [(Emotion, &[&str]); 5] = [
    (Emotion::Happy, &["happy", "love", "like", "great", "😊", "🥰", "❤️"]),
    (Emotion::Sad, &["sad", "sorry", "miss", "😢", "😔"]),
    (Emotion::Angry, &["angry", "hate", "😠", "😡"]),
    (Emotion::Surprised, &["wow", "what?", "😲", "😮"]),
    (Emotion::Relaxed, &["relax", "calm", "breath"]),
];

/// Classify `text`. Words match case-insensitively as substrings ("likely"
/// counts as "like"). `None` means no cue, so the caller keeps its current
/// emotion.
pub fn classify(text: &str) -> Option<Emotion> {
    let lower = text.to_lowercase();
    RULES
        .iter()
        .find(|(_, cues)| cues.iter().any(|cue| lower.contains(cue)))
        .map(|(emotion, _)| *emotion)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords() {
        assert_eq!(classify("I'm so HAPPY to see you"), Some(Emotion::Happy));
        assert_eq!(classify("Sorry about that"), Some(Emotion::Sad));
        assert_eq!(classify("I hate mondays"), Some(Emotion::Angry));
        assert_eq!(classify("Wow."), Some(Emotion::Surprised));
        assert_eq!(classify("Take a deep breath"), Some(Emotion::Relaxed));
    }

    #[test]
    fn test_emoji() {
        assert_eq!(classify("see you 🥰"), Some(Emotion::Happy));
        assert_eq!(classify("😡"), Some(Emotion::Angry));
        assert_eq!(classify("😮"), Some(Emotion::Surprised));
    }

    #[test]
    fn test_priority_order() {
        // sad and happy both present: happy is checked first
        assert_eq!(classify("I miss you, but I love this"), Some(Emotion::Happy));
        assert_eq!(classify("so sorry, that makes me angry"), Some(Emotion::Sad));
    }

    #[test]
    fn test_no_cue() {
        assert_eq!(classify("The weather is fine today."), None);
        assert_eq!(classify(""), None);
    }
}
