//! Target facial emotion.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    #[default]
    Neutral,
    Happy,
    Angry,
    Sad,
    Surprised,
    Relaxed,
}

impl Emotion {
    /// Emotions that map to a blendable expression preset.
    pub const EXPRESSIVE: [Emotion; 5] = [
        Emotion::Happy,
        Emotion::Angry,
        Emotion::Sad,
        Emotion::Surprised,
        Emotion::Relaxed,
    ];

    /// Expression preset name on the rig.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Happy => "happy",
            Self::Angry => "angry",
            Self::Sad => "sad",
            Self::Surprised => "surprised",
            Self::Relaxed => "relaxed",
        }
    }
}

impl std::fmt::Display for Emotion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpressionState {
    pub emotion: Emotion,
    /// Milliseconds since epoch of the last write, 0 before any.
    pub updated_at: i64,
}

/// Store for the avatar's current target emotion.
#[derive(Debug)]
pub struct ExpressionStore {
    tx: watch::Sender<ExpressionState>,
}

impl Default for ExpressionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ExpressionState::default());
        Self { tx }
    }

    pub fn get(&self) -> ExpressionState {
        *self.tx.borrow()
    }

    pub fn emotion(&self) -> Emotion {
        self.tx.borrow().emotion
    }

    pub fn subscribe(&self) -> watch::Receiver<ExpressionState> {
        self.tx.subscribe()
    }

    /// Overwrite the emotion and stamp the time. Setting the same emotion
    /// again still refreshes the timestamp.
    pub fn set(&self, emotion: Emotion) {
        let now = chrono::Utc::now().timestamp_millis();
        self.tx.send_modify(|s| {
            s.emotion = emotion;
            s.updated_at = now;
        });
    }
}
