//! Text-to-speech, playback queue and the lip-sync level meter.
//!
//! - `segmenter` / `emotion`: turn streamed reply text into sentences + mood
//! - `cloud`: HTTP synthesis adapters
//! - `queue`: FIFO of ready clips, one playing at a time
//! - `output`: rodio playback on a blocking thread
//! - `level`: browser-style analyser feeding the mouth
//! - `pipeline`: ties the above together for the session

pub mod cloud;
pub mod emotion;
pub mod level;
mod mp3;
pub mod output;
pub mod pipeline;
pub mod queue;
pub mod segmenter;

use std::future::Future;
use std::pin::Pin;

use tracing::{debug, warn};

use crate::config::SpeechConfig;

pub use pipeline::{SpeechEvent, SpeechPipeline, SynthesisResult};
pub use queue::{PlaybackStart, SpeechQueue};
pub use segmenter::{Segment, SentenceSegmenter};

/// Speech synthesis and playback errors.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechError {
    /// Adapter missing a required setting (endpoint, API key).
    NotConfigured(String),
    /// HTTP failure talking to the synthesis service.
    Network(String),
    /// Service answered with an error status.
    Service { status: u16, body: String },
    /// Response audio could not be decoded.
    Decode(String),
    /// Audio device failure.
    Playback(String),
}

impl std::fmt::Display for SpeechError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotConfigured(msg) => write!(f, "TTS not configured: {}", msg),
            Self::Network(msg) => write!(f, "TTS network error: {}", msg),
            Self::Service { status, body } => write!(f, "TTS service error {}: {}", status, body),
            Self::Decode(msg) => write!(f, "TTS audio decode error: {}", msg),
            Self::Playback(msg) => write!(f, "TTS playback error: {}", msg),
        }
    }
}

impl std::error::Error for SpeechError {}

/// A synthesized sentence ready to play.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeechClip {
    pub id: String,
    pub text: String,
    /// Mono PCM, -1..1.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SpeechClip {
    pub fn new(text: impl Into<String>, samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }
}

/// Common trait for synthesis backends (dyn-compatible).
pub trait SpeechSynthesizer: Send + Sync {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SpeechClip, SpeechError>> + Send + 'a>>;

    /// Display name, e.g. "Cloud TTS (Joanna, neural)".
    fn name(&self) -> String;
}

/// Create a synthesizer from config.
///
/// `adapter` is one of: "cloud", "openai-tts".
pub fn create_synthesizer(config: &SpeechConfig) -> Result<Box<dyn SpeechSynthesizer>, SpeechError> {
    match config.adapter.as_str() {
        "cloud" => {
            let endpoint = config
                .endpoint
                .as_deref()
                .ok_or_else(|| SpeechError::NotConfigured("cloud TTS requires speech.endpoint".into()))?;
            Ok(Box::new(cloud::CloudSpeech::new(
                endpoint,
                config.api_key.as_deref(),
                config.engine,
                &config.language,
                &config.voice,
            )))
        }
        "openai-tts" => {
            let key = config
                .api_key
                .as_deref()
                .ok_or_else(|| SpeechError::NotConfigured("OpenAI TTS requires speech.apiKey".into()))?;
            Ok(Box::new(cloud::OpenAiSpeech::new(
                key,
                &config.voice,
                config.endpoint.as_deref(),
            )))
        }
        other => Err(SpeechError::NotConfigured(format!("unknown TTS adapter: {}", other))),
    }
}

/// Synthesize `text`, logging and swallowing failures. Blank text and empty
/// audio yield `None`.
pub async fn synthesize_or_skip(engine: &dyn SpeechSynthesizer, text: &str) -> Option<SpeechClip> {
    if text.trim().is_empty() {
        return None;
    }
    match engine.synthesize(text).await {
        Ok(clip) if clip.samples.is_empty() => {
            debug!(text = %preview(text), "Synthesis returned no audio");
            None
        }
        Ok(clip) => Some(clip),
        Err(e) => {
            warn!(engine = %engine.name(), text = %preview(text), "Speech synthesis failed: {}", e);
            None
        }
    }
}

/// First few characters of a sentence for log lines.
fn preview(text: &str) -> String {
    text.chars().take(20).collect()
}


#[cfg(test)]
mod tests {
    use super::fakes::FakeSynth;
    use super::*;

    #[tokio::test]
    async fn test_skip_blank_and_failures() {
        let synth = FakeSynth::default();
        assert!(synthesize_or_skip(&synth, "   ").await.is_none());
        assert!(synthesize_or_skip(&synth, "this will fail").await.is_none());
        let clip = synthesize_or_skip(&synth, "Hello.").await.unwrap();
        assert_eq!(clip.text, "Hello.");
        assert!((clip.duration_secs() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn test_factory_requires_settings() {
        let mut config = SpeechConfig::default();
        assert!(matches!(create_synthesizer(&config), Err(SpeechError::NotConfigured(_))));

        config.endpoint = Some("http://localhost:9000/tts".into());
        assert!(create_synthesizer(&config).unwrap().name().contains("Joanna"));

        config.adapter = "openai-tts".into();
        config.api_key = None;
        assert!(create_synthesizer(&config).is_err());
        config.api_key = Some("sk-x".into());
        assert!(create_synthesizer(&config).is_ok());

        config.adapter = "espeak".into();
        assert!(create_synthesizer(&config).is_err());
    }
}
