//! HTTP synthesis adapters.

use std::future::Future;
use std::pin::Pin;

use tracing::{info, warn};

use super::mp3::decode_mp3;
use super::{SpeechClip, SpeechError, SpeechSynthesizer};
use crate::config::SpeechEngine;

// ---------------------------------------------------------------------------
// Generic cloud TTS (engine / language / voice, MP3 out)
// ---------------------------------------------------------------------------

/// Cloud synthesis service taking `{text, engine, language, voice}` and
/// answering with MP3 bytes.
pub struct CloudSpeech {
    endpoint: String,
    api_key: Option<String>,
    engine: SpeechEngine,
    language: String,
    voice: String,
    client: reqwest::Client,
}

impl CloudSpeech {
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        engine: SpeechEngine,
        language: &str,
        voice: &str,
    ) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            api_key: api_key.map(str::to_string),
            engine,
            language: language.to_string(),
            voice: voice.to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl SpeechSynthesizer for CloudSpeech {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SpeechClip, SpeechError>> + Send + 'a>> {
        Box::pin(async move {
            let body = serde_json::json!({
                "text": text,
                "engine": self.engine,
                "language": self.language,
                "voice": self.voice,
            });

            let mut req = self.client.post(&self.endpoint).json(&body);
            if let Some(key) = &self.api_key {
                req = req.bearer_auth(key);
            }
            let resp = req
                .send()
                .await
                .map_err(|e| SpeechError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(SpeechError::Service {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| SpeechError::Network(e.to_string()))?;

            // symphonia is CPU-bound, keep it off the runtime threads
            let decoded = tokio::task::spawn_blocking(move || decode_mp3(bytes.to_vec()))
                .await
                .map_err(|e| SpeechError::Decode(format!("decode task failed: {}", e)))??;

            info!(
                voice = %self.voice,
                samples = decoded.samples.len(),
                sample_rate = decoded.sample_rate,
                "Cloud TTS synthesis complete"
            );
            Ok(SpeechClip::new(text, decoded.samples, decoded.sample_rate))
        })
    }

    fn name(&self) -> String {
        format!("Cloud TTS ({}, {})", self.voice, self.engine)
    }
}

// ---------------------------------------------------------------------------
// OpenAI TTS
// ---------------------------------------------------------------------------

const OPENAI_SPEECH_URL: &str = "https://api.openai.com/v1/audio/speech";
/// `response_format: pcm` is fixed 24 kHz 16-bit mono.
const OPENAI_PCM_RATE: u32 = 24_000;

/// OpenAI `/v1/audio/speech` with raw PCM output.
pub struct OpenAiSpeech {
    api_key: String,
    voice: String,
    model: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiSpeech {
    pub const VOICES: [&'static str; 6] = ["alloy", "echo", "fable", "onyx", "nova", "shimmer"];

    /// Unknown voices fall back to "alloy".
    pub fn new(api_key: &str, voice: &str, endpoint: Option<&str>) -> Self {
        let lower = voice.to_lowercase();
        let voice = if Self::VOICES.contains(&lower.as_str()) {
            lower
        } else {
            warn!(voice, "Not an OpenAI voice, using alloy");
            "alloy".to_string()
        };
        Self {
            api_key: api_key.to_string(),
            voice,
            model: "tts-1".to_string(),
            endpoint: endpoint.unwrap_or(OPENAI_SPEECH_URL).to_string(),
            client: reqwest::Client::new(),
        }
    }
}

impl SpeechSynthesizer for OpenAiSpeech {
    fn synthesize<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<SpeechClip, SpeechError>> + Send + 'a>> {
        Box::pin(async move {
            info!(voice = %self.voice, text_len = text.len(), "OpenAI TTS request");

            let body = serde_json::json!({
                "model": self.model,
                "input": text,
                "voice": self.voice,
                "response_format": "pcm",
            });

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
                .map_err(|e| SpeechError::Network(e.to_string()))?;

            let status = resp.status();
            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(SpeechError::Service {
                    status: status.as_u16(),
                    body,
                });
            }

            let bytes = resp
                .bytes()
                .await
                .map_err(|e| SpeechError::Network(e.to_string()))?;

            Ok(SpeechClip::new(text, pcm16_to_f32(&bytes), OPENAI_PCM_RATE))
        })
    }

    fn name(&self) -> String {
        format!("OpenAI TTS ({})", self.voice)
    }
}

/// Little-endian i16 PCM to f32. A trailing odd byte is dropped.
fn pcm16_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / 32768.0)
        .collect()
}
