//! Configuration reading and data directory paths.

pub mod credentials;
pub mod paths;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use paths::get_data_dir;

pub const DEFAULT_CHAT_ENDPOINT: &str = "https://openrouter.ai/api/v1/chat/completions";
pub const DEFAULT_CHAT_MODEL: &str = "deepseek/deepseek-r1-0528:free";

/// Top-level config.json shape.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppConfig {
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
    #[serde(default)]
    pub avatar: AvatarConfig,
}

/// Completion endpoint and persona settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    #[serde(default = "default_chat_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_chat_model")]
    pub model: String,
    /// Sent as `HTTP-Referer` (OpenRouter app attribution).
    #[serde(default = "default_referer")]
    pub referer: String,
    /// Sent as `X-Title`.
    #[serde(default = "default_title")]
    pub title: String,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// First assistant line shown before the user says anything.
    #[serde(default = "default_greeting")]
    pub greeting: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: default_chat_endpoint(),
            model: default_chat_model(),
            referer: default_referer(),
            title: default_title(),
            system_prompt: default_system_prompt(),
            greeting: default_greeting(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

/// Synthesis quality tier passed through to the speech service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeechEngine {
    Standard,
    #[default]
    Neural,
    Generative,
}

impl std::fmt::Display for SpeechEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Standard => write!(f, "standard"),
            Self::Neural => write!(f, "neural"),
            Self::Generative => write!(f, "generative"),
        }
    }
}

/// Speech synthesis and playback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeechConfig {
    /// One of "cloud", "openai-tts".
    #[serde(default = "default_speech_adapter")]
    pub adapter: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub engine: SpeechEngine,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_voice")]
    pub voice: String,
    #[serde(default = "default_playback_volume")]
    pub volume: f32,
    #[serde(default)]
    pub output_device: Option<String>,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            adapter: default_speech_adapter(),
            endpoint: None,
            api_key: None,
            engine: SpeechEngine::default(),
            language: default_language(),
            voice: default_voice(),
            volume: default_playback_volume(),
            output_device: None,
        }
    }
}

/// Avatar asset and frame settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarConfig {
    /// Directory holding `<model>.rig.json` manifests. Defaults to `<data_dir>/vrm`.
    #[serde(default)]
    pub asset_dir: Option<String>,
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    /// Emit a `frame` event for every tick. Disable for headless speech-only runs.
    #[serde(default = "default_true")]
    pub emit_frames: bool,
}

impl Default for AvatarConfig {
    fn default() -> Self {
        Self {
            asset_dir: None,
            default_model: default_model(),
            frame_rate: default_frame_rate(),
            emit_frames: true,
        }
    }
}

impl AvatarConfig {
    pub fn asset_dir(&self) -> PathBuf {
        match &self.asset_dir {
            Some(dir) => PathBuf::from(dir),
            None => get_data_dir().join("vrm"),
        }
    }
}

fn default_chat_endpoint() -> String { DEFAULT_CHAT_ENDPOINT.into() }
fn default_chat_model() -> String { DEFAULT_CHAT_MODEL.into() }
fn default_referer() -> String { "http://localhost".into() }
fn default_title() -> String { "VRM Chatbot".into() }
fn default_connect_timeout() -> u64 { 15 }
fn default_speech_adapter() -> String { "cloud".into() }
fn default_language() -> String { "en-US".into() }
fn default_voice() -> String { "Joanna".into() }
fn default_playback_volume() -> f32 { 0.5 }
fn default_model() -> String { crate::models::DEFAULT_MODEL_ID.into() }
fn default_frame_rate() -> u32 { 60 }
fn default_true() -> bool { true }

fn default_system_prompt() -> String {
    "You are Hina, a kind and gentle classmate who is quietly fond of the user. \
     Speak in a soft, cheerful, slightly nervous tone. Use *asterisks* for actions \
     and (parentheses) for your inner thoughts. Keep replies short and spoken-friendly."
        .into()
}

fn default_greeting() -> Option<String> {
    Some(
        "O-Oh! You're here? I didn't see you come in... *tucks hair behind ear* \
         Did you want to walk home together later?"
            .into(),
    )
}

/// Read config.json from the data directory.
pub fn read_config() -> AppConfig {
    read_json_file(&get_config_path()).unwrap_or_default()
}

/// Path to config.json.
pub fn get_config_path() -> PathBuf {
    get_data_dir().join("config.json")
}

/// Generic helper: read a JSON file and deserialize it.
pub(crate) fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Option<T> {
    match std::fs::read_to_string(path) {
        Ok(contents) => match serde_json::from_str(&contents) {
            Ok(val) => Some(val),
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                None
            }
        },
        Err(e) => {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to read {}: {}", path.display(), e);
            }
            None
        }
    }
}
