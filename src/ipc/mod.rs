//! IPC protocol types for the renderer front-end.
//!
//! Events use `{"event": "<name>", "data": {...}}` format (core -> renderer).
//! Commands use `{"command": "<name>", ...}` format (renderer -> core).

pub mod bridge;

use serde::{Deserialize, Serialize};

use crate::animation::FramePose;
use crate::chat::ChatMessage;
use crate::models::ModelInfo;
use crate::rig::Vec3;
use crate::state::{AvatarPose, AvatarState, Emotion};

// ---------------------------------------------------------------------------
// Events: core -> renderer (stdout)
// ---------------------------------------------------------------------------

/// All events emitted on stdout as JSON lines.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "data")]
#[serde(rename_all = "snake_case")]
pub enum AvatarEvent {
    Starting {},
    Ready {
        model: String,
        #[serde(rename = "hasApiKey")]
        has_api_key: bool,
    },
    ApiKeyRequired {},
    /// A new transcript entry (greeting, user text, empty reply placeholder).
    Message { message: ChatMessage },
    ChatChunk {
        #[serde(rename = "msgId")]
        msg_id: String,
        content: String,
    },
    ChatComplete {
        #[serde(rename = "msgId")]
        msg_id: String,
        content: String,
    },
    ChatError {
        #[serde(rename = "msgId")]
        msg_id: String,
        message: String,
    },
    Emotion { emotion: Emotion },
    SpeakingStart { text: String },
    SpeakingEnd {},
    ModelLoading { model: String },
    ModelLoaded { model: String },
    AvatarState { state: AvatarState },
    Frame { frame: FramePose },
    ModelList {
        models: Vec<ModelInfo>,
        current: String,
    },
    Pong {},
    Error { message: String },
    Stopping {},
}

// ---------------------------------------------------------------------------
// Commands: renderer -> core (stdin)
// ---------------------------------------------------------------------------

/// All commands read from stdin as JSON lines.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "command")]
#[serde(rename_all = "snake_case")]
pub enum AvatarCommand {
    Ping {},
    SendMessage {
        text: String,
    },
    SetApiKey {
        #[serde(rename = "apiKey", alias = "api_key")]
        api_key: String,
    },
    SetModel {
        model: String,
    },
    ListModels {},
    SetPosition {
        position: Vec3,
    },
    SetRotation {
        rotation: Vec3,
    },
    SetScale {
        scale: f32,
    },
    ResetTransform {},
    SetPose {
        pose: AvatarPose,
    },
    /// Older front-ends toggle gestures independently.
    SetGestureFlags {
        #[serde(default)]
        dancing: bool,
        #[serde(default)]
        jumping: bool,
        #[serde(default)]
        waving: bool,
    },
    Key {
        key: String,
        /// True while a text field has focus.
        #[serde(default)]
        typing: bool,
    },
    StopSpeech {},
    Stop {},
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_shape() {
        let json = serde_json::to_value(AvatarEvent::ChatChunk {
            msg_id: "m1".into(),
            content: "Hi".into(),
        })
        .unwrap();
        assert_eq!(json["event"], "chat_chunk");
        assert_eq!(json["data"]["msgId"], "m1");
        assert_eq!(json["data"]["content"], "Hi");

        let json = serde_json::to_value(AvatarEvent::SpeakingEnd {}).unwrap();
        assert_eq!(json["event"], "speaking_end");

        let json = serde_json::to_value(AvatarEvent::Emotion { emotion: Emotion::Happy }).unwrap();
        assert_eq!(json["data"]["emotion"], "happy");
    }

    #[test]
    fn test_command_parsing() {
        let cmd: AvatarCommand =
            serde_json::from_str(r#"{"command":"set_position","position":{"x":1.0,"y":0.5,"z":-2.0}}"#).unwrap();
        assert!(matches!(cmd, AvatarCommand::SetPosition { position } if position == Vec3::new(1.0, 0.5, -2.0)));

        let cmd: AvatarCommand = serde_json::from_str(r#"{"command":"set_pose","pose":"dancing"}"#).unwrap();
        assert!(matches!(cmd, AvatarCommand::SetPose { pose: AvatarPose::Dancing }));

        let cmd: AvatarCommand = serde_json::from_str(r#"{"command":"key","key":"a"}"#).unwrap();
        assert!(matches!(cmd, AvatarCommand::Key { typing: false, .. }));

        let cmd: AvatarCommand = serde_json::from_str(r#"{"command":"set_api_key","apiKey":"sk"}"#).unwrap();
        assert!(matches!(cmd, AvatarCommand::SetApiKey { api_key } if api_key == "sk"));

        let cmd: AvatarCommand = serde_json::from_str(r#"{"command":"set_gesture_flags","waving":true}"#).unwrap();
        assert!(matches!(cmd, AvatarCommand::SetGestureFlags { dancing: false, jumping: false, waving: true }));
    }

    #[test]
    fn test_unknown_command_rejected() {
        assert!(serde_json::from_str::<AvatarCommand>(r#"{"command":"explode"}"#).is_err());
    }
}
