//! Chat transport and conversation transcript.

pub mod client;
pub mod sse;

use serde::{Deserialize, Serialize};

pub use client::ChatClient;

/// Chat transport errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatError {
    /// Request never got a response (DNS, connect, TLS).
    Request(String),
    /// Non-success status. `message` is the API's own error text when it sent one.
    Api { status: u16, message: String },
    /// Response body broke off mid-stream.
    Stream(String),
}

impl ChatError {
    /// Build an API error from a status and raw response body, preferring
    /// `error.message` from a JSON body.
    pub fn from_response(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<serde_json::Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| format!("API Error {}", status));
        Self::Api { status, message }
    }
}

impl std::fmt::Display for ChatError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(e) => write!(f, "Request failed: {}", e),
            Self::Api { message, .. } => write!(f, "{}", message),
            Self::Stream(e) => write!(f, "Stream error: {}", e),
        }
    }
}

impl std::error::Error for ChatError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One entry in the conversation as the user sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
}

/// Request payload shape: `{role, content}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: String,
}

impl ApiMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Callbacks for one streaming completion. Exactly one of `on_complete` or
/// `on_error` is called, after every `on_chunk`.
pub trait StreamHandler: Send {
    fn on_chunk(&mut self, content: &str);
    fn on_complete(&mut self);
    fn on_error(&mut self, error: ChatError);
}

/// Append-only conversation log. The only in-place edit allowed is growing
/// the newest assistant message while its reply streams in.
#[derive(Debug, Default)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn push(&mut self, role: Role, content: impl Into<String>) -> &ChatMessage {
        self.messages.push(ChatMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content: content.into(),
        });
        &self.messages[self.messages.len() - 1]
    }

    /// Append text to message `id` if it is the newest assistant message.
    /// Returns false otherwise.
    pub fn append_to_reply(&mut self, id: &str, text: &str) -> bool {
        match self.messages.last_mut() {
            Some(last) if last.id == id && last.role == Role::Assistant => {
                last.content.push_str(text);
                true
            }
            _ => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&ChatMessage> {
        self.messages.iter().rev().find(|m| m.id == id)
    }

    /// Request messages: the system prompt followed by the history, with
    /// empty entries (a reply that has not started yet) left out.
    pub fn to_request(&self, system_prompt: &str) -> Vec<ApiMessage> {
        let mut out = Vec::with_capacity(self.messages.len() + 1);
        if !system_prompt.is_empty() {
            out.push(ApiMessage::new(Role::System, system_prompt));
        }
        out.extend(
            self.messages
                .iter()
                .filter(|m| !m.content.is_empty())
                .map(|m| ApiMessage::new(m.role, m.content.clone())),
        );
        out
    }
}
