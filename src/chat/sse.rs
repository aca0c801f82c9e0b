//! Incremental decoder for OpenAI-style `text/event-stream` completions.
//!
//! Network reads split lines (and multi-byte characters) arbitrarily. Bytes
//! are buffered until a `\n` arrives. A newline byte never occurs inside a
//! UTF-8 sequence, so every complete line is also complete text.

use tracing::warn;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// Buffers raw bytes and yields the `delta.content` of every complete line.
#[derive(Debug, Default)]
pub struct SseDecoder {
    pending: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network read. Returns content deltas in arrival order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);

        let mut out = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            if let Some(content) = parse_line(&line) {
                out.push(content);
            }
        }
        out
    }

    /// Flush a trailing line the server sent without a final newline.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.pending);
        parse_line(&line)
    }
}

/// Extract non-empty `choices[0].delta.content` from one SSE line.
/// Comments, `[DONE]` and malformed payloads yield `None`.
fn parse_line(raw: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(raw);
    let data = line.trim().strip_prefix(DATA_PREFIX)?;
    if data == DONE_MARKER {
        return None;
    }

    let json: serde_json::Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            warn!("Skipping malformed stream chunk: {}", e);
            return None;
        }
    };

    json["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
