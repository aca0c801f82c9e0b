//! IPC bridge: stdin reader and stdout event writer.
//!
//! A blocking stdin thread deserializes commands into an mpsc channel. Events
//! go out as one JSON object per line.

use std::io::{self, BufRead, Write};

use tokio::sync::mpsc;
use tracing::{debug, error};

use super::{AvatarCommand, AvatarEvent};

/// Emit an `AvatarEvent` as a JSON line on stdout and flush.
pub fn emit_event(event: &AvatarEvent) {
    let json = match serde_json::to_string(event) {
        Ok(j) => j,
        Err(e) => {
            error!("Failed to serialize event: {}", e);
            return;
        }
    };
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    // pipe may be closed
    let _ = writeln!(handle, "{}", json);
    let _ = handle.flush();
}

pub fn emit_error(message: &str) {
    emit_event(&AvatarEvent::Error {
        message: message.to_string(),
    });
}

/// Drain `rx` to stdout until every sender is gone.
pub fn spawn_stdout_writer(mut rx: mpsc::UnboundedReceiver<AvatarEvent>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            emit_event(&event);
        }
    })
}

/// Accept `{"type": ...}` as well as `{"command": ...}`.
pub(crate) fn normalize_command_json(input: &str) -> String {
    if let Ok(mut obj) = serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(input) {
        if !obj.contains_key("command") {
            if let Some(type_val) = obj.remove("type") {
                obj.insert("command".to_string(), type_val);
                if let Ok(json) = serde_json::to_string(&obj) {
                    return json;
                }
            }
        }
    }
    input.to_string()
}

/// Parse one input line. `Ok(None)` for blank lines.
pub(crate) fn parse_command_line(line: &str) -> Result<Option<AvatarCommand>, serde_json::Error> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    serde_json::from_str(&normalize_command_json(trimmed)).map(Some)
}

/// Spawn a blocking thread that reads JSON lines from stdin and forwards
/// parsed commands. The channel closes when stdin does.
pub fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<AvatarCommand> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        let stdin = io::stdin();
        let reader = stdin.lock();
        for line in reader.lines() {
            match line {
                Ok(text) => match parse_command_line(&text) {
                    Ok(Some(cmd)) => {
                        debug!(?cmd, "Received command");
                        if tx.send(cmd).is_err() {
                            break; // session is gone
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!("Invalid JSON command: {} (input: {})", e, text.trim());
                        emit_error(&format!("Invalid JSON command: {}", e));
                    }
                },
                Err(e) => {
                    error!("stdin read error: {}", e);
                    break;
                }
            }
        }
        debug!("stdin reader thread exiting");
    });

    rx
}
