//! Streaming chat completions over HTTP.

use std::time::Duration;

use futures_util::StreamExt;
use tracing::{info, warn};

use super::sse::SseDecoder;
use super::{ApiMessage, ChatError, StreamHandler};
use crate::config::ChatConfig;

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
///
/// One request per call, no retries. Only connecting is bounded by a
/// timeout; a long reply may stream for as long as the server keeps going.
pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    referer: String,
    title: String,
}

impl ChatClient {
    pub fn new(config: &ChatConfig) -> Result<Self, ChatError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ChatError::Request(e.to_string()))?;
        Ok(Self {
            http,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            referer: config.referer.clone(),
            title: config.title.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Stream a completion into `handler`.
    pub async fn stream_completion(
        &self,
        messages: &[ApiMessage],
        api_key: &str,
        handler: &mut dyn StreamHandler,
    ) {
        info!(model = %self.model, messages = messages.len(), "Starting chat stream");
        match self.run_stream(messages, api_key, handler).await {
            Ok(()) => handler.on_complete(),
            Err(e) => {
                warn!("Chat stream failed: {}", e);
                handler.on_error(e);
            }
        }
    }

    /// Collect a whole reply into one string.
    pub async fn complete(&self, messages: &[ApiMessage], api_key: &str) -> Result<String, ChatError> {
        let mut collector = Collector::default();
        self.stream_completion(messages, api_key, &mut collector).await;
        match collector.error {
            Some(e) => Err(e),
            None => Ok(collector.text),
        }
    }

    async fn run_stream(
        &self,
        messages: &[ApiMessage],
        api_key: &str,
        handler: &mut dyn StreamHandler,
    ) -> Result<(), ChatError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": true,
        });

        let resp = self
            .http
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&body)
            .send()
            .await
            .map_err(|e| ChatError::Request(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ChatError::from_response(status.as_u16(), &text));
        }

        let mut stream = resp.bytes_stream();
        let mut decoder = SseDecoder::new();
        let mut chunks = 0usize;

        while let Some(read) = stream.next().await {
            let bytes = read.map_err(|e| ChatError::Stream(e.to_string()))?;
            for content in decoder.push(&bytes) {
                chunks += 1;
                handler.on_chunk(&content);
            }
        }
        if let Some(content) = decoder.finish() {
            chunks += 1;
            handler.on_chunk(&content);
        }

        info!(chunks, "Chat stream finished");
        Ok(())
    }
}

#[derive(Default)]
struct Collector {
    text: String,
    error: Option<ChatError>,
}

impl StreamHandler for Collector {
    fn on_chunk(&mut self, content: &str) {
        self.text.push_str(content);
    }

    fn on_complete(&mut self) {}

    fn on_error(&mut self, error: ChatError) {
        self.error = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Role;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    #[derive(Default)]
    struct Recorder {
        chunks: Vec<String>,
        completed: usize,
        errors: Vec<ChatError>,
    }

    impl StreamHandler for Recorder {
        fn on_chunk(&mut self, content: &str) {
            self.chunks.push(content.to_string());
        }
        fn on_complete(&mut self) {
            self.completed += 1;
        }
        fn on_error(&mut self, error: ChatError) {
            self.errors.push(error);
        }
    }

    fn sse(content: &str) -> String {
        format!(
            "data: {}\n\n",
            serde_json::json!({"choices": [{"delta": {"content": content}}]})
        )
    }

    /// One-shot HTTP server. Sends `head` then each body part as a separate
    /// write, closes the connection, and hands back the raw request text.
    async fn serve_once(head: String, parts: Vec<Vec<u8>>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = sock.read(&mut buf).await.unwrap();
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let len = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + len {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let _ = tx.send(String::from_utf8_lossy(&request).to_string());

            sock.write_all(head.as_bytes()).await.unwrap();
            for part in parts {
                sock.write_all(&part).await.unwrap();
                sock.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
            let _ = sock.shutdown().await;
        });

        (format!("http://{}/api/v1/chat/completions", addr), rx)
    }

    fn client(endpoint: String) -> ChatClient {
        let config = ChatConfig {
            endpoint,
            ..ChatConfig::default()
        };
        ChatClient::new(&config).unwrap()
    }

    const OK_HEAD: &str =
        "HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n";

    #[tokio::test]
    async fn test_streams_chunks_in_order_then_completes() {
        let body = format!(
            ": OPENROUTER PROCESSING\n\n{}{}{}data: [DONE]\n\n",
            sse("Hello"),
            sse(" there."),
            sse(" 😊")
        );
        let bytes = body.into_bytes();
        // reads end mid-line
        let cut_a = 40;
        let cut_b = bytes.len() - 20;
        let parts = vec![
            bytes[..cut_a].to_vec(),
            bytes[cut_a..cut_b].to_vec(),
            bytes[cut_b..].to_vec(),
        ];
        let (url, req_rx) = serve_once(OK_HEAD.to_string(), parts).await;

        let chat = client(url);
        let mut rec = Recorder::default();
        let messages = vec![ApiMessage::new(Role::User, "hi")];
        chat.stream_completion(&messages, "sk-test", &mut rec).await;

        assert_eq!(rec.chunks, vec!["Hello", " there.", " 😊"]);
        assert_eq!(rec.completed, 1);
        assert!(rec.errors.is_empty());

        let request = req_rx.await.unwrap();
        let lower = request.to_ascii_lowercase();
        assert!(lower.contains("authorization: bearer sk-test"));
        assert!(lower.contains("x-title: vrm chatbot"));
        assert!(lower.contains("http-referer:"));
        assert!(request.contains("\"stream\":true"));
        assert!(request.contains("deepseek/deepseek-r1-0528:free"));
    }

    #[tokio::test]
    async fn test_error_status_uses_api_message() {
        let body = r#"{"error":{"message":"User not found.","code":401}}"#;
        let head = format!(
            "HTTP/1.1 401 Unauthorized\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let (url, _req) = serve_once(head, Vec::new()).await;

        let mut rec = Recorder::default();
        client(url)
            .stream_completion(&[ApiMessage::new(Role::User, "hi")], "bad", &mut rec)
            .await;

        assert!(rec.chunks.is_empty());
        assert_eq!(rec.completed, 0);
        assert_eq!(rec.errors.len(), 1);
        assert_eq!(rec.errors[0].to_string(), "User not found.");
    }

    #[tokio::test]
    async fn test_error_status_without_json() {
        let head = "HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string();
        let (url, _req) = serve_once(head, Vec::new()).await;

        let result = client(url).complete(&[ApiMessage::new(Role::User, "hi")], "k").await;
        assert_eq!(
            result,
            Err(ChatError::Api {
                status: 503,
                message: "API Error 503".into()
            })
        );
    }

    #[tokio::test]
    async fn test_complete_collects_text() {
        let body = format!("{}{}data: [DONE]\n\n", sse("How are"), sse(" you?"));
        let (url, _req) = serve_once(OK_HEAD.to_string(), vec![body.into_bytes()]).await;

        let text = client(url).complete(&[ApiMessage::new(Role::User, "hi")], "k").await;
        assert_eq!(text.unwrap(), "How are you?");
    }

    #[tokio::test]
    async fn test_connection_refused_reports_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut rec = Recorder::default();
        client(format!("http://{}/v1/chat/completions", addr))
            .stream_completion(&[ApiMessage::new(Role::User, "hi")], "k", &mut rec)
            .await;
        assert_eq!(rec.completed, 0);
        assert!(matches!(rec.errors.as_slice(), [ChatError::Request(_)]));
    }
}
