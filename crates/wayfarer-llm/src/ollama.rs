//! Ollama - Local Ollama streaming provider
//!
//! Talks to `/api/chat` with `stream: true`. Ollama answers with
//! newline-delimited JSON objects; every object carries a content fragment
//! and the last one has `done: true`.
//!
//! Structured output (result items, follow-up suggestions, pending
//! confirmations) is requested through the system prompt as a JSON trailer
//! after [`METADATA_MARKER`]. The trailer is cut out of the streamed text
//! and parsed into the final [`Completion`].

use crate::completion::{
    ChatRequest, ChatStream, Completion, PendingConfirmation, StreamEvent, STREAM_BUFFER,
};
use crate::error::{Error, Result};
use crate::message::Message;
use crate::provider::ChatModel;
use crate::util::sanitize_api_error;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Default Ollama model
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Default Ollama API URL
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Separates the visible answer from the JSON metadata trailer
pub const METADATA_MARKER: &str = "<<<metadata>>>";

const METADATA_INSTRUCTIONS: &str = "When your answer has structured data, end it with a line \
containing only <<<metadata>>> followed by a single JSON object. Allowed keys: \
\"results\" (array of objects such as flight or hotel offers), \"suggestions\" (array of \
short follow-up prompts) and \"confirmation\" (object with \"operation\", \"summary\" and \
\"payload\"). Always include \"confirmation\" before any booking, change, cancellation or \
payment is carried out, and never carry one out without it. Omit the block when there is \
nothing structured to add.";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaStreamChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMetadata {
    #[serde(default)]
    results: Vec<serde_json::Value>,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    confirmation: Option<PendingConfirmation>,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Ollama provider configuration
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL (default: http://localhost:11434)
    pub base_url: String,
    /// Model to use
    pub model: String,
    /// Request timeout (longer for local inference)
    pub timeout: Duration,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl OllamaConfig {
    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Ollama local provider
///
/// Text only: tool connections attached to a request are not offered to the
/// model by this provider.
pub struct OllamaProvider {
    client: Client,
    config: OllamaConfig,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Network(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn convert_messages(system_prompt: Option<&str>, messages: &[Message]) -> Vec<OllamaMessage> {
        let system = match system_prompt {
            Some(prompt) => format!("{prompt}\n\n{METADATA_INSTRUCTIONS}"),
            None => METADATA_INSTRUCTIONS.to_string(),
        };

        std::iter::once(OllamaMessage {
            role: "system",
            content: system,
        })
        .chain(messages.iter().map(|msg| OllamaMessage {
                role: msg.role.as_str(),
                content: msg.content.clone(),
            }))
            .collect()
    }
}

#[async_trait::async_trait]
impl ChatModel for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    #[instrument(skip(self, request), fields(model = %self.config.model, messages = request.messages.len()))]
    async fn stream(&self, request: ChatRequest) -> Result<ChatStream> {
        let url = format!("{}/api/chat", self.config.base_url);
        let body = OllamaChatRequest {
            model: self.config.model.clone(),
            messages: Self::convert_messages(request.system_prompt.as_deref(), &request.messages),
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    Error::Network(format!(
                        "Failed to connect to Ollama at {}",
                        self.config.base_url
                    ))
                } else if e.is_timeout() {
                    Error::Timeout(self.config.timeout.as_millis() as u64)
                } else {
                    Error::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Api(sanitize_api_error(&format!(
                "HTTP {}: {}",
                status, text
            ))));
        }

        let (tx, rx) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(async move {
            let mut bytes = response.bytes_stream();
            let mut decoder = LineDecoder::default();
            let mut parser = ChunkParser::default();
            while let Some(item) = bytes.next().await {
                let chunk = match item {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        let _ = tx.send(Err(Error::Network(e.to_string()))).await;
                        return;
                    }
                };
                for line in decoder.push(&chunk) {
                    if !forward_line(&tx, &mut parser, &line).await {
                        return;
                    }
                }
            }
            if let Some(line) = decoder.finish() {
                forward_line(&tx, &mut parser, &line).await;
            }
            // Without `done: true` the channel just closes; the consumer
            // treats that as a truncated stream.
        });

        Ok(rx)
    }
}

/// Parse one line and send its events; false once the stream is over
async fn forward_line(
    tx: &mpsc::Sender<Result<StreamEvent>>,
    parser: &mut ChunkParser,
    line: &str,
) -> bool {
    match parser.parse_line(line) {
        Ok(events) => {
            for event in events {
                let done = matches!(event, StreamEvent::Completed(_));
                if tx.send(Ok(event)).await.is_err() {
                    debug!("Ollama stream receiver dropped");
                    return false;
                }
                if done {
                    return false;
                }
            }
            true
        }
        Err(e) => {
            warn!(error = %e, "Malformed Ollama stream line");
            let _ = tx.send(Err(e)).await;
            false
        }
    }
}

/// Split a byte stream into complete UTF-8 lines
#[derive(Debug, Default)]
struct LineDecoder {
    pending: Vec<u8>,
}

impl LineDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }

    /// Whatever is left once the body ends without a trailing newline
    fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.pending);
        let text = String::from_utf8_lossy(&rest).trim().to_string();
        (!text.is_empty()).then_some(text)
    }
}

/// Turns stream lines into events and cuts the metadata trailer out of
/// the visible text
#[derive(Debug, Default)]
struct ChunkParser {
    /// Visible text held back because it may be the start of the marker
    held: String,
    /// Raw trailer once the marker has been seen
    trailer: Option<String>,
}

impl ChunkParser {
    fn parse_line(&mut self, line: &str) -> Result<Vec<StreamEvent>> {
        let chunk: OllamaStreamChunk = serde_json::from_str(line)
            .map_err(|e| Error::InvalidResponse(format!("bad stream chunk: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(Error::Api(sanitize_api_error(&error)));
        }

        let mut events = Vec::with_capacity(3);
        if let Some(message) = chunk.message {
            let visible = self.split(&message.content);
            if !visible.is_empty() {
                events.push(StreamEvent::Delta(visible));
            }
        }
        if chunk.done {
            let held = std::mem::take(&mut self.held);
            if !held.is_empty() {
                events.push(StreamEvent::Delta(held));
            }
            events.push(StreamEvent::Completed(self.completion()));
        }
        Ok(events)
    }

    /// Returns the text that is safe to show now
    fn split(&mut self, content: &str) -> String {
        if let Some(trailer) = self.trailer.as_mut() {
            trailer.push_str(content);
            return String::new();
        }

        self.held.push_str(content);
        if let Some(pos) = self.held.find(METADATA_MARKER) {
            let trailer = self.held.split_off(pos + METADATA_MARKER.len());
            self.held.truncate(pos);
            self.trailer = Some(trailer);
            return std::mem::take(&mut self.held);
        }

        // The marker is ASCII, so a matching suffix starts on a char boundary
        let keep = (1..METADATA_MARKER.len())
            .rev()
            .find(|k| self.held.ends_with(&METADATA_MARKER[..*k]))
            .unwrap_or(0);
        let tail = self.held.split_off(self.held.len() - keep);
        std::mem::replace(&mut self.held, tail)
    }

    fn completion(&mut self) -> Completion {
        let Some(raw) = self.trailer.take() else {
            return Completion::default();
        };

        let body = raw
            .trim()
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim();
        match serde_json::from_str::<ResponseMetadata>(body) {
            Ok(meta) => Completion {
                text: None,
                results: meta.results,
                suggestions: meta.suggestions,
                confirmation: meta.confirmation,
            },
            Err(e) => {
                warn!(error = %e, "Ignoring malformed metadata trailer");
                Completion::default()
            }
        }
    }
}
