//! Anthropic generation backend.
//!
//! Streams the messages API over SSE. Anthropic separates the system
//! prompt from the message list and tags SSE events by type:
//! `content_block_delta` carries text, `message_delta` carries the stop
//! reason.

use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::{Client, Response};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};

use crate::ports::{
    FinishReason, GenerationBackend, GenerationChunk, GenerationError, GenerationRequest,
    GenerationStream, PromptRole,
};

const API_VERSION: &str = "2023-06-01";

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicBackendConfig {
    api_key: Secret<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl AnthropicBackendConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "https://api.anthropic.com".to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }
}

/// Backend speaking the Anthropic messages API.
pub struct AnthropicBackend {
    config: AnthropicBackendConfig,
    client: Client,
}

impl AnthropicBackend {
    /// Creates a backend with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Fails if the TLS stack cannot be initialized.
    pub fn new(config: AnthropicBackendConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::network(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/v1/models", self.config.base_url)
    }

    fn to_wire_request(&self, request: &GenerationRequest) -> WireRequest {
        // Anthropic rejects system-role entries in the message list.
        let messages = request
            .messages
            .iter()
            .filter(|m| m.role != PromptRole::System)
            .map(|m| WireMessage {
                role: match m.role {
                    PromptRole::Assistant => "assistant",
                    _ => "user",
                }
                .to_string(),
                content: m.content.clone(),
            })
            .collect();

        WireRequest {
            model: request.model.clone(),
            system: request.system_prompt.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            stream: true,
        }
    }

    fn map_transport_error(&self, e: reqwest::Error) -> GenerationError {
        if e.is_timeout() {
            GenerationError::Timeout {
                timeout_secs: self.config.timeout.as_secs() as u32,
            }
        } else if e.is_connect() {
            GenerationError::network(format!("Connection failed: {}", e))
        } else {
            GenerationError::network(e.to_string())
        }
    }

    async fn check_status(&self, response: Response) -> Result<Response, GenerationError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_body = response.text().await.unwrap_or_default();
        match status.as_u16() {
            401 | 403 => Err(GenerationError::AuthenticationFailed),
            429 => Err(GenerationError::RateLimited {
                retry_after_secs: 30,
            }),
            400 => Err(GenerationError::InvalidRequest(error_body)),
            500..=599 => Err(GenerationError::unavailable(format!(
                "Server error {}: {}",
                status, error_body
            ))),
            _ => Err(GenerationError::network(format!(
                "Unexpected status {}: {}",
                status, error_body
            ))),
        }
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream, GenerationError> {
        let wire_request = self.to_wire_request(&request);

        let response = self
            .client
            .post(self.messages_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&wire_request)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let response = self.check_status(response).await?;

        let stream = response
            .bytes_stream()
            .map(|chunk_result| match chunk_result {
                Ok(bytes) => {
                    let text = String::from_utf8_lossy(&bytes);
                    parse_sse_chunks(&text)
                }
                Err(e) => vec![Err(GenerationError::network(format!("Stream error: {}", e)))],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(stream))
    }

    async fn probe(&self) -> Result<Vec<String>, GenerationError> {
        let response = self
            .client
            .get(self.models_url())
            .header("x-api-key", self.config.api_key())
            .header("anthropic-version", API_VERSION)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;
        let response = self.check_status(response).await?;

        let listing: ModelsResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::parse(format!("Failed to parse models list: {}", e)))?;
        Ok(listing.data.into_iter().map(|m| m.id).collect())
    }
}

fn parse_sse_chunks(text: &str) -> Vec<Result<GenerationChunk, GenerationError>> {
    let mut results = Vec::new();

    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };

        match serde_json::from_str::<SseEvent>(data) {
            Ok(SseEvent::ContentBlockDelta { delta }) => {
                if let Some(text) = delta.text {
                    if !text.is_empty() {
                        results.push(Ok(GenerationChunk::content(text)));
                    }
                }
            }
            Ok(SseEvent::MessageDelta { delta }) => {
                if let Some(reason) = delta.stop_reason {
                    let finish = match reason.as_str() {
                        "max_tokens" => FinishReason::Length,
                        _ => FinishReason::Stop,
                    };
                    results.push(Ok(GenerationChunk::final_chunk(finish)));
                }
            }
            Ok(SseEvent::Error { error }) => {
                results.push(Err(GenerationError::unavailable(error.message)));
            }
            Ok(SseEvent::Other) => {}
            Err(e) => {
                if !data.trim().is_empty() {
                    results.push(Err(GenerationError::parse(format!(
                        "Failed to parse SSE event: {}",
                        e
                    ))));
                }
            }
        }
    }

    results
}

// ----- Wire types -----

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum SseEvent {
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { delta: ContentDelta },
    #[serde(rename = "message_delta")]
    MessageDelta { delta: MessageDelta },
    #[serde(rename = "error")]
    Error { error: SseError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct ContentDelta {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MessageDelta {
    stop_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SseError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::PromptMessage;

    #[test]
    fn system_prompt_is_lifted_out_of_message_list() {
        let backend = AnthropicBackend::new(AnthropicBackendConfig::new("sk-ant-test")).unwrap();
        let request = GenerationRequest::new("claude-3")
            .with_system_prompt("Be concise")
            .with_message(PromptMessage::system("stray system entry"))
            .with_message(PromptMessage::user("Hello"));

        let wire = backend.to_wire_request(&request);
        assert_eq!(wire.system.as_deref(), Some("Be concise"));
        assert_eq!(wire.messages.len(), 1);
        assert_eq!(wire.messages[0].role, "user");
    }

    #[test]
    fn parses_text_deltas() {
        let sse = "data: {\"type\":\"content_block_delta\",\"delta\":{\"text\":\"Hi\"}}\n";
        let chunks = parse_sse_chunks(sse);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().delta, "Hi");
    }

    #[test]
    fn message_delta_terminates_stream() {
        let sse = "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"end_turn\"}}\n";
        let chunks = parse_sse_chunks(sse);
        let chunk = chunks[0].as_ref().unwrap();
        assert!(chunk.is_final());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn max_tokens_maps_to_length() {
        let sse = "data: {\"type\":\"message_delta\",\"delta\":{\"stop_reason\":\"max_tokens\"}}\n";
        let chunks = parse_sse_chunks(sse);
        assert_eq!(
            chunks[0].as_ref().unwrap().finish_reason,
            Some(FinishReason::Length)
        );
    }

    #[test]
    fn unknown_event_types_are_skipped() {
        let sse = "data: {\"type\":\"message_start\",\"message\":{}}\n\
                   data: {\"type\":\"ping\"}\n";
        assert!(parse_sse_chunks(sse).is_empty());
    }

    #[test]
    fn error_event_surfaces_as_stream_error() {
        let sse = "data: {\"type\":\"error\",\"error\":{\"message\":\"overloaded\"}}\n";
        let chunks = parse_sse_chunks(sse);
        assert!(matches!(
            chunks[0],
            Err(GenerationError::Unavailable { .. })
        ));
    }
}
