//! OpenAI-compatible generation backend.
//!
//! Streams chat completions over SSE: each `data:` line is parsed and
//! yielded as a chunk until the `[DONE]` marker. The probe is a
//! models-list round-trip. Any API exposing the same wire format
//! (several vendors do) works behind this adapter via `base_url`.

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

/// Configuration for an OpenAI-compatible backend.
#[derive(Debug, Clone)]
pub struct OpenAiBackendConfig {
    api_key: Secret<String>,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiBackendConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Secret::new(api_key.into()),
            base_url: "https://api.openai.com/v1".to_string(),
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

/// Backend speaking the OpenAI chat-completions API.
pub struct OpenAiBackend {
    config: OpenAiBackendConfig,
    client: Client,
}

impl OpenAiBackend {
    /// Creates a backend with its own HTTP client.
    ///
    /// # Errors
    ///
    /// Fails if the TLS stack cannot be initialized.
    pub fn new(config: OpenAiBackendConfig) -> Result<Self, GenerationError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::network(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
    }

    fn models_url(&self) -> String {
        format!("{}/models", self.config.base_url)
    }

    fn to_wire_request(&self, request: &GenerationRequest) -> WireRequest {
        let mut messages = Vec::new();
        if let Some(ref prompt) = request.system_prompt {
            messages.push(WireMessage {
                role: "system".to_string(),
                content: prompt.clone(),
            });
        }
        for msg in &request.messages {
            messages.push(WireMessage {
                role: match msg.role {
                    PromptRole::System => "system",
                    PromptRole::User => "user",
                    PromptRole::Assistant => "assistant",
                }
                .to_string(),
                content: msg.content.clone(),
            });
        }

        WireRequest {
            model: request.model.clone(),
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
            401 => Err(GenerationError::AuthenticationFailed),
            429 => Err(GenerationError::RateLimited {
                retry_after_secs: parse_retry_after(&error_body),
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
impl GenerationBackend for OpenAiBackend {
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream, GenerationError> {
        let wire_request = self.to_wire_request(&request);

        let response = self
            .client
            .post(self.completions_url())
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
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
            .header("Authorization", format!("Bearer {}", self.config.api_key()))
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

/// Parses SSE data lines into generation chunks.
fn parse_sse_chunks(text: &str) -> Vec<Result<GenerationChunk, GenerationError>> {
    let mut results = Vec::new();

    for line in text.lines() {
        let Some(data) = line.strip_prefix("data: ") else {
            continue;
        };
        if data == "[DONE]" {
            continue;
        }

        match serde_json::from_str::<StreamResponseChunk>(data) {
            Ok(chunk) => {
                if let Some(choice) = chunk.choices.first() {
                    if let Some(ref content) = choice.delta.content {
                        if !content.is_empty() {
                            results.push(Ok(GenerationChunk::content(content)));
                        }
                    }
                    if let Some(ref reason) = choice.finish_reason {
                        let finish = match reason.as_str() {
                            "length" => FinishReason::Length,
                            "content_filter" => FinishReason::ContentFilter,
                            _ => FinishReason::Stop,
                        };
                        results.push(Ok(GenerationChunk::final_chunk(finish)));
                    }
                }
            }
            Err(e) => {
                if !data.trim().is_empty() {
                    results.push(Err(GenerationError::parse(format!(
                        "Failed to parse SSE chunk: {}",
                        e
                    ))));
                }
            }
        }
    }

    results
}

/// Extracts a retry-after hint from a 429 error body, defaulting to 30s.
fn parse_retry_after(error_body: &str) -> u32 {
    if let Ok(parsed) = serde_json::from_str::<serde_json::Value>(error_body) {
        if let Some(msg) = parsed
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|m| m.as_str())
        {
            if let Some(idx) = msg.find("try again in ") {
                let rest = &msg[idx + 13..];
                let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
                if let Ok(secs) = digits.parse::<u32>() {
                    return secs;
                }
            }
        }
    }
    30
}

// ----- Wire types -----

#[derive(Debug, Serialize)]
struct WireRequest {
    model: String,
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
struct StreamResponseChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
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
    fn wire_request_includes_system_prompt_first() {
        let backend = OpenAiBackend::new(OpenAiBackendConfig::new("sk-test")).unwrap();
        let request = GenerationRequest::new("gpt-4")
            .with_system_prompt("Be helpful")
            .with_message(PromptMessage::user("Hello"));

        let wire = backend.to_wire_request(&request);
        assert_eq!(wire.model, "gpt-4");
        assert_eq!(wire.messages.len(), 2);
        assert_eq!(wire.messages[0].role, "system");
        assert_eq!(wire.messages[0].content, "Be helpful");
        assert_eq!(wire.messages[1].role, "user");
        assert!(wire.stream);
    }

    #[test]
    fn parses_content_deltas() {
        let sse = "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"},\"finish_reason\":null}]}\n";
        let chunks = parse_sse_chunks(sse);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].as_ref().unwrap().delta, "Hello");
    }

    #[test]
    fn parses_finish_reason_and_ignores_done_marker() {
        let sse = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"stop\"}]}\n\
                   data: [DONE]\n";
        let chunks = parse_sse_chunks(sse);
        assert_eq!(chunks.len(), 1);
        let chunk = chunks[0].as_ref().unwrap();
        assert!(chunk.is_final());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn length_finish_reason_maps() {
        let sse = "data: {\"choices\":[{\"delta\":{},\"finish_reason\":\"length\"}]}\n";
        let chunks = parse_sse_chunks(sse);
        assert_eq!(
            chunks[0].as_ref().unwrap().finish_reason,
            Some(FinishReason::Length)
        );
    }

    #[test]
    fn malformed_data_line_yields_parse_error() {
        let chunks = parse_sse_chunks("data: {not json}\n");
        assert_eq!(chunks.len(), 1);
        assert!(matches!(chunks[0], Err(GenerationError::Parse(_))));
    }

    #[test]
    fn non_data_lines_are_skipped() {
        let chunks = parse_sse_chunks(": keep-alive\n\nevent: ping\n");
        assert!(chunks.is_empty());
    }

    #[test]
    fn retry_after_parsed_from_error_message() {
        let body = r#"{"error":{"message":"Rate limit reached. Please try again in 7s."}}"#;
        assert_eq!(parse_retry_after(body), 7);
        assert_eq!(parse_retry_after("not json"), 30);
    }
}
