//! Generation Backend Port - interface for LLM provider integrations.
//!
//! This port abstracts all interactions with LLM backends (OpenAI,
//! Anthropic, etc.). The orchestrator generates through exactly this
//! surface; concrete vendor integration is pluggable behind it.

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Stream of generation output: content chunks terminated by a final
/// chunk (completion marker) or an error item.
pub type GenerationStream =
    Pin<Box<dyn Stream<Item = Result<GenerationChunk, GenerationError>> + Send>>;

/// Port for LLM generation.
///
/// Implementations connect to external services and translate between
/// the vendor API and these provider-agnostic types.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Starts a streamed generation.
    ///
    /// The returned stream yields content chunks in order; the final
    /// chunk carries a finish reason.
    async fn generate(&self, request: GenerationRequest) -> Result<GenerationStream, GenerationError>;

    /// Performs a lightweight connectivity round-trip (a models-list
    /// call) and returns the advertised model names.
    async fn probe(&self) -> Result<Vec<String>, GenerationError>;
}

/// A message in the prompt sent to a backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }

    /// Creates an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::Assistant,
            content: content.into(),
        }
    }
}

/// Role of a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// A provider-agnostic generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    /// Conversation history plus the current user message.
    pub messages: Vec<PromptMessage>,
    /// System prompt (response-type template + retrieved context).
    pub system_prompt: Option<String>,
    /// Model to generate with.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
}

impl GenerationRequest {
    /// Creates a request for the given model with default parameters.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            system_prompt: None,
            model: model.into(),
            temperature: 0.7,
            max_tokens: 2000,
        }
    }

    /// Adds a message to the prompt.
    pub fn with_message(mut self, message: PromptMessage) -> Self {
        self.messages.push(message);
        self
    }

    /// Sets the system prompt.
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Sets the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Sets the generation token ceiling.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

/// Why a generation stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the response.
    Stop,
    /// Hit the max_tokens ceiling.
    Length,
    /// Content was filtered by the provider.
    ContentFilter,
}

/// A chunk of streamed generation output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationChunk {
    /// New content in this chunk.
    pub delta: String,
    /// Present on the final chunk only.
    pub finish_reason: Option<FinishReason>,
}

impl GenerationChunk {
    /// Creates a content chunk.
    pub fn content(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            finish_reason: None,
        }
    }

    /// Creates the terminating chunk.
    pub fn final_chunk(finish_reason: FinishReason) -> Self {
        Self {
            delta: String::new(),
            finish_reason: Some(finish_reason),
        }
    }

    /// Returns true if this is the final chunk.
    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// Backend-level generation errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum GenerationError {
    /// Rate limited by the provider.
    #[error("rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u32 },

    /// Provider is unavailable.
    #[error("provider unavailable: {message}")]
    Unavailable { message: String },

    /// API key or authentication failed.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Network error during request.
    #[error("network error: {0}")]
    Network(String),

    /// Failed to parse the provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid request configuration.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Request timed out.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u32 },
}

impl GenerationError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Creates a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Returns true if retrying the same provider may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited { .. }
                | GenerationError::Unavailable { .. }
                | GenerationError::Network(_)
                | GenerationError::Timeout { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builder_works() {
        let request = GenerationRequest::new("gpt-4")
            .with_message(PromptMessage::user("Hello"))
            .with_system_prompt("Be helpful")
            .with_temperature(0.3)
            .with_max_tokens(500);

        assert_eq!(request.model, "gpt-4");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, PromptRole::User);
        assert_eq!(request.system_prompt.as_deref(), Some("Be helpful"));
        assert_eq!(request.temperature, 0.3);
        assert_eq!(request.max_tokens, 500);
    }

    #[test]
    fn prompt_message_constructors_set_roles() {
        assert_eq!(PromptMessage::system("s").role, PromptRole::System);
        assert_eq!(PromptMessage::user("u").role, PromptRole::User);
        assert_eq!(PromptMessage::assistant("a").role, PromptRole::Assistant);
    }

    #[test]
    fn content_chunk_is_not_final() {
        let chunk = GenerationChunk::content("Hello");
        assert!(!chunk.is_final());
        assert_eq!(chunk.delta, "Hello");
    }

    #[test]
    fn final_chunk_carries_reason() {
        let chunk = GenerationChunk::final_chunk(FinishReason::Stop);
        assert!(chunk.is_final());
        assert!(chunk.delta.is_empty());
        assert_eq!(chunk.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn retryable_classification() {
        assert!(GenerationError::RateLimited { retry_after_secs: 30 }.is_retryable());
        assert!(GenerationError::unavailable("down").is_retryable());
        assert!(GenerationError::network("reset").is_retryable());
        assert!(GenerationError::Timeout { timeout_secs: 30 }.is_retryable());

        assert!(!GenerationError::AuthenticationFailed.is_retryable());
        assert!(!GenerationError::parse("bad json").is_retryable());
        assert!(!GenerationError::InvalidRequest("no model".into()).is_retryable());
    }

    #[test]
    fn prompt_role_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&PromptRole::Assistant).unwrap(),
            "\"assistant\""
        );
    }

    #[test]
    fn errors_display_correctly() {
        assert_eq!(
            GenerationError::RateLimited { retry_after_secs: 30 }.to_string(),
            "rate limited: retry after 30s"
        );
        assert_eq!(
            GenerationError::unavailable("down for maintenance").to_string(),
            "provider unavailable: down for maintenance"
        );
    }
}
