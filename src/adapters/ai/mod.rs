//! Generation backend adapters.

mod anthropic_backend;
mod mock_backend;
mod openai_backend;

pub use anthropic_backend::{AnthropicBackend, AnthropicBackendConfig};
pub use mock_backend::{MockBackend, MockResponse};
pub use openai_backend::{OpenAiBackend, OpenAiBackendConfig};
