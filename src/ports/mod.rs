//! Ports - interfaces between the application core and the outside world.
//!
//! Adapters implement these traits; the application layer depends only on
//! the trait objects.

mod generation_backend;
mod relevance_scorer;
mod session_store;

pub use generation_backend::{
    FinishReason, GenerationBackend, GenerationChunk, GenerationError, GenerationRequest,
    GenerationStream, PromptMessage, PromptRole,
};
pub use relevance_scorer::RelevanceScorer;
pub use session_store::SessionStore;
