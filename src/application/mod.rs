//! Application layer - the orchestration core.
//!
//! Each component owns its registry state behind async locks and exposes
//! the operations the HTTP/WebSocket adapters call. The
//! `ChatOrchestrator` coordinates them for the generation pipeline.

mod context_retriever;
mod domain_manager;
mod events;
mod orchestrator;
mod plugin_host;
mod provider_registry;
mod session_manager;

pub use context_retriever::{ContextRetriever, KeywordScorer};
pub use domain_manager::DomainManager;
pub use events::{SessionChannels, StreamEvent};
pub use orchestrator::{ChatOrchestrator, OrchestratorConfig, PreparedGeneration};
pub use plugin_host::{HookContext, PluginHost, PostHookHandler, PreHookHandler};
pub use provider_registry::ProviderRegistry;
pub use session_manager::{ConfigUpdate, GenerationTicket, RejectedField, SessionManager};
