//! Provider module - configured LLM backends and their health state.

mod provider;

pub use provider::{ConnectionStatus, ModelSpec, Provider};
