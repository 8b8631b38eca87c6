//! Retrieval, ingestion, and session-lifecycle tunables.

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Tunables for the orchestration core.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Context snippets retrieved per turn.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Budget for context gathering, in seconds.
    #[serde(default = "default_gather_timeout")]
    pub gather_timeout_secs: u64,

    /// Transcript messages carried into the prompt.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Chunk ceiling for custom-domain ingestion.
    #[serde(default = "default_max_chunks")]
    pub max_chunks: usize,

    /// Idle sessions older than this are expired, in seconds.
    #[serde(default = "default_session_idle")]
    pub session_idle_secs: u64,

    /// How often the idle sweeper runs, in seconds.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl RetrievalConfig {
    pub fn gather_timeout(&self) -> Duration {
        Duration::from_secs(self.gather_timeout_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.top_k == 0 || self.top_k > 50 {
            return Err(ValidationError::InvalidTopK);
        }
        if self.gather_timeout_secs == 0 || self.gather_timeout_secs > 30 {
            return Err(ValidationError::InvalidGatherTimeout);
        }
        if self.max_chunks == 0 || self.max_chunks > 10_000 {
            return Err(ValidationError::InvalidChunkCeiling);
        }
        if self.session_idle_secs < 60 {
            return Err(ValidationError::InvalidIdleTimeout);
        }
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidSweepInterval);
        }
        Ok(())
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            gather_timeout_secs: default_gather_timeout(),
            history_window: default_history_window(),
            max_chunks: default_max_chunks(),
            session_idle_secs: default_session_idle(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

fn default_top_k() -> usize {
    5
}

fn default_gather_timeout() -> u64 {
    3
}

fn default_history_window() -> usize {
    20
}

fn default_max_chunks() -> usize {
    512
}

fn default_session_idle() -> u64 {
    1800
}

fn default_sweep_interval() -> u64 {
    60
}
