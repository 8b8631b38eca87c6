//! Generation backend configuration.

use serde::Deserialize;
use std::time::Duration;

/// API keys and endpoints for the generation backends.
///
/// Providers without a key are simply not registered; with no keys at
/// all the server falls back to the mock backend, which is intended for
/// local development only.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AiConfig {
    /// OpenAI API key.
    pub openai_api_key: Option<String>,

    /// Anthropic API key.
    pub anthropic_api_key: Option<String>,

    /// Override for the OpenAI-compatible endpoint.
    pub openai_base_url: Option<String>,

    /// Override for the Anthropic endpoint.
    pub anthropic_base_url: Option<String>,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn has_openai(&self) -> bool {
        self.openai_api_key.as_ref().is_some_and(|k| !k.is_empty())
    }

    pub fn has_anthropic(&self) -> bool {
        self.anthropic_api_key.as_ref().is_some_and(|k| !k.is_empty())
    }
}

fn default_timeout() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_keys_count_as_absent() {
        let config = AiConfig {
            openai_api_key: Some(String::new()),
            ..Default::default()
        };
        assert!(!config.has_openai());
        assert!(!config.has_anthropic());
    }

    #[test]
    fn default_timeout_is_a_minute() {
        assert_eq!(AiConfig::default().timeout(), Duration::from_secs(60));
    }
}
