//! Provider entity: one configured LLM backend.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{ProviderId, Timestamp};

/// Last-known connectivity of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "message")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error(String),
}

impl ConnectionStatus {
    /// Returns true if the provider can accept generation requests.
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// A model offered by a provider, with its token ceiling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub name: String,
    pub max_tokens: u32,
}

impl ModelSpec {
    /// Creates a model spec.
    pub fn new(name: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            name: name.into(),
            max_tokens,
        }
    }
}

/// A configured LLM provider.
///
/// Status is cache-like: it reflects the most recent probe or generation
/// outcome and is rebuilt after a restart. `status_checked_at` guards
/// against a stale probe overwriting a younger result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    id: ProviderId,
    name: String,
    status: ConnectionStatus,
    status_checked_at: Timestamp,
    models: Vec<ModelSpec>,
    pricing: String,
    is_default: bool,
}

impl Provider {
    /// Creates a provider record with `Disconnected` status pending a probe.
    pub fn new(
        id: ProviderId,
        name: impl Into<String>,
        models: Vec<ModelSpec>,
        pricing: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            status: ConnectionStatus::Disconnected,
            status_checked_at: Timestamp::now(),
            models,
            pricing: pricing.into(),
            is_default: false,
        }
    }

    /// Records a probe result, unless a younger probe already landed.
    ///
    /// Returns true if the status was applied.
    pub fn record_status(&mut self, status: ConnectionStatus, probed_at: Timestamp) -> bool {
        if probed_at.is_before(&self.status_checked_at) {
            return false;
        }
        self.status = status;
        self.status_checked_at = probed_at;
        true
    }

    /// Sets or clears the default flag.
    pub fn set_default(&mut self, is_default: bool) {
        self.is_default = is_default;
    }

    /// Returns true if this provider offers the named model.
    pub fn supports_model(&self, model: &str) -> bool {
        self.models.iter().any(|m| m.name == model)
    }

    /// Returns the token ceiling for a model, if offered.
    pub fn max_tokens_for(&self, model: &str) -> Option<u32> {
        self.models
            .iter()
            .find(|m| m.name == model)
            .map(|m| m.max_tokens)
    }

    /// Returns the provider ID.
    pub fn id(&self) -> &ProviderId {
        &self.id
    }

    /// Returns the display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the last-known connectivity status.
    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    /// Returns when the status was last recorded.
    pub fn status_checked_at(&self) -> &Timestamp {
        &self.status_checked_at
    }

    /// Returns the model catalog.
    pub fn models(&self) -> &[ModelSpec] {
        &self.models
    }

    /// Returns the pricing metadata string.
    pub fn pricing(&self) -> &str {
        &self.pricing
    }

    /// Returns true if this is the default provider.
    pub fn is_default(&self) -> bool {
        self.is_default
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn openai() -> Provider {
        Provider::new(
            ProviderId::new("openai").unwrap(),
            "OpenAI",
            vec![
                ModelSpec::new("gpt-4", 4000),
                ModelSpec::new("gpt-3.5-turbo", 4000),
            ],
            "$0.002/1K tokens",
        )
    }

    #[test]
    fn new_provider_starts_disconnected() {
        let p = openai();
        assert_eq!(p.status(), &ConnectionStatus::Disconnected);
        assert!(!p.is_default());
    }

    #[test]
    fn supports_model_checks_catalog() {
        let p = openai();
        assert!(p.supports_model("gpt-4"));
        assert!(!p.supports_model("claude-3"));
        assert_eq!(p.max_tokens_for("gpt-4"), Some(4000));
        assert_eq!(p.max_tokens_for("claude-3"), None);
    }

    #[test]
    fn record_status_applies_younger_probe() {
        let mut p = openai();
        let applied = p.record_status(ConnectionStatus::Connected, Timestamp::now());
        assert!(applied);
        assert!(p.status().is_connected());
    }

    #[test]
    fn record_status_ignores_stale_probe() {
        let mut p = openai();
        p.record_status(ConnectionStatus::Connected, Timestamp::now());

        let stale = Timestamp::now().minus_secs(30);
        let applied = p.record_status(ConnectionStatus::Error("old probe".into()), stale);

        assert!(!applied);
        assert!(p.status().is_connected());
    }

    #[test]
    fn error_status_is_not_connected() {
        assert!(!ConnectionStatus::Error("boom".into()).is_connected());
        assert!(!ConnectionStatus::Disconnected.is_connected());
    }

    #[test]
    fn status_serializes_tagged() {
        let json = serde_json::to_string(&ConnectionStatus::Error("auth".into())).unwrap();
        assert!(json.contains("\"state\":\"error\""));
        assert!(json.contains("\"message\":\"auth\""));

        let json = serde_json::to_string(&ConnectionStatus::Connected).unwrap();
        assert!(json.contains("\"state\":\"connected\""));
    }
}
