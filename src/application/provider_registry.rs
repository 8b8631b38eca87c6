//! Provider Registry - the catalog of configured LLM providers.
//!
//! Pairs each provider record with its generation backend, runs health
//! probes, and maintains exactly one default provider. Probe results
//! never fail the caller; they degrade the provider's status instead.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, ErrorCode, ProviderId, Timestamp};
use crate::domain::provider::{ConnectionStatus, Provider};
use crate::ports::{GenerationBackend, GenerationError, GenerationRequest, GenerationStream};

/// Catalog of providers and their backends.
pub struct ProviderRegistry {
    providers: RwLock<Vec<Provider>>,
    backends: HashMap<ProviderId, Arc<dyn GenerationBackend>>,
}

impl ProviderRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            backends: HashMap::new(),
        }
    }

    /// Adds a provider with its backend. The first provider added
    /// becomes the default.
    pub fn with_provider(mut self, mut provider: Provider, backend: Arc<dyn GenerationBackend>) -> Self {
        if self.backends.is_empty() {
            provider.set_default(true);
        }
        self.backends.insert(provider.id().clone(), backend);
        self.providers.get_mut().push(provider);
        self
    }

    /// Lists all providers in registration order.
    pub async fn list_providers(&self) -> Vec<Provider> {
        self.providers.read().await.clone()
    }

    /// Returns a provider by id.
    ///
    /// # Errors
    ///
    /// - `ProviderNotFound` if unknown
    pub async fn get(&self, provider_id: &ProviderId) -> Result<Provider, DomainError> {
        let providers = self.providers.read().await;
        providers
            .iter()
            .find(|p| p.id() == provider_id)
            .cloned()
            .ok_or_else(|| not_found(provider_id))
    }

    /// Returns the current default provider.
    pub async fn default_provider(&self) -> Option<Provider> {
        let providers = self.providers.read().await;
        providers.iter().find(|p| p.is_default()).cloned()
    }

    /// Makes `provider_id` the default, clearing the flag elsewhere.
    /// Both updates happen under one write lock, so readers never see
    /// zero or two defaults.
    ///
    /// # Errors
    ///
    /// - `ProviderNotFound` if unknown
    pub async fn set_default(&self, provider_id: &ProviderId) -> Result<Provider, DomainError> {
        let mut providers = self.providers.write().await;
        if !providers.iter().any(|p| p.id() == provider_id) {
            return Err(not_found(provider_id));
        }
        for provider in providers.iter_mut() {
            provider.set_default(provider.id() == provider_id);
        }
        Ok(providers
            .iter()
            .find(|p| p.id() == provider_id)
            .cloned()
            .expect("presence checked above"))
    }

    /// Probes a provider's connectivity and records the outcome.
    ///
    /// Always returns a status rather than an error: an unreachable or
    /// unknown provider reports as `Error`. The probe timestamp is taken
    /// before the round-trip, so a slow probe cannot overwrite a result
    /// that landed while it was in flight.
    pub async fn test_connection(&self, provider_id: &ProviderId) -> ConnectionStatus {
        let backend = match self.backends.get(provider_id) {
            Some(backend) => backend.clone(),
            None => return ConnectionStatus::Error(format!("unknown provider '{}'", provider_id)),
        };

        let probed_at = Timestamp::now();
        let status = match backend.probe().await {
            Ok(_) => ConnectionStatus::Connected,
            Err(err) => {
                tracing::warn!(provider = %provider_id, error = %err, "provider probe failed");
                ConnectionStatus::Error(err.to_string())
            }
        };

        self.record_status(provider_id, status.clone(), probed_at).await;
        status
    }

    /// Starts a generation on the named provider's backend.
    ///
    /// # Errors
    ///
    /// - `InvalidRequest` if the provider is unknown
    /// - any backend error otherwise
    pub async fn generate(
        &self,
        provider_id: &ProviderId,
        request: GenerationRequest,
    ) -> Result<GenerationStream, GenerationError> {
        let backend = self.backends.get(provider_id).ok_or_else(|| {
            GenerationError::InvalidRequest(format!("unknown provider '{}'", provider_id))
        })?;
        backend.generate(request).await
    }

    /// Marks a provider healthy after a successful generation.
    pub async fn record_generation_success(&self, provider_id: &ProviderId) {
        self.record_status(provider_id, ConnectionStatus::Connected, Timestamp::now())
            .await;
    }

    /// Demotes a provider's status after a failed generation.
    pub async fn record_generation_failure(&self, provider_id: &ProviderId, err: &GenerationError) {
        self.record_status(
            provider_id,
            ConnectionStatus::Error(err.to_string()),
            Timestamp::now(),
        )
        .await;
    }

    async fn record_status(&self, provider_id: &ProviderId, status: ConnectionStatus, probed_at: Timestamp) {
        let mut providers = self.providers.write().await;
        if let Some(provider) = providers.iter_mut().find(|p| p.id() == provider_id) {
            if !provider.record_status(status, probed_at) {
                tracing::debug!(provider = %provider_id, "stale probe result discarded");
            }
        }
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn not_found(provider_id: &ProviderId) -> DomainError {
    DomainError::new(
        ErrorCode::ProviderNotFound,
        format!("Provider '{}' is not configured", provider_id),
    )
    .with_detail("provider_id", provider_id.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::{MockBackend, MockResponse};
    use crate::domain::provider::ModelSpec;

    fn provider(id: &str) -> Provider {
        Provider::new(
            ProviderId::new(id).unwrap(),
            id,
            vec![ModelSpec::new("gpt-4", 4000)],
            "$0.002/1K tokens",
        )
    }

    fn registry_with(ids: &[&str]) -> ProviderRegistry {
        let mut registry = ProviderRegistry::new();
        for id in ids {
            registry = registry.with_provider(provider(id), Arc::new(MockBackend::new()));
        }
        registry
    }

    #[tokio::test]
    async fn first_registered_provider_is_default() {
        let registry = registry_with(&["openai", "anthropic"]);
        let default = registry.default_provider().await.unwrap();
        assert_eq!(default.id().as_str(), "openai");
    }

    #[tokio::test]
    async fn set_default_moves_the_flag_atomically() {
        let registry = registry_with(&["openai", "anthropic"]);
        let anthropic = ProviderId::new("anthropic").unwrap();

        let updated = registry.set_default(&anthropic).await.unwrap();
        assert!(updated.is_default());

        let defaults: Vec<_> = registry
            .list_providers()
            .await
            .into_iter()
            .filter(|p| p.is_default())
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].id().as_str(), "anthropic");
    }

    #[tokio::test]
    async fn set_default_unknown_provider_fails() {
        let registry = registry_with(&["openai"]);
        let err = registry
            .set_default(&ProviderId::new("google").unwrap())
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ProviderNotFound);
    }

    #[tokio::test]
    async fn successful_probe_marks_connected() {
        let registry = registry_with(&["openai"]);
        let openai = ProviderId::new("openai").unwrap();

        let status = registry.test_connection(&openai).await;
        assert!(status.is_connected());

        let provider = registry.get(&openai).await.unwrap();
        assert!(provider.status().is_connected());
    }

    #[tokio::test]
    async fn failed_probe_records_error_status() {
        let backend = MockBackend::new().with_probe_error(GenerationError::AuthenticationFailed);
        let registry =
            ProviderRegistry::new().with_provider(provider("openai"), Arc::new(backend));
        let openai = ProviderId::new("openai").unwrap();

        let status = registry.test_connection(&openai).await;
        assert!(matches!(status, ConnectionStatus::Error(_)));
        assert!(!registry.get(&openai).await.unwrap().status().is_connected());
    }

    #[tokio::test]
    async fn probing_unknown_provider_reports_error_status() {
        let registry = registry_with(&["openai"]);
        let status = registry
            .test_connection(&ProviderId::new("google").unwrap())
            .await;
        assert!(matches!(status, ConnectionStatus::Error(_)));
    }

    #[tokio::test]
    async fn generation_failure_demotes_then_success_restores() {
        let registry = registry_with(&["openai"]);
        let openai = ProviderId::new("openai").unwrap();

        registry
            .record_generation_failure(&openai, &GenerationError::network("reset"))
            .await;
        assert!(!registry.get(&openai).await.unwrap().status().is_connected());

        registry.record_generation_success(&openai).await;
        assert!(registry.get(&openai).await.unwrap().status().is_connected());
    }

    #[tokio::test]
    async fn generate_dispatches_to_backend() {
        let backend = Arc::new(
            MockBackend::new().with_response(MockResponse::success(["Hello", " there"])),
        );
        let registry = ProviderRegistry::new().with_provider(provider("openai"), backend.clone());

        let stream = registry
            .generate(
                &ProviderId::new("openai").unwrap(),
                GenerationRequest::new("gpt-4"),
            )
            .await
            .unwrap();
        drop(stream);

        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn generate_unknown_provider_fails() {
        let registry = registry_with(&["openai"]);
        let err = registry
            .generate(
                &ProviderId::new("google").unwrap(),
                GenerationRequest::new("gemini-pro"),
            )
            .await
            .err()
            .expect("expected generate to fail for unknown provider");
        assert!(matches!(err, GenerationError::InvalidRequest(_)));
    }
}
