//! Sage Chat server binary - composition root.
//!
//! 1. Load configuration from the environment (`SAGE_CHAT__*`)
//! 2. Seed the domain catalog and provider registry
//! 3. Register the built-in plugins
//! 4. Probe provider connectivity and start the idle-session sweeper
//! 5. Serve the axum REST + SSE + WebSocket surface

use std::sync::Arc;

use async_trait::async_trait;

use sage_chat::adapters::ai::{
    AnthropicBackend, AnthropicBackendConfig, MockBackend, OpenAiBackend, OpenAiBackendConfig,
};
use sage_chat::adapters::http::{app_router, AppState};
use sage_chat::adapters::storage::InMemorySessionStore;
use sage_chat::application::{
    ChatOrchestrator, ContextRetriever, DomainManager, HookContext, KeywordScorer,
    OrchestratorConfig, PluginHost, PostHookHandler, PreHookHandler, ProviderRegistry,
    SessionChannels, SessionManager,
};
use sage_chat::config::{AiConfig, AppConfig};
use sage_chat::domain::foundation::{DomainError, PluginId, ProviderId};
use sage_chat::domain::plugin::{HookKind, Plugin};
use sage_chat::domain::provider::{ModelSpec, Provider};
use sage_chat::domain::session::Message;
use sage_chat::ports::{GenerationBackend, GenerationError};

// ─────────────────────────────────────────────────────────────────────────────
// Built-in plugins
// ─────────────────────────────────────────────────────────────────────────────

/// Pre-hook for the built-in `search` plugin.
///
/// External search is not wired up in this deployment; the hook records
/// the query and passes the context through unchanged so the plugin can
/// be toggled from the UI without affecting generation.
struct SearchPreHook;

#[async_trait]
impl PreHookHandler for SearchPreHook {
    async fn run(&self, context: HookContext) -> Result<HookContext, DomainError> {
        tracing::debug!(
            session = %context.session_id,
            domain = %context.domain_id,
            "search pre-hook invoked"
        );
        Ok(context)
    }
}

/// Post-hook for the built-in `calendar` plugin. Logs completions; the
/// calendar integration itself lives outside this service.
struct CalendarPostHook;

#[async_trait]
impl PostHookHandler for CalendarPostHook {
    async fn run(&self, message: &Message) -> Result<(), DomainError> {
        tracing::debug!(message = %message.id(), "calendar post-hook invoked");
        Ok(())
    }
}

async fn register_builtin_plugins(plugins: &PluginHost) {
    let search = Plugin::new(
        PluginId::new("search").expect("builtin plugin id is valid"),
        "Search",
        "retrieval",
        vec![HookKind::PreHook],
    )
    .with_active(true);
    plugins
        .register(search, Some(Arc::new(SearchPreHook)), None)
        .await;

    let calendar = Plugin::new(
        PluginId::new("calendar").expect("builtin plugin id is valid"),
        "Calendar",
        "scheduling",
        vec![HookKind::PostHook],
    );
    plugins
        .register(calendar, None, Some(Arc::new(CalendarPostHook)))
        .await;
}

// ─────────────────────────────────────────────────────────────────────────────
// Provider registry
// ─────────────────────────────────────────────────────────────────────────────

/// Seeds the provider catalog. Providers without an API key fall back to
/// the mock backend so the catalog (and the UI that lists it) stays
/// complete in local development.
fn build_provider_registry(ai: &AiConfig) -> Result<ProviderRegistry, GenerationError> {
    let openai_backend: Arc<dyn GenerationBackend> = if ai.has_openai() {
        let key = ai.openai_api_key.clone().unwrap_or_default();
        let mut config = OpenAiBackendConfig::new(key).with_timeout(ai.timeout());
        if let Some(url) = &ai.openai_base_url {
            config = config.with_base_url(url.clone());
        }
        Arc::new(OpenAiBackend::new(config)?)
    } else {
        tracing::warn!("No OpenAI API key configured; using the mock backend");
        Arc::new(MockBackend::new())
    };

    let anthropic_backend: Arc<dyn GenerationBackend> = if ai.has_anthropic() {
        let key = ai.anthropic_api_key.clone().unwrap_or_default();
        let mut config = AnthropicBackendConfig::new(key).with_timeout(ai.timeout());
        if let Some(url) = &ai.anthropic_base_url {
            config = config.with_base_url(url.clone());
        }
        Arc::new(AnthropicBackend::new(config)?)
    } else {
        tracing::warn!("No Anthropic API key configured; using the mock backend");
        Arc::new(MockBackend::new())
    };

    let openai = Provider::new(
        ProviderId::new("openai").expect("builtin provider id is valid"),
        "OpenAI",
        vec![
            ModelSpec::new("gpt-4", 4000),
            ModelSpec::new("gpt-3.5-turbo", 4000),
        ],
        "usage-based",
    );
    let anthropic = Provider::new(
        ProviderId::new("anthropic").expect("builtin provider id is valid"),
        "Anthropic",
        vec![
            ModelSpec::new("claude-3", 8000),
            ModelSpec::new("claude-2", 8000),
        ],
        "usage-based",
    );

    Ok(ProviderRegistry::new()
        .with_provider(openai, openai_backend)
        .with_provider(anthropic, anthropic_backend))
}

// ─────────────────────────────────────────────────────────────────────────────
// Entry point
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.server.log_level)),
        )
        .init();

    tracing::info!("Starting sage-chat v{}", env!("CARGO_PKG_VERSION"));

    // Application core.
    let domains = Arc::new(DomainManager::new(config.retrieval.max_chunks));
    let providers = Arc::new(build_provider_registry(&config.ai)?);
    let retriever = Arc::new(ContextRetriever::new(
        domains.clone(),
        Arc::new(KeywordScorer),
    ));
    let plugins = Arc::new(PluginHost::new());
    register_builtin_plugins(&plugins).await;

    let store = Arc::new(InMemorySessionStore::new());
    let sessions = Arc::new(SessionManager::new(
        store,
        providers.clone(),
        domains.clone(),
    ));
    let channels = Arc::new(SessionChannels::new());
    let orchestrator = Arc::new(ChatOrchestrator::new(
        sessions.clone(),
        retriever.clone(),
        plugins.clone(),
        providers.clone(),
        channels.clone(),
        OrchestratorConfig {
            top_k: config.retrieval.top_k,
            gather_timeout: config.retrieval.gather_timeout(),
            history_window: config.retrieval.history_window,
        },
    ));

    // Startup connectivity probes, off the serving path.
    let probe_registry = providers.clone();
    tokio::spawn(async move {
        for provider in probe_registry.list_providers().await {
            let status = probe_registry.test_connection(provider.id()).await;
            tracing::info!(provider = %provider.id(), status = ?status, "Startup probe");
        }
    });

    // Idle-session sweeper.
    let sweeper = sessions.clone();
    let max_idle_secs = config.retrieval.session_idle_secs;
    let mut sweep = tokio::time::interval(config.retrieval.sweep_interval());
    tokio::spawn(async move {
        loop {
            sweep.tick().await;
            let expired = sweeper.expire_idle(max_idle_secs).await;
            if !expired.is_empty() {
                tracing::info!(count = expired.len(), "Expired idle sessions");
            }
        }
    });

    let state = AppState {
        sessions,
        orchestrator,
        domains,
        providers,
        retriever,
        plugins,
        channels,
    };
    let router = app_router(
        state,
        std::time::Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %addr, "Server listening");

    axum::serve(listener, router).await?;

    Ok(())
}
