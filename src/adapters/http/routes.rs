//! Routing table for the REST API and WebSocket endpoint.

use std::time::Duration;

use axum::routing::{delete, get, patch, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use super::handlers::{self, AppState};
use super::websocket::chat_ws_handler;

/// Versioned API routes.
///
/// - POST   /sessions
/// - GET    /sessions/{id}
/// - DELETE /sessions/{id}
/// - GET    /sessions/{id}/messages
/// - POST   /sessions/{id}/messages        (SSE stream)
/// - POST   /sessions/{id}/cancel
/// - PATCH  /sessions/{id}/config
/// - GET    /domains
/// - POST   /domains
/// - DELETE /domains/{id}
/// - POST   /domains/{id}/switch
/// - GET    /domains/{id}/search
/// - GET    /providers
/// - POST   /providers/{id}/test
/// - POST   /providers/{id}/default
/// - GET    /response-types
/// - GET    /plugins
/// - POST   /plugins/{id}/activate
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(handlers::create_session))
        .route(
            "/sessions/:session_id",
            get(handlers::get_session).delete(handlers::close_session),
        )
        .route(
            "/sessions/:session_id/messages",
            get(handlers::get_history).post(handlers::send_message),
        )
        .route("/sessions/:session_id/cancel", post(handlers::cancel_generation))
        .route("/sessions/:session_id/config", patch(handlers::update_config))
        .route(
            "/domains",
            get(handlers::list_domains).post(handlers::create_domain),
        )
        .route("/domains/:domain_id", delete(handlers::delete_domain))
        .route("/domains/:domain_id/switch", post(handlers::switch_domain))
        .route("/domains/:domain_id/search", get(handlers::search_domain))
        .route("/providers", get(handlers::list_providers))
        .route("/providers/:provider_id/test", post(handlers::test_provider))
        .route(
            "/providers/:provider_id/default",
            post(handlers::set_default_provider),
        )
        .route("/response-types", get(handlers::list_response_types))
        .route("/plugins", get(handlers::list_plugins))
        .route("/plugins/:plugin_id/activate", post(handlers::activate_plugin))
}

/// The full application router: versioned API, WebSocket endpoint, and
/// the ambient middleware stack.
pub fn app_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/ws/chat/:session_id", get(chat_ws_handler))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .layer(TimeoutLayer::new(request_timeout))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::Request;
    use http::StatusCode;
    use tower::ServiceExt;

    use crate::adapters::ai::MockBackend;
    use crate::adapters::storage::InMemorySessionStore;
    use crate::application::{
        ChatOrchestrator, ContextRetriever, DomainManager, KeywordScorer, OrchestratorConfig,
        PluginHost, ProviderRegistry, SessionChannels, SessionManager,
    };
    use crate::domain::foundation::ProviderId;
    use crate::domain::provider::{ModelSpec, Provider};

    fn test_state() -> AppState {
        let providers = Arc::new(ProviderRegistry::new().with_provider(
            Provider::new(
                ProviderId::new("openai").unwrap(),
                "OpenAI",
                vec![ModelSpec::new("gpt-4", 4000)],
                "usage-based",
            ),
            Arc::new(MockBackend::new()),
        ));
        let domains = Arc::new(DomainManager::with_default_limits());
        let sessions = Arc::new(SessionManager::new(
            Arc::new(InMemorySessionStore::new()),
            providers.clone(),
            domains.clone(),
        ));
        let retriever = Arc::new(ContextRetriever::new(
            domains.clone(),
            Arc::new(KeywordScorer),
        ));
        let plugins = Arc::new(PluginHost::new());
        let channels = Arc::new(SessionChannels::new());
        let orchestrator = Arc::new(ChatOrchestrator::new(
            sessions.clone(),
            retriever.clone(),
            plugins.clone(),
            providers.clone(),
            channels.clone(),
            OrchestratorConfig::default(),
        ));
        AppState {
            sessions,
            orchestrator,
            domains,
            providers,
            retriever,
            plugins,
            channels,
        }
    }

    fn router() -> Router {
        app_router(test_state(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn health_endpoint_responds() {
        let response = router()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn domain_catalog_is_served() {
        let response = router()
            .oneshot(Request::get("/api/v1/domains").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unknown_session_maps_to_not_found() {
        let missing = uuid::Uuid::new_v4();
        let response = router()
            .oneshot(
                Request::get(format!("/api/v1/sessions/{}", missing))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
