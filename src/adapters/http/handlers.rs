//! HTTP handlers connecting routes to the application layer.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{Json, Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::Stream;
use tokio::sync::mpsc;

use crate::application::{
    ChatOrchestrator, ContextRetriever, DomainManager, PluginHost, ProviderRegistry,
    SessionChannels, SessionManager, StreamEvent,
};
use crate::domain::foundation::{
    DomainError, DomainId, ErrorCode, PluginId, ProviderId, ResponseTypeId, SessionId,
};
use crate::domain::response_type::ResponseType;
use crate::domain::session::{ConfigPatch, SessionConfig};

use super::dto::{
    ActivatePluginRequest, ConfigUpdateView, CreateDomainRequest, CreateSessionRequest,
    DomainView, ErrorResponse, HistoryParams, MessageView, PluginView, ProviderView,
    ResponseTypeView, SearchParams, SendMessageRequest, SessionView, SnippetView,
};

const DEFAULT_HISTORY_LIMIT: usize = 50;
const MAX_HISTORY_LIMIT: usize = 200;
const DEFAULT_SEARCH_TOP_K: usize = 5;

// ─────────────────────────────────────────────────────────────────────────────
// Application state
// ─────────────────────────────────────────────────────────────────────────────

/// Shared state for all HTTP and WebSocket handlers.
#[derive(Clone)]
pub struct AppState {
    pub sessions: Arc<SessionManager>,
    pub orchestrator: Arc<ChatOrchestrator>,
    pub domains: Arc<DomainManager>,
    pub providers: Arc<ProviderRegistry>,
    pub retriever: Arc<ContextRetriever>,
    pub plugins: Arc<PluginHost>,
    pub channels: Arc<SessionChannels>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Error mapping
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP-facing wrapper around domain errors.
#[derive(Debug)]
pub struct ApiError(pub DomainError);

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0.code {
            ErrorCode::SessionNotFound
            | ErrorCode::DomainNotFound
            | ErrorCode::ProviderNotFound
            | ErrorCode::PluginNotInstalled => StatusCode::NOT_FOUND,
            ErrorCode::SessionBusy | ErrorCode::InvalidStateTransition => StatusCode::CONFLICT,
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidConfiguration
            | ErrorCode::EmptyContent => StatusCode::BAD_REQUEST,
            _ => {
                tracing::error!(error = %self.0, "internal error");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = ErrorResponse::new(self.0.code.to_string(), self.0.message);
        (status, Json(body)).into_response()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sessions
// ─────────────────────────────────────────────────────────────────────────────

/// POST /sessions - creates a session, defaulting absent fields.
pub async fn create_session(
    State(state): State<AppState>,
    Json(body): Json<CreateSessionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let domain_id = match body.domain_id {
        Some(domain_id) => domain_id,
        None => active_domain(&state).await?,
    };
    let response_type_id = body.response_type_id.unwrap_or_else(|| {
        ResponseTypeId::new("conversation").expect("builtin response type id is valid")
    });

    let (provider_id, default_model) = match body.provider_id {
        Some(provider_id) => {
            let provider = state.providers.get(&provider_id).await?;
            let model = provider.models().first().map(|m| m.name.clone());
            (provider_id, model)
        }
        None => {
            let provider = state.providers.default_provider().await.ok_or_else(|| {
                DomainError::new(
                    ErrorCode::InvalidConfiguration,
                    "No providers are configured",
                )
            })?;
            let model = provider.models().first().map(|m| m.name.clone());
            (provider.id().clone(), model)
        }
    };
    let model = match body.model.or(default_model) {
        Some(model) => model,
        None => {
            return Err(DomainError::invalid_configuration(
                "model",
                format!("Provider '{}' offers no models", provider_id),
            )
            .into())
        }
    };

    let config = SessionConfig::new(domain_id, response_type_id, provider_id, model);
    let session = state.sessions.create_session(config).await?;
    Ok((StatusCode::CREATED, Json(SessionView::from(&session))))
}

/// GET /sessions/{id}
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.sessions.get_session(&session_id).await?;
    Ok(Json(SessionView::from(&session)))
}

/// DELETE /sessions/{id}
pub async fn close_session(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<impl IntoResponse, ApiError> {
    state.sessions.close_session(&session_id).await?;
    state.channels.remove(&session_id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /sessions/{id}/messages
pub async fn get_history(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Query(params): Query<HistoryParams>,
) -> Result<impl IntoResponse, ApiError> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .min(MAX_HISTORY_LIMIT);
    let messages = state
        .sessions
        .get_history(&session_id, limit, params.before)
        .await?;
    let views: Vec<MessageView> = messages.iter().map(MessageView::from).collect();
    Ok(Json(views))
}

/// POST /sessions/{id}/messages - admits a turn, then streams it as SSE.
///
/// Admission failures (busy, empty content, unknown session) surface as
/// plain HTTP errors before the stream begins.
pub async fn send_message(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, ApiError> {
    let prepared = state.orchestrator.begin(&session_id, &body.content).await?;

    let (tx, rx) = mpsc::channel::<StreamEvent>(64);
    let orchestrator = state.orchestrator.clone();
    tokio::spawn(async move {
        orchestrator.run(prepared, tx).await;
    });

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        let sse_event = Event::default()
            .json_data(&event)
            .unwrap_or_else(|_| Event::default().data("{}"));
        Some((Ok(sse_event), rx))
    });

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

/// POST /sessions/{id}/cancel
pub async fn cancel_generation(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
) -> Result<impl IntoResponse, ApiError> {
    state.orchestrator.cancel(&session_id).await?;
    Ok(StatusCode::ACCEPTED)
}

/// PATCH /sessions/{id}/config
pub async fn update_config(
    State(state): State<AppState>,
    Path(session_id): Path<SessionId>,
    Json(patch): Json<ConfigPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let update = state.sessions.update_config(&session_id, patch).await?;
    Ok(Json(ConfigUpdateView::from(update)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Domains
// ─────────────────────────────────────────────────────────────────────────────

/// GET /domains
pub async fn list_domains(State(state): State<AppState>) -> impl IntoResponse {
    let domains = state.domains.list_domains().await;
    let views: Vec<DomainView> = domains.iter().map(DomainView::from).collect();
    Json(views)
}

/// POST /domains
pub async fn create_domain(
    State(state): State<AppState>,
    Json(body): Json<CreateDomainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = state
        .domains
        .create_custom_domain(&body.name, &body.description, &body.source_text)
        .await?;
    Ok((StatusCode::CREATED, Json(DomainView::from(&domain))))
}

/// DELETE /domains/{id}
pub async fn delete_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<DomainId>,
) -> Result<impl IntoResponse, ApiError> {
    state.domains.delete_domain(&domain_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /domains/{id}/switch
pub async fn switch_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<DomainId>,
) -> Result<impl IntoResponse, ApiError> {
    let domain = state.domains.switch_domain(&domain_id).await?;
    Ok(Json(DomainView::from(&domain)))
}

/// GET /domains/{id}/search
pub async fn search_domain(
    State(state): State<AppState>,
    Path(domain_id): Path<DomainId>,
    Query(params): Query<SearchParams>,
) -> Result<impl IntoResponse, ApiError> {
    let top_k = params.top_k.unwrap_or(DEFAULT_SEARCH_TOP_K);
    let snippets = state.retriever.query(&domain_id, &params.q, top_k).await?;
    let views: Vec<SnippetView> = snippets.into_iter().map(SnippetView::from).collect();
    Ok(Json(views))
}

// ─────────────────────────────────────────────────────────────────────────────
// Providers
// ─────────────────────────────────────────────────────────────────────────────

/// GET /providers
pub async fn list_providers(State(state): State<AppState>) -> impl IntoResponse {
    let providers = state.providers.list_providers().await;
    let views: Vec<ProviderView> = providers.iter().map(ProviderView::from).collect();
    Json(views)
}

/// POST /providers/{id}/test - probes connectivity; always 200 with the
/// resulting status.
pub async fn test_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<ProviderId>,
) -> impl IntoResponse {
    let status = state.providers.test_connection(&provider_id).await;
    Json(status)
}

/// POST /providers/{id}/default
pub async fn set_default_provider(
    State(state): State<AppState>,
    Path(provider_id): Path<ProviderId>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = state.providers.set_default(&provider_id).await?;
    Ok(Json(ProviderView::from(&provider)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Response types & plugins
// ─────────────────────────────────────────────────────────────────────────────

/// GET /response-types
pub async fn list_response_types() -> impl IntoResponse {
    let views: Vec<ResponseTypeView> = ResponseType::builtins()
        .iter()
        .map(ResponseTypeView::from)
        .collect();
    Json(views)
}

/// GET /plugins
pub async fn list_plugins(State(state): State<AppState>) -> impl IntoResponse {
    let plugins = state.plugins.list_plugins().await;
    let views: Vec<PluginView> = plugins.iter().map(PluginView::from).collect();
    Json(views)
}

/// POST /plugins/{id}/activate
pub async fn activate_plugin(
    State(state): State<AppState>,
    Path(plugin_id): Path<PluginId>,
    Json(body): Json<ActivatePluginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plugin = state.plugins.set_active(&plugin_id, body.active).await?;
    Ok(Json(PluginView::from(&plugin)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Health
// ─────────────────────────────────────────────────────────────────────────────

/// GET /health
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

async fn active_domain(state: &AppState) -> Result<DomainId, DomainError> {
    let domains = state.domains.list_domains().await;
    domains
        .iter()
        .find(|d| d.is_active())
        .or_else(|| domains.first())
        .map(|d| d.id().clone())
        .ok_or_else(|| {
            DomainError::new(ErrorCode::InvalidConfiguration, "No domains are configured")
        })
}
