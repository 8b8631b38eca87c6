//! Request/response DTOs for the REST API.

use serde::{Deserialize, Serialize};

use crate::application::{ConfigUpdate, RejectedField};
use crate::domain::foundation::{
    DomainId, MessageId, ProviderId, ResponseTypeId, SessionId, Timestamp,
};
use crate::domain::knowledge::{ContextSnippet, KnowledgeDomain};
use crate::domain::plugin::{HookKind, Plugin};
use crate::domain::provider::{ConnectionStatus, ModelSpec, Provider};
use crate::domain::response_type::ResponseType;
use crate::domain::session::{Message, MessageStatus, Sender, Session, SessionConfig};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Body for POST /sessions. Absent fields fall back to server defaults:
/// the active domain, the `conversation` response type, and the default
/// provider with its first model.
#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    pub domain_id: Option<DomainId>,
    pub response_type_id: Option<ResponseTypeId>,
    pub provider_id: Option<ProviderId>,
    pub model: Option<String>,
}

/// Body for POST /sessions/{id}/messages.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub content: String,
}

/// Query parameters for GET /sessions/{id}/messages.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
    /// Return messages with sequence strictly below this cursor.
    pub before: Option<u64>,
}

/// Body for POST /domains.
#[derive(Debug, Deserialize)]
pub struct CreateDomainRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub source_text: String,
}

/// Query parameters for GET /domains/{id}/search.
#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: String,
    pub top_k: Option<usize>,
}

/// Body for POST /plugins/{id}/activate.
#[derive(Debug, Deserialize)]
pub struct ActivatePluginRequest {
    pub active: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Views
// ─────────────────────────────────────────────────────────────────────────────

/// Error payload shared by all endpoints.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub code: String,
    pub message: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: SessionId,
    pub config: ConfigView,
    pub message_count: usize,
    pub created_at: Timestamp,
    pub last_activity: Timestamp,
}

impl From<&Session> for SessionView {
    fn from(session: &Session) -> Self {
        Self {
            id: *session.id(),
            config: ConfigView::from(session.config()),
            message_count: session.messages().len(),
            created_at: *session.created_at(),
            last_activity: *session.last_activity(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigView {
    pub domain_id: DomainId,
    pub response_type_id: ResponseTypeId,
    pub provider_id: ProviderId,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl From<&SessionConfig> for ConfigView {
    fn from(config: &SessionConfig) -> Self {
        Self {
            domain_id: config.domain_id.clone(),
            response_type_id: config.response_type_id.clone(),
            provider_id: config.provider_id.clone(),
            model: config.model.clone(),
            temperature: config.params.temperature,
            max_tokens: config.params.max_tokens,
        }
    }
}

/// Result of a config patch: the effective config plus rejected fields.
#[derive(Debug, Serialize)]
pub struct ConfigUpdateView {
    pub config: ConfigView,
    pub rejected: Vec<RejectedField>,
}

impl From<ConfigUpdate> for ConfigUpdateView {
    fn from(update: ConfigUpdate) -> Self {
        Self {
            config: ConfigView::from(&update.config),
            rejected: update.rejected,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub sequence: u64,
    pub sender: Sender,
    pub content: String,
    pub status: MessageStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    pub domain_id: DomainId,
    pub response_type_id: ResponseTypeId,
    pub created_at: Timestamp,
}

impl From<&Message> for MessageView {
    fn from(message: &Message) -> Self {
        Self {
            id: *message.id(),
            sequence: message.sequence(),
            sender: message.sender(),
            content: message.content().to_string(),
            status: message.status(),
            error_code: message.error_code().map(String::from),
            domain_id: message.domain_id().clone(),
            response_type_id: message.response_type_id().clone(),
            created_at: *message.created_at(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DomainView {
    pub id: DomainId,
    pub name: String,
    pub description: String,
    pub document_count: u32,
    pub last_updated: Timestamp,
    pub is_active: bool,
    pub is_builtin: bool,
}

impl From<&KnowledgeDomain> for DomainView {
    fn from(domain: &KnowledgeDomain) -> Self {
        Self {
            id: domain.id().clone(),
            name: domain.name().to_string(),
            description: domain.description().to_string(),
            document_count: domain.document_count(),
            last_updated: *domain.last_updated(),
            is_active: domain.is_active(),
            is_builtin: domain.is_builtin(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProviderView {
    pub id: ProviderId,
    pub name: String,
    pub status: ConnectionStatus,
    pub status_checked_at: Timestamp,
    pub models: Vec<ModelSpec>,
    pub pricing: String,
    pub is_default: bool,
}

impl From<&Provider> for ProviderView {
    fn from(provider: &Provider) -> Self {
        Self {
            id: provider.id().clone(),
            name: provider.name().to_string(),
            status: provider.status().clone(),
            status_checked_at: *provider.status_checked_at(),
            models: provider.models().to_vec(),
            pricing: provider.pricing().to_string(),
            is_default: provider.is_default(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PluginView {
    pub id: crate::domain::foundation::PluginId,
    pub name: String,
    pub category: String,
    pub is_installed: bool,
    pub is_active: bool,
    pub capabilities: Vec<HookKind>,
}

impl From<&Plugin> for PluginView {
    fn from(plugin: &Plugin) -> Self {
        Self {
            id: plugin.id().clone(),
            name: plugin.name().to_string(),
            category: plugin.category().to_string(),
            is_installed: plugin.is_installed(),
            is_active: plugin.is_active(),
            capabilities: plugin.capabilities().to_vec(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ResponseTypeView {
    pub id: ResponseTypeId,
    pub name: String,
    pub description: String,
}

impl From<&ResponseType> for ResponseTypeView {
    fn from(rt: &ResponseType) -> Self {
        Self {
            id: rt.id.clone(),
            name: rt.name.clone(),
            description: rt.description.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SnippetView {
    pub id: crate::domain::foundation::SnippetId,
    pub title: String,
    pub content: String,
    pub source_domain: DomainId,
    pub relevance_score: f32,
    pub word_count: u32,
}

impl From<ContextSnippet> for SnippetView {
    fn from(snippet: ContextSnippet) -> Self {
        Self {
            id: snippet.id,
            title: snippet.title,
            content: snippet.content,
            source_domain: snippet.source_domain,
            relevance_score: snippet.relevance_score,
            word_count: snippet.word_count,
        }
    }
}
