//! Session Store Port - persistence seam for sessions.
//!
//! In-memory session state is authoritative during a generation; the
//! last successfully persisted state is the source of truth across
//! restarts.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::session::Session;

/// Port for session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persists a session snapshot, replacing any previous one.
    async fn save(&self, session: &Session) -> Result<(), DomainError>;

    /// Loads a session by id.
    async fn find(&self, session_id: &SessionId) -> Result<Option<Session>, DomainError>;

    /// Removes a session.
    async fn delete(&self, session_id: &SessionId) -> Result<(), DomainError>;

    /// Lists all stored session ids.
    async fn list_ids(&self) -> Result<Vec<SessionId>, DomainError>;
}
