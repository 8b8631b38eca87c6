//! In-memory session store.
//!
//! The default persistence adapter: a map behind an async lock. A
//! database-backed store slots in behind the same port.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::foundation::{DomainError, SessionId};
use crate::domain::session::Session;
use crate::ports::SessionStore;

/// Map-backed session store.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<SessionId, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn save(&self, session: &Session) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        sessions.insert(*session.id(), session.clone());
        Ok(())
    }

    async fn find(&self, session_id: &SessionId) -> Result<Option<Session>, DomainError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.get(session_id).cloned())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        sessions.remove(session_id);
        Ok(())
    }

    async fn list_ids(&self) -> Result<Vec<SessionId>, DomainError> {
        let sessions = self.sessions.read().await;
        Ok(sessions.keys().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{DomainId, ProviderId, ResponseTypeId};
    use crate::domain::session::SessionConfig;

    fn session() -> Session {
        Session::new(SessionConfig::new(
            DomainId::new("biblical").unwrap(),
            ResponseTypeId::new("conversation").unwrap(),
            ProviderId::new("openai").unwrap(),
            "gpt-4",
        ))
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let store = InMemorySessionStore::new();
        let session = session();

        store.save(&session).await.unwrap();
        let found = store.find(session.id()).await.unwrap().unwrap();
        assert_eq!(found.id(), session.id());
    }

    #[tokio::test]
    async fn find_missing_returns_none() {
        let store = InMemorySessionStore::new();
        assert!(store.find(&SessionId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_replaces_previous_snapshot() {
        let store = InMemorySessionStore::new();
        let mut session = session();
        store.save(&session).await.unwrap();

        let sequence = session.next_sequence();
        let message = crate::domain::session::Message::user(
            *session.id(),
            sequence,
            "hello",
            session.config().domain_id.clone(),
            session.config().response_type_id.clone(),
        )
        .unwrap();
        session.append(message).unwrap();
        store.save(&session).await.unwrap();

        let found = store.find(session.id()).await.unwrap().unwrap();
        assert_eq!(found.messages().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_session() {
        let store = InMemorySessionStore::new();
        let session = session();
        store.save(&session).await.unwrap();
        store.delete(session.id()).await.unwrap();
        assert!(store.find(session.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_ids_reflects_contents() {
        let store = InMemorySessionStore::new();
        let a = session();
        let b = session();
        store.save(&a).await.unwrap();
        store.save(&b).await.unwrap();

        let ids = store.list_ids().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(a.id()));
        assert!(ids.contains(b.id()));
    }
}
