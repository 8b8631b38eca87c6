//! Session Manager - session lifecycle, transcripts, and configuration.
//!
//! In-memory sessions are authoritative; every state change is written
//! through to the session store. At most one generation runs per session,
//! enforced by a ticket the orchestrator must acquire first. Dropping
//! the ticket releases the slot, so a panicking pipeline cannot wedge a
//! session.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{watch, RwLock};

use crate::application::{DomainManager, ProviderRegistry};
use crate::domain::foundation::{DomainError, ErrorCode, SessionId};
use crate::domain::response_type::ResponseType;
use crate::domain::session::{
    ConfigPatch, GenerationParams, Message, Session, SessionConfig,
};

/// Result of a partial configuration update: the configuration that is
/// now in effect, plus the fields that were rejected.
#[derive(Debug, Clone)]
pub struct ConfigUpdate {
    pub config: SessionConfig,
    pub rejected: Vec<RejectedField>,
}

/// One rejected field of a configuration patch.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RejectedField {
    pub field: String,
    pub reason: String,
}

impl RejectedField {
    fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

type BusyMap = Arc<Mutex<HashMap<SessionId, watch::Sender<bool>>>>;

/// Exclusive right to run one generation on a session.
///
/// Holds the session's busy slot until dropped and carries the cancel
/// flag the streaming loop watches.
#[derive(Debug)]
pub struct GenerationTicket {
    session_id: SessionId,
    cancel_rx: watch::Receiver<bool>,
    busy: BusyMap,
}

impl GenerationTicket {
    /// Returns the session this ticket is for.
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Returns a receiver that flips to true when the generation is
    /// cancelled.
    pub fn cancel_flag(&self) -> watch::Receiver<bool> {
        self.cancel_rx.clone()
    }
}

impl Drop for GenerationTicket {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(&self.session_id);
        }
    }
}

/// Owns all live sessions.
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Session>>,
    busy: BusyMap,
    store: Arc<dyn crate::ports::SessionStore>,
    providers: Arc<ProviderRegistry>,
    domains: Arc<DomainManager>,
}

impl SessionManager {
    pub fn new(
        store: Arc<dyn crate::ports::SessionStore>,
        providers: Arc<ProviderRegistry>,
        domains: Arc<DomainManager>,
    ) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            busy: Arc::new(Mutex::new(HashMap::new())),
            store,
            providers,
            domains,
        }
    }

    /// Creates a session after validating its configuration.
    ///
    /// A provider whose cached status is not `Connected` gets one fresh
    /// probe before the session is rejected, so a cold registry (all
    /// providers start `Disconnected`) does not block session creation.
    ///
    /// # Errors
    ///
    /// - `DomainNotFound` / `ProviderNotFound` for unknown references
    /// - `InvalidConfiguration` for an unknown response type, a model the
    ///   provider does not offer, or a provider that is not connected
    pub async fn create_session(&self, config: SessionConfig) -> Result<Session, DomainError> {
        if !self.domains.exists(&config.domain_id).await {
            return Err(DomainError::domain_not_found(&config.domain_id));
        }
        if ResponseType::builtin(&config.response_type_id).is_none() {
            return Err(DomainError::invalid_configuration(
                "response_type_id",
                format!("Unknown response type '{}'", config.response_type_id),
            ));
        }
        let provider = self.providers.get(&config.provider_id).await?;
        if !provider.supports_model(&config.model) {
            return Err(DomainError::invalid_configuration(
                "model",
                format!(
                    "Provider '{}' does not offer model '{}'",
                    provider.id(),
                    config.model
                ),
            ));
        }
        if !provider.status().is_connected()
            && !self
                .providers
                .test_connection(&config.provider_id)
                .await
                .is_connected()
        {
            return Err(DomainError::invalid_configuration(
                "provider_id",
                format!("Provider '{}' is not connected", config.provider_id),
            ));
        }

        let session = Session::new(config);
        self.store.save(&session).await?;
        self.sessions.write().await.insert(*session.id(), session.clone());
        tracing::info!(session = %session.id(), "session created");
        Ok(session)
    }

    /// Returns a session snapshot.
    pub async fn get_session(&self, session_id: &SessionId) -> Result<Session, DomainError> {
        let sessions = self.sessions.read().await;
        sessions
            .get(session_id)
            .cloned()
            .ok_or_else(|| DomainError::session_not_found(session_id))
    }

    /// Lists all live session ids.
    pub async fn list_sessions(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().copied().collect()
    }

    /// Acquires the exclusive generation slot for a session.
    ///
    /// Fails fast rather than queueing.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if unknown
    /// - `SessionBusy` if a generation is already in flight
    pub async fn try_begin_generation(
        &self,
        session_id: &SessionId,
    ) -> Result<GenerationTicket, DomainError> {
        {
            let sessions = self.sessions.read().await;
            if !sessions.contains_key(session_id) {
                return Err(DomainError::session_not_found(session_id));
            }
        }

        let mut busy = self.busy.lock().expect("busy lock poisoned");
        if busy.contains_key(session_id) {
            return Err(DomainError::new(
                ErrorCode::SessionBusy,
                "A generation is already in progress for this session",
            )
            .with_detail("session_id", session_id.to_string()));
        }
        let (cancel_tx, cancel_rx) = watch::channel(false);
        busy.insert(*session_id, cancel_tx);
        drop(busy);

        Ok(GenerationTicket {
            session_id: *session_id,
            cancel_rx,
            busy: self.busy.clone(),
        })
    }

    /// Signals cancellation of the in-flight generation.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` if unknown
    /// - `InvalidStateTransition` if nothing is in flight
    pub async fn cancel_generation(&self, session_id: &SessionId) -> Result<(), DomainError> {
        {
            let sessions = self.sessions.read().await;
            if !sessions.contains_key(session_id) {
                return Err(DomainError::session_not_found(session_id));
            }
        }

        let busy = self.busy.lock().expect("busy lock poisoned");
        match busy.get(session_id) {
            Some(cancel_tx) => {
                // Receiver may already be gone if the pipeline just finished.
                let _ = cancel_tx.send(true);
                Ok(())
            }
            None => Err(DomainError::new(
                ErrorCode::InvalidStateTransition,
                "No generation is in flight for this session",
            )),
        }
    }

    /// Returns true if a generation is currently running.
    pub fn is_busy(&self, session_id: &SessionId) -> bool {
        self.busy
            .lock()
            .map(|busy| busy.contains_key(session_id))
            .unwrap_or(false)
    }

    /// Appends a user message built from the session's current
    /// configuration, assigning the next sequence number.
    pub async fn append_user_message(
        &self,
        session_id: &SessionId,
        content: &str,
    ) -> Result<Message, DomainError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| DomainError::session_not_found(session_id))?;

        let sequence = session.next_sequence();
        let message = Message::user(
            *session.id(),
            sequence,
            content,
            session.config().domain_id.clone(),
            session.config().response_type_id.clone(),
        )?;
        session.append(message.clone())?;
        self.store.save(session).await?;
        Ok(message)
    }

    /// Appends a pending assistant draft stamped with the configuration
    /// in effect right now, so a later domain switch cannot relabel it.
    pub async fn append_assistant_draft(
        &self,
        session_id: &SessionId,
    ) -> Result<Message, DomainError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| DomainError::session_not_found(session_id))?;

        let sequence = session.next_sequence();
        let draft = Message::assistant_pending(
            *session.id(),
            sequence,
            session.config().domain_id.clone(),
            session.config().response_type_id.clone(),
        );
        session.append(draft.clone())?;
        self.store.save(session).await?;
        Ok(draft)
    }

    /// Publishes a new version of an unfinalized message.
    pub async fn update_message(
        &self,
        session_id: &SessionId,
        message: Message,
    ) -> Result<(), DomainError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| DomainError::session_not_found(session_id))?;
        session.update_message(message)?;
        self.store.save(session).await?;
        Ok(())
    }

    /// Returns transcript history, newest page by default.
    pub async fn get_history(
        &self,
        session_id: &SessionId,
        limit: usize,
        before: Option<u64>,
    ) -> Result<Vec<Message>, DomainError> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(session_id)
            .ok_or_else(|| DomainError::session_not_found(session_id))?;
        Ok(session
            .history(limit, before)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Applies a partial configuration update.
    ///
    /// Each present field is validated independently: invalid fields are
    /// reported back, valid ones commit together. Changes take effect on
    /// the next generation only.
    pub async fn update_config(
        &self,
        session_id: &SessionId,
        patch: ConfigPatch,
    ) -> Result<ConfigUpdate, DomainError> {
        let current = self.get_session(session_id).await?.config().clone();
        let mut rejected = Vec::new();
        let mut next = current.clone();

        if let Some(domain_id) = patch.domain_id {
            if self.domains.exists(&domain_id).await {
                next.domain_id = domain_id;
            } else {
                rejected.push(RejectedField::new(
                    "domain_id",
                    format!("Unknown domain '{}'", domain_id),
                ));
            }
        }

        if let Some(response_type_id) = patch.response_type_id {
            if ResponseType::builtin(&response_type_id).is_some() {
                next.response_type_id = response_type_id;
            } else {
                rejected.push(RejectedField::new(
                    "response_type_id",
                    format!("Unknown response type '{}'", response_type_id),
                ));
            }
        }

        if let Some(provider_id) = patch.provider_id {
            match self.providers.get(&provider_id).await {
                Ok(_) => next.provider_id = provider_id,
                Err(_) => rejected.push(RejectedField::new(
                    "provider_id",
                    format!("Unknown provider '{}'", provider_id),
                )),
            }
        }

        // The model is validated against whichever provider is in effect
        // after the patch.
        let effective_provider = self.providers.get(&next.provider_id).await?;
        if let Some(model) = patch.model {
            if effective_provider.supports_model(&model) {
                next.model = model;
            } else {
                rejected.push(RejectedField::new(
                    "model",
                    format!(
                        "Provider '{}' does not offer model '{}'",
                        effective_provider.id(),
                        model
                    ),
                ));
            }
        } else if !effective_provider.supports_model(&next.model) {
            // Provider switched out from under the current model.
            rejected.push(RejectedField::new(
                "provider_id",
                format!(
                    "Provider '{}' does not offer current model '{}'",
                    effective_provider.id(),
                    next.model
                ),
            ));
            next.provider_id = current.provider_id.clone();
        }

        let temperature = patch.temperature.unwrap_or(next.params.temperature);
        let max_tokens = patch.max_tokens.unwrap_or(next.params.max_tokens);
        match GenerationParams::new(temperature, max_tokens) {
            Ok(params) => {
                if let Some(ceiling) = effective_provider.max_tokens_for(&next.model) {
                    if params.max_tokens > ceiling {
                        rejected.push(RejectedField::new(
                            "max_tokens",
                            format!("Model '{}' allows at most {} tokens", next.model, ceiling),
                        ));
                    } else {
                        next.params = params;
                    }
                } else {
                    next.params = params;
                }
            }
            Err(err) => {
                let field = if patch.temperature.is_some() {
                    "temperature"
                } else {
                    "max_tokens"
                };
                rejected.push(RejectedField::new(field, err.to_string()));
            }
        }

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| DomainError::session_not_found(session_id))?;
        *session.config_mut() = next.clone();
        self.store.save(session).await?;

        if !rejected.is_empty() {
            tracing::debug!(
                session = %session_id,
                rejected = rejected.len(),
                "config patch partially rejected"
            );
        }
        Ok(ConfigUpdate {
            config: next,
            rejected,
        })
    }

    /// Closes a session: cancels any in-flight generation, then removes
    /// it from memory and the store.
    pub async fn close_session(&self, session_id: &SessionId) -> Result<(), DomainError> {
        let removed = self.sessions.write().await.remove(session_id);
        if removed.is_none() {
            return Err(DomainError::session_not_found(session_id));
        }

        {
            let busy = self.busy.lock().expect("busy lock poisoned");
            if let Some(cancel_tx) = busy.get(session_id) {
                let _ = cancel_tx.send(true);
            }
        }

        self.store.delete(session_id).await?;
        tracing::info!(session = %session_id, "session closed");
        Ok(())
    }

    /// Removes sessions idle longer than `max_idle_secs`. Sessions with
    /// a generation in flight are skipped. Returns the expired ids.
    pub async fn expire_idle(&self, max_idle_secs: u64) -> Vec<SessionId> {
        let candidates: Vec<SessionId> = {
            let sessions = self.sessions.read().await;
            sessions
                .iter()
                .filter(|(id, session)| session.is_idle(max_idle_secs) && !self.is_busy(id))
                .map(|(id, _)| *id)
                .collect()
        };

        let mut expired = Vec::new();
        for session_id in candidates {
            self.sessions.write().await.remove(&session_id);
            if let Err(err) = self.store.delete(&session_id).await {
                tracing::warn!(session = %session_id, error = %err, "failed to delete expired session");
            }
            tracing::info!(session = %session_id, "idle session expired");
            expired.push(session_id);
        }
        expired
    }
}
