//! Chat Orchestrator - drives a message through the generation pipeline.
//!
//! One turn moves through context gathering, generation, and streaming.
//! Context gathering degrades gracefully: a slow or failing retriever or
//! plugin hook is dropped, never fatal. Generation retries the session's
//! provider once, then fails over to the registry default. Streaming
//! watches the session's cancel flag and finalizes the assistant draft
//! exactly once on every exit path.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::time::timeout;

use crate::application::{
    ContextRetriever, GenerationTicket, HookContext, PluginHost, ProviderRegistry,
    SessionChannels, SessionManager, StreamEvent,
};
use crate::domain::foundation::{DomainError, ErrorCode, ProviderId, SessionId};
use crate::domain::knowledge::ContextSnippet;
use crate::domain::response_type::ResponseType;
use crate::domain::session::{Message, Sender, SessionConfig};
use crate::ports::{GenerationError, GenerationRequest, GenerationStream, PromptMessage};

/// Tunables for the generation pipeline.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// How many context snippets to retrieve per turn.
    pub top_k: usize,
    /// Budget for context gathering (retrieval and pre-hooks together).
    pub gather_timeout: Duration,
    /// How many transcript messages to carry into the prompt.
    pub history_window: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            gather_timeout: Duration::from_secs(3),
            history_window: 20,
        }
    }
}

/// A turn that has been admitted: the generation slot is held, the user
/// message is recorded, and an assistant draft is reserved.
#[derive(Debug)]
pub struct PreparedGeneration {
    ticket: GenerationTicket,
    user_message: Message,
    draft: Message,
    config: SessionConfig,
    query: String,
}

impl PreparedGeneration {
    pub fn session_id(&self) -> SessionId {
        self.ticket.session_id()
    }

    pub fn user_message(&self) -> &Message {
        &self.user_message
    }

    /// The pending assistant message the stream will fill.
    pub fn draft(&self) -> &Message {
        &self.draft
    }
}

/// Coordinates the per-turn generation pipeline.
pub struct ChatOrchestrator {
    sessions: Arc<SessionManager>,
    retriever: Arc<ContextRetriever>,
    plugins: Arc<PluginHost>,
    providers: Arc<ProviderRegistry>,
    channels: Arc<SessionChannels>,
    config: OrchestratorConfig,
}

impl ChatOrchestrator {
    pub fn new(
        sessions: Arc<SessionManager>,
        retriever: Arc<ContextRetriever>,
        plugins: Arc<PluginHost>,
        providers: Arc<ProviderRegistry>,
        channels: Arc<SessionChannels>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            sessions,
            retriever,
            plugins,
            providers,
            channels,
            config,
        }
    }

    /// Admits a turn: acquires the session's generation slot, records
    /// the user message, and reserves the assistant draft.
    ///
    /// All admission failures surface here, before any streaming starts,
    /// so transports can map them to plain error responses.
    ///
    /// # Errors
    ///
    /// - `SessionNotFound` / `SessionBusy` from slot acquisition
    /// - `EmptyContent` for a blank message
    pub async fn begin(
        &self,
        session_id: &SessionId,
        text: &str,
    ) -> Result<PreparedGeneration, DomainError> {
        let ticket = self.sessions.try_begin_generation(session_id).await?;
        // If either append fails the ticket drops here, freeing the slot.
        let user_message = self.sessions.append_user_message(session_id, text).await?;
        let draft = self.sessions.append_assistant_draft(session_id).await?;
        let config = self.sessions.get_session(session_id).await?.config().clone();

        Ok(PreparedGeneration {
            ticket,
            user_message,
            draft,
            config,
            query: text.trim().to_string(),
        })
    }

    /// Runs an admitted turn to completion, emitting events to `events`
    /// and mirroring them to the session's WebSocket subscribers.
    ///
    /// Never returns an error: every failure is reported as a terminal
    /// `Error` event and recorded on the assistant message.
    pub async fn run(&self, prepared: PreparedGeneration, events: mpsc::Sender<StreamEvent>) {
        let session_id = prepared.session_id();
        let cancel = prepared.ticket.cancel_flag();
        let mut draft = prepared.draft.clone();

        tracing::debug!(session = %session_id, "gathering context");
        let (snippets, notes) = self.gather_context(&prepared).await;

        let request = match self.build_request(&prepared, &snippets, &notes).await {
            Ok(request) => request,
            Err(err) => {
                self.finalize_failure(&session_id, &mut draft, err.code, &err.message, &events)
                    .await;
                return;
            }
        };

        tracing::debug!(session = %session_id, provider = %prepared.config.provider_id, "generating");
        let (provider_id, stream) = match self.acquire_stream(&prepared.config, request).await {
            Ok(acquired) => acquired,
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "generation failed on all providers");
                self.finalize_failure(
                    &session_id,
                    &mut draft,
                    ErrorCode::GenerationFailed,
                    &err.to_string(),
                    &events,
                )
                .await;
                return;
            }
        };

        tracing::debug!(session = %session_id, provider = %provider_id, "streaming");
        self.stream_response(&session_id, &provider_id, draft, stream, cancel, &events)
            .await;
        // Ticket drops here, releasing the generation slot.
    }

    /// Signals cancellation of the session's in-flight generation.
    pub async fn cancel(&self, session_id: &SessionId) -> Result<(), DomainError> {
        self.sessions.cancel_generation(session_id).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Pipeline stages
    // ─────────────────────────────────────────────────────────────────────────

    /// Runs retrieval and pre-hooks concurrently under the gather budget.
    async fn gather_context(
        &self,
        prepared: &PreparedGeneration,
    ) -> (Vec<ContextSnippet>, Vec<String>) {
        let session_id = prepared.session_id();
        let hook_context = HookContext::new(
            session_id,
            prepared.config.domain_id.clone(),
            prepared.query.clone(),
        );

        let (retrieved, hooked) = tokio::join!(
            timeout(
                self.config.gather_timeout,
                self.retriever
                    .query(&prepared.config.domain_id, &prepared.query, self.config.top_k),
            ),
            timeout(
                self.config.gather_timeout,
                self.plugins.run_pre_hooks(hook_context.clone()),
            ),
        );

        let mut snippets = match retrieved {
            Ok(Ok(snippets)) => snippets,
            Ok(Err(err)) => {
                tracing::warn!(session = %session_id, error = %err, "context retrieval failed");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(session = %session_id, "context retrieval timed out");
                Vec::new()
            }
        };

        let hooked = match hooked {
            Ok(context) => context,
            Err(_) => {
                tracing::warn!(session = %session_id, "pre-hooks timed out");
                hook_context
            }
        };
        snippets.extend(hooked.snippets);

        (snippets, hooked.notes)
    }

    /// Assembles the provider-agnostic request: response-type template
    /// plus context in the system prompt, transcript tail as messages.
    async fn build_request(
        &self,
        prepared: &PreparedGeneration,
        snippets: &[ContextSnippet],
        notes: &[String],
    ) -> Result<GenerationRequest, DomainError> {
        let config = &prepared.config;
        let response_type = ResponseType::builtin(&config.response_type_id).ok_or_else(|| {
            DomainError::invalid_configuration(
                "response_type_id",
                format!("Unknown response type '{}'", config.response_type_id),
            )
        })?;

        let mut system_prompt = response_type.template.clone();
        if !snippets.is_empty() {
            system_prompt.push_str("\n\nContext:\n");
            for snippet in snippets {
                system_prompt.push_str(&format!("[{}] {}\n", snippet.title, snippet.content));
            }
        }
        if !notes.is_empty() {
            system_prompt.push_str("\nNotes:\n");
            for note in notes {
                system_prompt.push_str(&format!("- {}\n", note));
            }
        }

        let session = self.sessions.get_session(&prepared.session_id()).await?;
        let mut request = GenerationRequest::new(config.model.clone())
            .with_system_prompt(system_prompt)
            .with_temperature(config.params.temperature)
            .with_max_tokens(config.params.max_tokens);

        let transcript: Vec<&Message> = session
            .messages()
            .iter()
            .filter(|m| m.status().is_final() && m.id() != prepared.draft.id())
            .filter(|m| !m.content().is_empty())
            .collect();
        let skip = transcript.len().saturating_sub(self.config.history_window);
        for message in transcript.into_iter().skip(skip) {
            let prompt_message = match message.sender() {
                Sender::User => PromptMessage::user(message.content()),
                Sender::Assistant => PromptMessage::assistant(message.content()),
            };
            request = request.with_message(prompt_message);
        }

        Ok(request)
    }

    /// Tries the session's provider twice, then the registry default.
    async fn acquire_stream(
        &self,
        config: &SessionConfig,
        request: GenerationRequest,
    ) -> Result<(ProviderId, GenerationStream), GenerationError> {
        const ATTEMPTS: u32 = 2;

        let mut last_error = GenerationError::unavailable("no providers attempted");
        for attempt in 1..=ATTEMPTS {
            match self
                .providers
                .generate(&config.provider_id, request.clone())
                .await
            {
                Ok(stream) => return Ok((config.provider_id.clone(), stream)),
                Err(err) => {
                    tracing::warn!(
                        provider = %config.provider_id,
                        attempt,
                        error = %err,
                        "generation attempt failed"
                    );
                    self.providers
                        .record_generation_failure(&config.provider_id, &err)
                        .await;
                    last_error = err;
                }
            }
        }

        let Some(fallback) = self.providers.default_provider().await else {
            return Err(last_error);
        };
        if fallback.id() == &config.provider_id {
            return Err(last_error);
        }

        // Keep the session's model if the fallback offers it.
        let model = if fallback.supports_model(&request.model) {
            request.model.clone()
        } else {
            match fallback.models().first() {
                Some(spec) => spec.name.clone(),
                None => return Err(last_error),
            }
        };
        tracing::warn!(
            from = %config.provider_id,
            to = %fallback.id(),
            model = %model,
            "failing over to default provider"
        );

        let mut fallback_request = request;
        fallback_request.model = model;
        match self.providers.generate(fallback.id(), fallback_request).await {
            Ok(stream) => Ok((fallback.id().clone(), stream)),
            Err(err) => {
                self.providers
                    .record_generation_failure(fallback.id(), &err)
                    .await;
                Err(err)
            }
        }
    }

    /// Consumes the stream, racing each chunk against the cancel flag.
    async fn stream_response(
        &self,
        session_id: &SessionId,
        provider_id: &ProviderId,
        mut draft: Message,
        mut stream: GenerationStream,
        mut cancel: tokio::sync::watch::Receiver<bool>,
        events: &mpsc::Sender<StreamEvent>,
    ) {
        if let Err(err) = draft.start_streaming() {
            tracing::error!(session = %session_id, error = %err, "draft in unexpected state");
            return;
        }

        let message_id = *draft.id();
        let mut seq = 0u64;

        loop {
            tokio::select! {
                changed = cancel.changed() => {
                    let cancelled = changed.is_ok() && *cancel.borrow();
                    if cancelled {
                        tracing::info!(session = %session_id, "generation cancelled");
                        self.finalize_failure(
                            session_id,
                            &mut draft,
                            ErrorCode::Cancelled,
                            "Generation cancelled",
                            events,
                        )
                        .await;
                        return;
                    }
                }
                item = stream.next() => match item {
                    Some(Ok(chunk)) if chunk.is_final() => break,
                    Some(Ok(chunk)) => {
                        if chunk.delta.is_empty() {
                            continue;
                        }
                        if let Err(err) = draft.append_delta(&chunk.delta) {
                            tracing::error!(session = %session_id, error = %err, "dropping chunk");
                            continue;
                        }
                        self.emit(
                            session_id,
                            events,
                            StreamEvent::Chunk {
                                message_id,
                                seq,
                                delta: chunk.delta,
                            },
                        )
                        .await;
                        seq += 1;
                    }
                    Some(Err(err)) => {
                        tracing::warn!(session = %session_id, error = %err, "stream interrupted");
                        self.providers.record_generation_failure(provider_id, &err).await;
                        self.finalize_failure(
                            session_id,
                            &mut draft,
                            ErrorCode::GenerationInterrupted,
                            &err.to_string(),
                            events,
                        )
                        .await;
                        return;
                    }
                    None => break,
                }
            }
        }

        if let Err(err) = draft.complete() {
            tracing::error!(session = %session_id, error = %err, "failed to finalize draft");
            return;
        }
        if let Err(err) = self.sessions.update_message(session_id, draft.clone()).await {
            tracing::error!(session = %session_id, error = %err, "failed to persist completed message");
        }
        self.providers.record_generation_success(provider_id).await;
        self.emit(
            session_id,
            events,
            StreamEvent::Done {
                message_id,
                content: draft.content().to_string(),
            },
        )
        .await;
        tracing::info!(session = %session_id, message = %message_id, chunks = seq, "generation completed");

        let plugins = self.plugins.clone();
        let completed = draft;
        tokio::spawn(async move {
            plugins.run_post_hooks(&completed).await;
        });
    }

    /// Fails the draft, persists it with partial content retained, and
    /// emits the terminal error event.
    async fn finalize_failure(
        &self,
        session_id: &SessionId,
        draft: &mut Message,
        code: ErrorCode,
        detail: &str,
        events: &mpsc::Sender<StreamEvent>,
    ) {
        let partial = if draft.content().is_empty() {
            None
        } else {
            Some(draft.content().to_string())
        };

        if let Err(err) = draft.fail(code) {
            tracing::error!(session = %session_id, error = %err, "draft already finalized");
            return;
        }
        if let Err(err) = self.sessions.update_message(session_id, draft.clone()).await {
            tracing::error!(session = %session_id, error = %err, "failed to persist failed message");
        }

        self.emit(
            session_id,
            events,
            StreamEvent::Error {
                message_id: *draft.id(),
                code: code.to_string(),
                error: detail.to_string(),
                partial_content: partial,
            },
        )
        .await;
    }

    /// Delivers an event to the turn's stream and WebSocket mirrors.
    async fn emit(&self, session_id: &SessionId, events: &mpsc::Sender<StreamEvent>, event: StreamEvent) {
        self.channels.publish(session_id, event.clone()).await;
        if events.send(event).await.is_err() {
            tracing::debug!(session = %session_id, "stream consumer dropped");
        }
    }
}
