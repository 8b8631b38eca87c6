//! Message entity for session transcripts.
//!
//! Messages are append-only records of user/assistant exchanges. A message
//! is mutable only while `Pending` or `Streaming`; once it reaches
//! `Complete` or `Failed` it is frozen, including any partial content
//! accumulated before a failure.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    DomainError, DomainId, ErrorCode, MessageId, ResponseTypeId, SessionId, Timestamp,
};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    /// End-user input.
    User,
    /// Generated assistant reply.
    Assistant,
}

/// Lifecycle of a message.
///
/// User messages are created `Complete`. Assistant messages move
/// `Pending → Streaming → Complete` on success, or to `Failed` on
/// interruption, cancellation, or exhausted failover.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Streaming,
    Complete,
    Failed,
}

impl MessageStatus {
    /// Returns true once the message can no longer change.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

/// A message within a session transcript.
///
/// # Invariants
///
/// - `sequence` is strictly increasing per session (assigned by the
///   owning `Session` on append)
/// - content and status are frozen once the status is final
/// - the recorded domain/response type reflect the session configuration
///   at append time and never change afterwards
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: MessageId,
    session_id: SessionId,
    sequence: u64,
    sender: Sender,
    content: String,
    status: MessageStatus,
    /// Error code attached when the message failed, if any.
    error_code: Option<String>,
    /// Domain the message was produced under.
    domain_id: DomainId,
    /// Response-type template the message was produced under.
    response_type_id: ResponseTypeId,
    created_at: Timestamp,
}

impl Message {
    /// Creates a completed user message.
    ///
    /// # Errors
    ///
    /// - `EmptyContent` if content is empty or whitespace
    pub fn user(
        session_id: SessionId,
        sequence: u64,
        content: impl Into<String>,
        domain_id: DomainId,
        response_type_id: ResponseTypeId,
    ) -> Result<Self, DomainError> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(
                DomainError::new(ErrorCode::EmptyContent, "Message content cannot be empty")
                    .with_detail("field", "content"),
            );
        }
        Ok(Self {
            id: MessageId::new(),
            session_id,
            sequence,
            sender: Sender::User,
            content,
            status: MessageStatus::Complete,
            error_code: None,
            domain_id,
            response_type_id,
            created_at: Timestamp::now(),
        })
    }

    /// Creates a pending assistant message awaiting generation.
    pub fn assistant_pending(
        session_id: SessionId,
        sequence: u64,
        domain_id: DomainId,
        response_type_id: ResponseTypeId,
    ) -> Self {
        Self {
            id: MessageId::new(),
            session_id,
            sequence,
            sender: Sender::Assistant,
            content: String::new(),
            status: MessageStatus::Pending,
            error_code: None,
            domain_id,
            response_type_id,
            created_at: Timestamp::now(),
        }
    }

    /// Reconstitutes a message from persistence (no validation).
    #[allow(clippy::too_many_arguments)]
    pub fn reconstitute(
        id: MessageId,
        session_id: SessionId,
        sequence: u64,
        sender: Sender,
        content: String,
        status: MessageStatus,
        error_code: Option<String>,
        domain_id: DomainId,
        response_type_id: ResponseTypeId,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id,
            session_id,
            sequence,
            sender,
            content,
            status,
            error_code,
            domain_id,
            response_type_id,
            created_at,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    /// Marks a pending assistant message as streaming.
    pub fn start_streaming(&mut self) -> Result<(), DomainError> {
        if self.status != MessageStatus::Pending {
            return Err(self.transition_error("start_streaming"));
        }
        self.status = MessageStatus::Streaming;
        Ok(())
    }

    /// Appends a streamed content delta.
    pub fn append_delta(&mut self, delta: &str) -> Result<(), DomainError> {
        if self.status != MessageStatus::Streaming {
            return Err(self.transition_error("append_delta"));
        }
        self.content.push_str(delta);
        Ok(())
    }

    /// Finalizes the message content, freezing it.
    pub fn complete(&mut self) -> Result<(), DomainError> {
        if self.status.is_final() {
            return Err(self.transition_error("complete"));
        }
        self.status = MessageStatus::Complete;
        Ok(())
    }

    /// Fails the message with an error code, retaining any partial content.
    pub fn fail(&mut self, code: ErrorCode) -> Result<(), DomainError> {
        if self.status.is_final() {
            return Err(self.transition_error("fail"));
        }
        self.status = MessageStatus::Failed;
        self.error_code = Some(code.to_string());
        Ok(())
    }

    fn transition_error(&self, operation: &str) -> DomainError {
        DomainError::new(
            ErrorCode::InvalidStateTransition,
            format!(
                "Cannot {} a {:?} message",
                operation, self.status
            ),
        )
        .with_detail("message_id", self.id.to_string())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the message ID.
    pub fn id(&self) -> &MessageId {
        &self.id
    }

    /// Returns the owning session ID.
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Returns the per-session sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Returns the sender.
    pub fn sender(&self) -> Sender {
        self.sender
    }

    /// Returns the content (possibly partial for failed/streaming messages).
    pub fn content(&self) -> &str {
        &self.content
    }

    /// Returns the current status.
    pub fn status(&self) -> MessageStatus {
        self.status
    }

    /// Returns the attached error code, if the message failed.
    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    /// Returns the domain this message was recorded under.
    pub fn domain_id(&self) -> &DomainId {
        &self.domain_id
    }

    /// Returns the response type this message was recorded under.
    pub fn response_type_id(&self) -> &ResponseTypeId {
        &self.response_type_id
    }

    /// Returns when the message was created.
    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }
}
