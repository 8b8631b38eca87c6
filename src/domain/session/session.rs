//! Session aggregate: one conversation's full state.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, SessionId, Timestamp};

use super::config::SessionConfig;
use super::message::{Message, MessageStatus, Sender};

/// A single ongoing conversation: append-only transcript plus the active
/// configuration used for the next generation.
///
/// # Invariants
///
/// - messages are strictly ordered by `sequence` and by `created_at`
/// - the transcript is append-only; finalized messages never change
/// - `next_sequence` always exceeds every appended sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    messages: Vec<Message>,
    next_sequence: u64,
    config: SessionConfig,
    created_at: Timestamp,
    last_activity: Timestamp,
}

impl Session {
    /// Creates a new empty session with the given configuration.
    pub fn new(config: SessionConfig) -> Self {
        let now = Timestamp::now();
        Self {
            id: SessionId::new(),
            messages: Vec::new(),
            next_sequence: 0,
            config,
            created_at: now,
            last_activity: now,
        }
    }

    /// Reserves the next message sequence number.
    pub fn next_sequence(&mut self) -> u64 {
        let seq = self.next_sequence;
        self.next_sequence += 1;
        seq
    }

    /// Appends a message to the transcript.
    ///
    /// # Errors
    ///
    /// - `ValidationFailed` if the message belongs to another session or
    ///   its sequence is not beyond the last appended message
    pub fn append(&mut self, message: Message) -> Result<(), DomainError> {
        if message.session_id() != &self.id {
            return Err(DomainError::validation(
                "session_id",
                "Message belongs to a different session",
            ));
        }
        if let Some(last) = self.messages.last() {
            if message.sequence() <= last.sequence() {
                return Err(DomainError::validation(
                    "sequence",
                    "Message sequence must be strictly increasing",
                ));
            }
        }
        self.messages.push(message);
        self.touch();
        Ok(())
    }

    /// Replaces the stored copy of a message by id, preserving its slot.
    ///
    /// Used by the orchestrator to publish streaming progress of the
    /// assistant draft it owns. Finalized messages are not replaceable.
    pub fn update_message(&mut self, updated: Message) -> Result<(), DomainError> {
        let slot = self
            .messages
            .iter_mut()
            .find(|m| m.id() == updated.id())
            .ok_or_else(|| {
                DomainError::validation("message_id", "Message not found in session")
            })?;
        if slot.status().is_final() {
            return Err(DomainError::validation(
                "message_id",
                "Finalized messages are immutable",
            ));
        }
        *slot = updated;
        self.touch();
        Ok(())
    }

    /// Returns history strictly before `before` (a sequence number),
    /// newest-bounded, in ascending order. `None` paginates from the end.
    pub fn history(&self, limit: usize, before: Option<u64>) -> Vec<&Message> {
        let upper = before.unwrap_or(u64::MAX);
        let eligible: Vec<&Message> = self
            .messages
            .iter()
            .filter(|m| m.sequence() < upper)
            .collect();
        let skip = eligible.len().saturating_sub(limit);
        eligible.into_iter().skip(skip).collect()
    }

    /// Returns true if an assistant generation is currently unfinished.
    pub fn has_open_generation(&self) -> bool {
        self.messages.iter().any(|m| {
            m.sender() == Sender::Assistant
                && matches!(m.status(), MessageStatus::Pending | MessageStatus::Streaming)
        })
    }

    /// Updates the session's last-activity marker.
    pub fn touch(&mut self) {
        self.last_activity = Timestamp::now();
    }

    /// Returns true if the session has been idle longer than `max_idle_secs`.
    pub fn is_idle(&self, max_idle_secs: u64) -> bool {
        Timestamp::now()
            .duration_since(&self.last_activity)
            .num_seconds()
            >= max_idle_secs as i64
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Accessors
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the session ID.
    pub fn id(&self) -> &SessionId {
        &self.id
    }

    /// Returns the full ordered transcript.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Returns a mutable handle to the configuration.
    pub fn config_mut(&mut self) -> &mut SessionConfig {
        self.touch();
        &mut self.config
    }

    /// Returns when the session was created.
    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Returns the last activity timestamp.
    pub fn last_activity(&self) -> &Timestamp {
        &self.last_activity
    }
}
