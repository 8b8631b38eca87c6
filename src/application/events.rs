//! Streaming event protocol and per-session fan-out.
//!
//! Every transport (SSE, WebSocket) carries the same events. Chunks are
//! delivered at-least-once across a reconnect, so each carries
//! `(message_id, seq)` for client-side deduplication.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, RwLock};

use crate::domain::foundation::{MessageId, SessionId};

const CHANNEL_CAPACITY: usize = 256;

/// One event in a generation stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// A content delta for the assistant message being generated.
    Chunk {
        message_id: MessageId,
        /// Monotonic per-message chunk counter, starting at 0.
        seq: u64,
        delta: String,
    },
    /// The generation finished; `content` is the full final text.
    Done {
        message_id: MessageId,
        content: String,
    },
    /// The generation failed or was cancelled.
    Error {
        message_id: MessageId,
        code: String,
        error: String,
        /// Partial content produced before the failure, if any.
        #[serde(skip_serializing_if = "Option::is_none")]
        partial_content: Option<String>,
    },
}

impl StreamEvent {
    /// Returns the message this event belongs to.
    pub fn message_id(&self) -> &MessageId {
        match self {
            Self::Chunk { message_id, .. }
            | Self::Done { message_id, .. }
            | Self::Error { message_id, .. } => message_id,
        }
    }

    /// Returns true if this event terminates the stream.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Chunk { .. })
    }
}

/// Per-session broadcast channels mirroring generation streams to
/// WebSocket subscribers.
///
/// Channels are created lazily on first use and removed when a session
/// closes. A slow subscriber that falls behind the channel capacity
/// misses events; the final transcript remains authoritative.
pub struct SessionChannels {
    channels: RwLock<HashMap<SessionId, broadcast::Sender<StreamEvent>>>,
}

impl SessionChannels {
    pub fn new() -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribes to a session's event stream.
    pub async fn subscribe(&self, session_id: &SessionId) -> broadcast::Receiver<StreamEvent> {
        let mut channels = self.channels.write().await;
        channels
            .entry(*session_id)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Publishes an event to a session's subscribers, if any.
    pub async fn publish(&self, session_id: &SessionId, event: StreamEvent) {
        let channels = self.channels.read().await;
        if let Some(sender) = channels.get(session_id) {
            // Send fails only when no subscriber is listening.
            let _ = sender.send(event);
        }
    }

    /// Drops a session's channel, disconnecting its subscribers.
    pub async fn remove(&self, session_id: &SessionId) {
        let mut channels = self.channels.write().await;
        channels.remove(session_id);
    }

    /// Returns the current subscriber count for a session.
    pub async fn subscriber_count(&self, session_id: &SessionId) -> usize {
        let channels = self.channels.read().await;
        channels
            .get(session_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for SessionChannels {
    fn default() -> Self {
        Self::new()
    }
}
