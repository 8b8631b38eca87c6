//! WebSocket mirror of a session's generation streams.
//!
//! Clients connect to `/ws/chat/{session_id}` and receive the same
//! events the SSE response carries, JSON-encoded one event per text
//! frame. The socket is read for pings and close frames only; turns are
//! still submitted over HTTP.

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast;

use crate::domain::foundation::SessionId;

use super::handlers::{ApiError, AppState};

/// GET /ws/chat/{session_id} - upgrades to a WebSocket subscription.
///
/// Unknown sessions are rejected with 404 before the upgrade.
pub async fn chat_ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<SessionId>,
    State(state): State<AppState>,
) -> Result<Response, ApiError> {
    state.sessions.get_session(&session_id).await?;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, session_id)))
}

async fn handle_socket(socket: WebSocket, state: AppState, session_id: SessionId) {
    let mut events = state.channels.subscribe(&session_id).await;
    let (mut sink, mut stream) = socket.split();
    tracing::debug!(session = %session_id, "websocket subscriber connected");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let payload = match serde_json::to_string(&event) {
                        Ok(payload) => payload,
                        Err(err) => {
                            tracing::error!(session = %session_id, error = %err, "event serialization failed");
                            continue;
                        }
                    };
                    if sink.send(WsMessage::Text(payload)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(session = %session_id, skipped, "websocket subscriber lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    // Session closed; tell the client and stop.
                    let _ = sink.send(WsMessage::Close(None)).await;
                    break;
                }
            },
            incoming = stream.next() => match incoming {
                Some(Ok(WsMessage::Ping(payload))) => {
                    if sink.send(WsMessage::Pong(payload)).await.is_err() {
                        break;
                    }
                }
                Some(Ok(WsMessage::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    tracing::debug!(session = %session_id, error = %err, "websocket read error");
                    break;
                }
            },
        }
    }

    tracing::debug!(session = %session_id, "websocket subscriber disconnected");
}
