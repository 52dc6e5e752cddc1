//! WebSocket handlers for real-time reply delivery
//!
//! This module pushes operator replies for one session to a connected widget.
//! Supports ping/pong for connection keepalive.

use crate::api::utils::RouterState;
use crate::chat::{BridgeError, ChatMessage, MessageOrigin};
use crate::error::AppError;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, State, WebSocketUpgrade,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, error, info, warn};

/// Interval between transport-level pings
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message types for real-time communication
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum WebSocketMessage {
    /// Sent once after the connection is established
    #[serde(rename = "subscribed")]
    Subscribed {
        /// Session the socket is bound to
        session_id: String,
    },
    /// Operator reply
    #[serde(rename = "message")]
    Reply {
        /// Message body
        text: String,
        /// Origin of the message
        from: MessageOrigin,
        /// Server-assigned timestamp
        timestamp: String,
    },
    /// Ping message for connection keepalive
    #[serde(rename = "ping")]
    Ping,
    /// Pong message responding to ping
    #[serde(rename = "pong")]
    Pong,
}

impl From<ChatMessage> for WebSocketMessage {
    fn from(message: ChatMessage) -> Self {
        WebSocketMessage::Reply {
            text: message.text,
            from: message.from,
            timestamp: message.timestamp,
        }
    }
}

/// WebSocket upgrade handler
///
/// Verifies the session, subscribes to its replies and hands the socket
/// over to the connection loop.
///
/// # Arguments
/// * `ws` - WebSocket upgrade request
/// * `state` - Application state
/// * `session_id` - Session to subscribe to
///
/// # Returns
/// * `Response` - HTTP response initiating WebSocket connection
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    State(state): State<RouterState>,
    Path(session_id): Path<String>,
) -> Result<Response, AppError> {
    if !state.bridge.session_exists(&session_id).await {
        return Err(BridgeError::SessionNotFound(session_id).into());
    }
    // Subscribe before upgrading so replies arriving during the handshake are kept
    let replies = state.bridge.subscribe(&session_id).await;
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, session_id, replies)))
}

fn encode(message: &WebSocketMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(text) => Some(Message::Text(text)),
        Err(e) => {
            error!("Failed to encode WebSocket message: {}", e);
            None
        }
    }
}

/// Outcome of one inbound client frame
enum ClientFrame {
    Continue,
    Reply(WebSocketMessage),
    Closed,
}

fn classify(frame: Option<Result<Message, axum::Error>>) -> ClientFrame {
    match frame {
        Some(Ok(Message::Text(text))) => match serde_json::from_str::<WebSocketMessage>(&text) {
            Ok(WebSocketMessage::Ping) => ClientFrame::Reply(WebSocketMessage::Pong),
            Ok(other) => {
                debug!("Ignoring client frame: {:?}", other);
                ClientFrame::Continue
            }
            Err(_) => ClientFrame::Continue,
        },
        Some(Ok(Message::Close(_))) | None => ClientFrame::Closed,
        Some(Err(e)) => {
            warn!("WebSocket receive error: {}", e);
            ClientFrame::Closed
        }
        // Transport pings are answered by axum; pongs need no action
        Some(Ok(_)) => ClientFrame::Continue,
    }
}

/// Drive one connection until the client leaves or the channel closes
async fn handle_socket(
    socket: WebSocket,
    session_id: String,
    mut replies: broadcast::Receiver<ChatMessage>,
) {
    let (mut sender, mut receiver) = socket.split();
    info!(session_id = %session_id, "WebSocket client connected");

    let mut pending = encode(&WebSocketMessage::Subscribed {
        session_id: session_id.clone(),
    });
    let mut keepalive = tokio::time::interval(PING_INTERVAL);
    keepalive.tick().await;

    loop {
        if let Some(msg) = pending.take() {
            if let Err(e) = sender.send(msg).await {
                warn!(session_id = %session_id, "WebSocket send failed: {}", e);
                break;
            }
        }

        pending = tokio::select! {
            received = replies.recv() => match received {
                Ok(message) => encode(&WebSocketMessage::from(message)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(
                        session_id = %session_id,
                        skipped = skipped,
                        "WebSocket subscriber lagged; client must catch up from history"
                    );
                    None
                }
                Err(RecvError::Closed) => break,
            },
            _ = keepalive.tick() => Some(Message::Ping(Vec::new())),
            frame = receiver.next() => match classify(frame) {
                ClientFrame::Continue => None,
                ClientFrame::Reply(reply) => encode(&reply),
                ClientFrame::Closed => break,
            },
        };
    }

    info!(session_id = %session_id, "WebSocket connection closed");
}
