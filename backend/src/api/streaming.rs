//! Streaming utilities for Server-Sent Events (SSE)
//!
//! Pushes operator replies to a waiting browser as they arrive. Push is
//! best-effort; the widget falls back to polling history.

use crate::api::utils::RouterState;
use crate::chat::{BridgeError, ChatMessage};
use crate::error::AppError;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::Response,
};
use futures_util::stream::Stream;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

/// Comment line sent on idle connections so proxies keep them open
const SSE_KEEPALIVE: &str = ": keep-alive\n\n";

/// Interval between keep-alive comments
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// GET /api/chat/stream/:session_id - Subscribe to operator replies
pub async fn stream_replies(
    State(state): State<RouterState>,
    Path(session_id): Path<String>,
) -> Result<Response, AppError> {
    if !state.bridge.session_exists(&session_id).await {
        return Err(BridgeError::SessionNotFound(session_id).into());
    }

    let rx = state.bridge.subscribe(&session_id).await;
    debug!(session_id = %session_id, "SSE subscriber connected");
    create_sse_response(create_stream(session_id, rx))
}

/// Wrap a stream of SSE frames in an HTTP response
pub fn create_sse_response<S>(stream: S) -> Result<Response, AppError>
where
    S: Stream<Item = Result<String, std::io::Error>> + Send + 'static,
{
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .body(Body::from_stream(stream))
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to build SSE response: {}", e)))
}

/// Render one reply as an SSE frame
pub fn sse_frame(message: &ChatMessage) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(message)?))
}

/// Turn a reply subscription into SSE frames
fn create_stream(
    session_id: String,
    mut rx: broadcast::Receiver<ChatMessage>,
) -> impl Stream<Item = Result<String, std::io::Error>> {
    use async_stream::stream;

    stream! {
        let mut keepalive = tokio::time::interval(KEEPALIVE_INTERVAL);
        // The first tick completes immediately
        keepalive.tick().await;

        loop {
            let received = tokio::select! {
                received = rx.recv() => Some(received),
                _ = keepalive.tick() => None,
            };

            match received {
                None => yield Ok(SSE_KEEPALIVE.to_string()),
                Some(Ok(message)) => match sse_frame(&message) {
                    Ok(frame) => yield Ok(frame),
                    Err(e) => warn!(session_id = %session_id, error = %e, "Failed to encode reply"),
                },
                Some(Err(RecvError::Lagged(skipped))) => {
                    warn!(
                        session_id = %session_id,
                        skipped = skipped,
                        "SSE subscriber lagged; client must catch up from history"
                    );
                }
                Some(Err(RecvError::Closed)) => break,
            }
        }

        debug!(session_id = %session_id, "SSE stream ended");
    }
}
