//! Chat API endpoints
//!
//! Handles HTTP requests from the website's chat widget.

use crate::api::utils::{validate_message, validate_session_id, RouterState};
use crate::chat::{ChatMessage, Language, VisitorInfo};
use crate::error::AppError;
use axum::{
    extract::{Path, State},
    response::Json,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Response to session creation
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateSessionResponse {
    /// Opaque session identifier
    pub session_id: String,
}

/// Request to send a visitor message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Session the message belongs to
    pub session_id: String,
    /// Message content
    pub message: String,
    /// Optional visitor details
    #[serde(default)]
    pub user_info: Option<VisitorInfo>,
    /// Page language, for localized system texts
    #[serde(default)]
    pub language: Option<Language>,
}

/// Response to a send
#[derive(Debug, Serialize, Deserialize)]
pub struct SendMessageResponse {
    /// Whether the message was accepted
    pub success: bool,
    /// Human-readable outcome
    pub message: String,
}

/// Conversation history response
#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    /// Messages in conversation order
    pub messages: Vec<ChatMessage>,
}

/// POST /api/chat/session - Create a new chat session
pub async fn create_session(State(state): State<RouterState>) -> Json<CreateSessionResponse> {
    let session_id = state.bridge.create_session().await;
    Json(CreateSessionResponse { session_id })
}

/// POST /api/chat/message - Record a visitor message and forward it
pub async fn send_message(
    State(state): State<RouterState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, AppError> {
    validate_session_id(&request.session_id)?;
    validate_message(&request.message, state.max_message_length)?;

    let ack = state
        .bridge
        .send_message(
            &request.session_id,
            request.message.trim(),
            request.user_info,
            request.language,
        )
        .await?;

    let message = if ack.forwarded {
        "Message sent to Telegram"
    } else {
        "Message stored; live chat is currently offline"
    };

    Ok(Json(SendMessageResponse {
        success: true,
        message: message.to_string(),
    }))
}

/// GET /api/chat/history/:session_id - Conversation log (empty for unknown sessions)
pub async fn get_history(
    State(state): State<RouterState>,
    Path(session_id): Path<String>,
) -> Json<HistoryResponse> {
    let messages = state.bridge.history(&session_id).await;
    debug!(session_id = %session_id, count = messages.len(), "History requested");
    Json(HistoryResponse { messages })
}
