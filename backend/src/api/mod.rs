//! API module
//!
//! Contains HTTP request handlers for the website chat widget

pub mod chat;
pub mod health;
pub mod streaming;
pub mod utils;

use crate::{middleware, websocket};
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use utils::RouterState;

/// Routes served to the chat widget
pub fn chat_routes() -> Router<RouterState> {
    Router::new()
        .route("/api/chat/session", post(chat::create_session))
        .route("/api/chat/message", post(chat::send_message))
        .route("/api/chat/history/:session_id", get(chat::get_history))
        .route("/api/chat/stream/:session_id", get(streaming::stream_replies))
        // WebSocket push of operator replies
        .route("/ws/chat/:session_id", get(websocket::websocket_handler))
}

/// The complete application with middleware applied
pub fn router(state: RouterState) -> Router {
    Router::new()
        .route("/api/health", get(health::health_check))
        .merge(chat_routes())
        // Innermost first: the request id span wraps the handler
        .layer(axum::middleware::from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        // The widget is embedded on other origins
        .layer(CorsLayer::permissive())
        .with_state(state)
}
