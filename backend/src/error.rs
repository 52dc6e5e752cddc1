//! Error types and error handling for the application
//!
//! This module defines custom error types that can be converted to HTTP responses.
//! All errors implement `IntoResponse` to provide consistent error formatting.

use crate::chat::{BridgeError, PlatformError};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Application-level error types
///
/// All errors that can occur in the application are represented by this enum.
/// Each variant implements automatic conversion to HTTP responses via `IntoResponse`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Relay-level failure (unknown session, no operator, delivery)
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// Remote platform failure surfaced outside a send
    #[error("Messaging platform error: {0}")]
    Platform(#[from] PlatformError),

    /// Request payload is invalid (empty or oversized message, etc.)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Internal server error (catch-all for unexpected errors)
    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Bridge(BridgeError::SessionNotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Bridge(BridgeError::NoRemoteContactAvailable) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Bridge(BridgeError::DeliveryFailed(_)) => StatusCode::BAD_GATEWAY,
            AppError::Bridge(BridgeError::ConfigurationMissing(_)) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            AppError::Platform(_) => StatusCode::BAD_GATEWAY,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}
