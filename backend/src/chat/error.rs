//! Relay-specific error types
//!
//! Errors raised by the session-to-conversation bridge and by the
//! messaging platform client it drives.

use thiserror::Error;

/// Errors surfaced by bridge operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// Session id is unknown to the registry
    #[error("Session not found: {0}")]
    SessionNotFound(String),

    /// No operator chat has ever contacted the bot
    #[error("No operator chat is available; send any message to the bot first")]
    NoRemoteContactAvailable,

    /// The platform rejected the message or did not answer in time
    #[error("Message delivery failed: {0}")]
    DeliveryFailed(String),

    /// Required credentials were not provided at startup
    #[error("Bridge is not configured: {0}")]
    ConfigurationMissing(String),
}

/// Errors returned by the messaging platform client
#[derive(Error, Debug)]
pub enum PlatformError {
    /// Bot token is empty
    #[error("Bot token is empty")]
    MissingToken,

    /// Transport-level failure (connect, TLS, timeout)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Platform answered with `ok: false` or a non-success status
    #[error("Platform returned error {status}: {description}")]
    Api {
        /// HTTP status or platform error code
        status: u16,
        /// Human-readable description from the platform
        description: String,
    },

    /// Another consumer already holds the update stream
    #[error("Update stream conflict: {0}")]
    Conflict(String),

    /// Response body could not be interpreted
    #[error("Invalid platform response: {0}")]
    InvalidResponse(String),
}

impl From<PlatformError> for BridgeError {
    fn from(err: PlatformError) -> Self {
        BridgeError::DeliveryFailed(err.to_string())
    }
}
