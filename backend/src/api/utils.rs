//! API utility functions
//!
//! Contains the shared router state type and request validation helpers.

use crate::error::AppError;
use crate::state::AppState;
use std::sync::Arc;

/// State handed to every handler
pub type RouterState = Arc<AppState>;

/// Validate a visitor message
///
/// # Arguments
/// * `message` - Message text to validate
/// * `max_length` - Maximum length in characters
///
/// # Returns
/// * `Ok(())` - Message is valid
/// * `Err(AppError)` - Message is invalid (empty or too long)
pub fn validate_message(message: &str, max_length: usize) -> Result<(), AppError> {
    let trimmed = message.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidRequest(
            "Message cannot be empty".to_string(),
        ));
    }
    if trimmed.chars().count() > max_length {
        return Err(AppError::InvalidRequest(format!(
            "Message exceeds maximum length of {} characters",
            max_length
        )));
    }
    Ok(())
}

/// Validate a session id supplied by the client
pub fn validate_session_id(session_id: &str) -> Result<(), AppError> {
    if session_id.trim().is_empty() {
        return Err(AppError::InvalidRequest(
            "session_id cannot be empty".to_string(),
        ));
    }
    Ok(())
}
