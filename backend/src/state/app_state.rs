// Application state
// Shared by every request handler through axum's `State` extractor

use crate::chat::ChatBridge;
use crate::config::Config;
use std::sync::Arc;

/// Main application state
/// Holds the chat bridge and the request limits handlers enforce
pub struct AppState {
    /// The relay between visitor sessions and operator chats
    pub bridge: Arc<ChatBridge>,
    /// Maximum visitor message length in characters
    pub max_message_length: usize,
}

impl AppState {
    /// Create application state around an existing bridge
    pub fn new(bridge: Arc<ChatBridge>, max_message_length: usize) -> Self {
        Self {
            bridge,
            max_message_length,
        }
    }

    /// Build the bridge and state from configuration
    pub fn from_config(config: &Config, client: reqwest::Client) -> Self {
        let bridge = ChatBridge::from_config(client, &config.telegram, &config.bridge);
        Self::new(Arc::new(bridge), config.bridge.max_message_length)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BridgeConfig;

    #[test]
    fn test_app_state_creation() {
        let bridge = Arc::new(ChatBridge::new(None, &BridgeConfig::default(), 0));
        let state = AppState::new(bridge, 120);
        assert_eq!(state.max_message_length, 120);
        assert!(!state.bridge.is_enabled());
    }
}
