//! Application configuration
//!
//! Centralized configuration management with environment variable support
//! and sensible defaults.

use crate::chat::identity::PairingStrategy;
use std::env;
use std::str::FromStr;
use tracing::warn;

/// Default Telegram Bot API endpoint
pub const DEFAULT_TELEGRAM_API_BASE_URL: &str = "https://api.telegram.org";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Remote messaging platform configuration
    pub telegram: TelegramConfig,
    /// Relay behaviour
    pub bridge: BridgeConfig,
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Port to bind the server to
    pub port: u16,
    /// Host address to bind to
    pub host: String,
}

/// Telegram Bot API configuration
#[derive(Clone)]
pub struct TelegramConfig {
    /// Bot token; `None` disables the bridge
    pub bot_token: Option<String>,
    /// Base URL of the Bot API
    pub api_base_url: String,
    /// Long-poll timeout for `getUpdates` (in seconds)
    pub poll_timeout_secs: u64,
}

// Keep the token out of logs.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &self.bot_token.as_ref().map(|_| "<redacted>"))
            .field("api_base_url", &self.api_base_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Relay configuration
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Timeout for a single outbound send (in seconds)
    pub send_timeout_secs: u64,
    /// How a session picks its operator chat
    pub pairing_strategy: PairingStrategy,
    /// Operator chat known ahead of time, if any
    pub operator_chat_id: Option<i64>,
    /// Acknowledge relayed replies back to the operator
    pub ack_relayed: bool,
    /// Maximum visitor message length in characters
    pub max_message_length: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            send_timeout_secs: 30,
            pairing_strategy: PairingStrategy::FirstAvailable,
            operator_chat_id: None,
            ack_relayed: true,
            max_message_length: 4000,
        }
    }
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let defaults = BridgeConfig::default();
        let operator_chat_id = parse_var::<i64>("BRIDGE_OPERATOR_CHAT_ID");

        let pairing_strategy = match env::var("BRIDGE_PAIRING_STRATEGY") {
            Ok(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "first" | "first_available" => PairingStrategy::FirstAvailable,
                "round_robin" => PairingStrategy::RoundRobin,
                "least_loaded" => PairingStrategy::LeastLoaded,
                "fixed" => match operator_chat_id {
                    Some(id) => PairingStrategy::FixedOperator(id),
                    None => {
                        warn!("BRIDGE_PAIRING_STRATEGY=fixed requires BRIDGE_OPERATOR_CHAT_ID, using first available");
                        PairingStrategy::FirstAvailable
                    }
                },
                other => {
                    warn!(value = %other, "Unknown BRIDGE_PAIRING_STRATEGY, using first available");
                    PairingStrategy::FirstAvailable
                }
            },
            Err(_) => defaults.pairing_strategy.clone(),
        };

        Self {
            server: ServerConfig {
                port: parse_var("PORT").unwrap_or(8080),
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            },
            telegram: TelegramConfig {
                bot_token: env::var("TELEGRAM_BOT_TOKEN")
                    .ok()
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty()),
                api_base_url: env::var("TELEGRAM_API_BASE_URL")
                    .unwrap_or_else(|_| DEFAULT_TELEGRAM_API_BASE_URL.to_string()),
                poll_timeout_secs: parse_var("TELEGRAM_POLL_TIMEOUT_SECS").unwrap_or(25),
            },
            bridge: BridgeConfig {
                send_timeout_secs: parse_var("BRIDGE_SEND_TIMEOUT_SECS")
                    .filter(|t| *t > 0)
                    .unwrap_or(defaults.send_timeout_secs),
                pairing_strategy,
                operator_chat_id,
                ack_relayed: parse_var("BRIDGE_ACK_RELAYED").unwrap_or(defaults.ack_relayed),
                max_message_length: parse_var("BRIDGE_MAX_MESSAGE_LENGTH")
                    .filter(|n| *n > 0)
                    .unwrap_or(defaults.max_message_length),
            },
        }
    }

    /// Get the server address as a string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Read and parse an environment variable, warning on unparsable values
fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring invalid configuration value");
            None
        }
    }
}
