//! Chat Bridge
//!
//! Owns the relay's shared state and wires its parts together: one registry,
//! one identity bridge and one notifier shared by the request handlers and
//! the inbound listener. Handlers receive it through axum state, so tests can
//! build a fresh bridge per case.

use super::error::{BridgeError, PlatformError};
use super::forwarder::{OutboundForwarder, SendAck};
use super::identity::IdentityBridge;
use super::listener::{InboundEvent, InboundListener, InboundOutcome, UpdatePoller};
use super::models::{ChatMessage, Language, SessionId, VisitorInfo};
use super::notifier::DeliveryNotifier;
use super::registry::SessionRegistry;
use super::telegram::{RemotePlatform, TelegramClient};
use crate::config::{BridgeConfig, TelegramConfig};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Buffer between the update poller and the listener
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Snapshot of the relay's state, served by the health endpoint
#[derive(Debug, Clone, Serialize)]
pub struct BridgeStatus {
    /// Whether a messaging platform is configured
    pub bridge_enabled: bool,
    /// Sessions created since startup
    pub sessions_active: usize,
    /// Operator chats that have contacted the bot
    pub known_contacts: usize,
    /// Active session ↔ chat pairings
    pub pairings: usize,
}

/// Handles to the background listener tasks
pub struct ListenerHandle {
    poller: JoinHandle<()>,
    consumer: JoinHandle<()>,
}

impl ListenerHandle {
    /// Stop polling and consuming
    pub fn shutdown(self) {
        self.poller.abort();
        self.consumer.abort();
        info!("Inbound listener shut down");
    }
}

/// The relay between visitor sessions and operator chats
pub struct ChatBridge {
    registry: Arc<SessionRegistry>,
    identity: Arc<IdentityBridge>,
    notifier: Arc<DeliveryNotifier>,
    platform: Option<Arc<dyn RemotePlatform>>,
    forwarder: OutboundForwarder,
    listener: Arc<InboundListener>,
    poll_timeout_secs: u64,
}

impl ChatBridge {
    /// Create a bridge; `platform: None` runs it disabled
    pub fn new(
        platform: Option<Arc<dyn RemotePlatform>>,
        config: &BridgeConfig,
        poll_timeout_secs: u64,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let identity = Arc::new(IdentityBridge::new(config.pairing_strategy.clone()));
        let notifier = Arc::new(DeliveryNotifier::new());

        let forwarder = OutboundForwarder::new(
            registry.clone(),
            identity.clone(),
            platform.clone(),
            Duration::from_secs(config.send_timeout_secs),
        );
        let listener = Arc::new(InboundListener::new(
            registry.clone(),
            identity.clone(),
            notifier.clone(),
            platform.clone(),
            config.ack_relayed,
        ));

        Self {
            registry,
            identity,
            notifier,
            platform,
            forwarder,
            listener,
            poll_timeout_secs,
        }
    }

    /// Build a bridge from configuration
    ///
    /// A missing bot token is reported and yields a disabled bridge; the rest
    /// of the service keeps running.
    pub fn from_config(
        client: reqwest::Client,
        telegram: &TelegramConfig,
        bridge: &BridgeConfig,
    ) -> Self {
        let platform = match telegram.bot_token.as_deref() {
            Some(token) => match TelegramClient::new(client, &telegram.api_base_url, token) {
                Ok(client) => Some(Arc::new(client) as Arc<dyn RemotePlatform>),
                Err(e) => {
                    error!(error = %e, "Failed to create Telegram client, bridge disabled");
                    None
                }
            },
            None => {
                let missing = BridgeError::ConfigurationMissing("TELEGRAM_BOT_TOKEN".to_string());
                warn!(error = %missing, "Telegram bridge disabled");
                None
            }
        };
        Self::new(platform, bridge, telegram.poll_timeout_secs)
    }

    /// Whether messages leave the process
    pub fn is_enabled(&self) -> bool {
        self.platform.is_some()
    }

    /// Start a new visitor session
    pub async fn create_session(&self) -> SessionId {
        let id = self.registry.create().await;
        info!(session_id = %id, "Chat session created");
        id
    }

    /// Record a visitor message and forward it to the operator
    pub async fn send_message(
        &self,
        session_id: &str,
        text: &str,
        visitor: Option<VisitorInfo>,
        language: Option<Language>,
    ) -> Result<SendAck, BridgeError> {
        self.forwarder.send(session_id, text, visitor, language).await
    }

    /// Conversation log; empty for unknown sessions
    pub async fn history(&self, session_id: &str) -> Vec<ChatMessage> {
        self.registry.history(session_id).await
    }

    /// Subscribe to operator replies for a session
    pub async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ChatMessage> {
        self.notifier.subscribe(session_id).await
    }

    /// Feed one inbound event through the listener
    pub async fn handle_inbound(&self, event: InboundEvent) -> InboundOutcome {
        self.listener.handle_event(event).await
    }

    /// Whether the session exists
    pub async fn session_exists(&self, session_id: &str) -> bool {
        self.registry.contains(session_id).await
    }

    /// Identity bridge, for inspection and manual pairing
    pub fn identity(&self) -> &IdentityBridge {
        &self.identity
    }

    /// Check the credentials against the platform
    pub async fn verify_credentials(&self) -> Result<Option<String>, PlatformError> {
        let Some(platform) = &self.platform else {
            return Ok(None);
        };
        let me = platform.get_me().await?;
        Ok(me.username)
    }

    /// Spawn the update poller and the listener loop
    ///
    /// Returns `None` when the bridge is disabled.
    pub fn spawn_listener(&self) -> Option<ListenerHandle> {
        let platform = self.platform.clone()?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let consumer = tokio::spawn(self.listener.clone().run(rx));
        let poller = tokio::spawn(UpdatePoller::new(platform, self.poll_timeout_secs).run(tx));

        Some(ListenerHandle { poller, consumer })
    }

    /// Counters for health reporting
    pub async fn status(&self) -> BridgeStatus {
        BridgeStatus {
            bridge_enabled: self.is_enabled(),
            sessions_active: self.registry.session_count().await,
            known_contacts: self.identity.contact_count().await,
            pairings: self.identity.pairing_count().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::models::MessageOrigin;

    fn disabled_bridge() -> ChatBridge {
        ChatBridge::new(None, &BridgeConfig::default(), 0)
    }

    #[tokio::test]
    async fn test_disabled_bridge_still_records() {
        let bridge = disabled_bridge();
        assert!(!bridge.is_enabled());
        assert!(bridge.spawn_listener().is_none());

        let id = bridge.create_session().await;
        let ack = bridge.send_message(&id, "hi", None, None).await.unwrap();
        assert!(!ack.forwarded);
        assert_eq!(bridge.history(&id).await[0].from, MessageOrigin::User);
    }

    #[tokio::test]
    async fn test_status_counts() {
        let bridge = disabled_bridge();
        bridge.create_session().await;
        bridge.create_session().await;
        bridge
            .handle_inbound(InboundEvent {
                chat_id: 3,
                text: "/start".to_string(),
                reply_to_text: None,
            })
            .await;

        let status = bridge.status().await;
        assert!(!status.bridge_enabled);
        assert_eq!(status.sessions_active, 2);
        assert_eq!(status.known_contacts, 1);
        assert_eq!(status.pairings, 0);
    }

    #[tokio::test]
    async fn test_from_config_without_token_is_disabled() {
        let telegram = TelegramConfig {
            bot_token: None,
            api_base_url: crate::config::DEFAULT_TELEGRAM_API_BASE_URL.to_string(),
            poll_timeout_secs: 25,
        };
        let bridge =
            ChatBridge::from_config(reqwest::Client::new(), &telegram, &BridgeConfig::default());
        assert!(!bridge.is_enabled());
        assert_eq!(bridge.verify_credentials().await.unwrap(), None);
    }
}
