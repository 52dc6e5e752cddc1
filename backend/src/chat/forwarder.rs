//! Outbound Forwarder
//!
//! Records visitor messages and relays them to the paired operator chat.
//! The visitor's message is stored before delivery is attempted and is never
//! rolled back when delivery fails.

use super::envelope::{apology_text, format_envelope};
use super::error::BridgeError;
use super::identity::IdentityBridge;
use super::models::{Language, MessageOrigin, RemoteChatId, VisitorInfo};
use super::registry::SessionRegistry;
use super::telegram::RemotePlatform;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};

/// Result of a successful send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendAck {
    /// Whether the message left the process
    pub forwarded: bool,
    /// Operator chat the message went to
    pub chat_id: Option<RemoteChatId>,
}

/// Relays visitor messages to the messaging platform
pub struct OutboundForwarder {
    registry: Arc<SessionRegistry>,
    identity: Arc<IdentityBridge>,
    platform: Option<Arc<dyn RemotePlatform>>,
    send_timeout: Duration,
}

impl OutboundForwarder {
    /// Create a forwarder; `platform: None` means the bridge is disabled
    pub fn new(
        registry: Arc<SessionRegistry>,
        identity: Arc<IdentityBridge>,
        platform: Option<Arc<dyn RemotePlatform>>,
        send_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            identity,
            platform,
            send_timeout,
        }
    }

    /// Record a visitor message and deliver it to the operator
    ///
    /// # Arguments
    /// * `session_id` - Session the message belongs to
    /// * `text` - Message body
    /// * `visitor` - Optional visitor details, merged into the session
    /// * `language` - Optional page language, used for the apology text
    ///
    /// # Errors
    /// * `BridgeError::SessionNotFound` - unknown session, nothing recorded
    /// * `BridgeError::NoRemoteContactAvailable` - no operator chat to pair with
    /// * `BridgeError::DeliveryFailed` - platform rejected the call or timed out
    pub async fn send(
        &self,
        session_id: &str,
        text: &str,
        visitor: Option<VisitorInfo>,
        language: Option<Language>,
    ) -> Result<SendAck, BridgeError> {
        if let Some(language) = language {
            self.registry.set_language(session_id, language).await?;
        }
        let visitor = match visitor {
            Some(info) => self.registry.set_visitor_info(session_id, info).await?,
            None => self
                .registry
                .session(session_id)
                .await
                .ok_or_else(|| BridgeError::SessionNotFound(session_id.to_string()))?
                .visitor,
        };

        self.registry
            .append(session_id, text, MessageOrigin::User)
            .await?;

        let Some(platform) = &self.platform else {
            warn!(
                session_id = %session_id,
                "Bridge disabled, message stored but not forwarded"
            );
            return Ok(SendAck {
                forwarded: false,
                chat_id: None,
            });
        };

        let chat_id = match self.identity.resolve_or_assign(session_id).await {
            Ok(chat_id) => chat_id,
            Err(e) => {
                warn!(
                    session_id = %session_id,
                    "No operator chat available; the operator must message the bot first"
                );
                self.apologize(session_id).await;
                return Err(e);
            }
        };

        let envelope = format_envelope(session_id, text, visitor.as_ref());
        let outcome = timeout(self.send_timeout, platform.send_message(chat_id, &envelope)).await;

        let failure = match outcome {
            Ok(Ok(())) => {
                info!(
                    session_id = %session_id,
                    chat_id = chat_id,
                    text_len = text.len(),
                    "Visitor message forwarded"
                );
                return Ok(SendAck {
                    forwarded: true,
                    chat_id: Some(chat_id),
                });
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("no response within {:?}", self.send_timeout),
        };

        error!(
            session_id = %session_id,
            chat_id = chat_id,
            error = %failure,
            "Failed to forward visitor message"
        );
        self.apologize(session_id).await;
        Err(BridgeError::DeliveryFailed(failure))
    }

    /// Append the localized apology to the visitor's log
    async fn apologize(&self, session_id: &str) {
        let language = self
            .registry
            .session(session_id)
            .await
            .map(|s| s.language)
            .unwrap_or_default();
        if let Err(e) = self
            .registry
            .append(session_id, apology_text(language), MessageOrigin::Telegram)
            .await
        {
            warn!(session_id = %session_id, error = %e, "Could not record apology");
        }
    }
}
