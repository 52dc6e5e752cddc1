//! Inbound Listener
//!
//! Two cooperating tasks: the poller long-polls the platform's update stream
//! and turns text messages into `InboundEvent`s, and the consumer classifies
//! each event as a reply for a paired session or a message from an unpaired
//! chat. They share nothing but the event channel.

use super::envelope::{parse_session_marker, RELAYED_ACK_TEXT, WELCOME_TEXT};
use super::error::PlatformError;
use super::identity::IdentityBridge;
use super::models::{ChatMessage, MessageOrigin, RemoteChatId, SessionId};
use super::notifier::DeliveryNotifier;
use super::registry::SessionRegistry;
use super::telegram::{RemotePlatform, Update};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// First retry delay after a failed poll
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Upper bound for the retry delay
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// A text message received from an operator chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    /// Chat the message came from
    pub chat_id: RemoteChatId,
    /// Message body
    pub text: String,
    /// Text of the message being replied to, if any
    pub reply_to_text: Option<String>,
}

impl InboundEvent {
    /// Extract an event from a platform update; non-text updates yield `None`
    pub fn from_update(update: &Update) -> Option<Self> {
        let message = update.message.as_ref()?;
        let text = message.text.clone()?;
        Some(Self {
            chat_id: message.chat.id,
            text,
            reply_to_text: message
                .reply_to_message
                .as_ref()
                .and_then(|m| m.text.clone()),
        })
    }
}

/// What the listener did with an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundOutcome {
    /// Reply appended to a session and pushed to its subscribers
    Relayed {
        /// Session the reply was attributed to
        session_id: SessionId,
        /// Message as stored in history
        message: ChatMessage,
        /// Subscribers that received the push
        subscribers: usize,
    },
    /// Chat is not paired; recorded as a contact and welcomed
    Unpaired {
        /// Chat that wrote in
        chat_id: RemoteChatId,
        /// Whether this was the first time the chat was seen
        first_contact: bool,
    },
    /// Chat is paired with a session the registry no longer knows
    Orphaned {
        /// Session named by the pairing
        session_id: SessionId,
    },
}

/// Classifies inbound operator messages and routes replies to sessions
pub struct InboundListener {
    registry: Arc<SessionRegistry>,
    identity: Arc<IdentityBridge>,
    notifier: Arc<DeliveryNotifier>,
    platform: Option<Arc<dyn RemotePlatform>>,
    ack_relayed: bool,
}

impl InboundListener {
    /// Create a listener; `platform: None` skips welcome and acknowledgement sends
    pub fn new(
        registry: Arc<SessionRegistry>,
        identity: Arc<IdentityBridge>,
        notifier: Arc<DeliveryNotifier>,
        platform: Option<Arc<dyn RemotePlatform>>,
        ack_relayed: bool,
    ) -> Self {
        Self {
            registry,
            identity,
            notifier,
            platform,
            ack_relayed,
        }
    }

    /// Handle a single inbound event
    pub async fn handle_event(&self, event: InboundEvent) -> InboundOutcome {
        let Some(session_id) = self.identity.resolve_session(event.chat_id).await else {
            let first_contact = self.identity.register_contact(event.chat_id).await;
            debug!(
                chat_id = event.chat_id,
                first_contact = first_contact,
                "Message from unpaired chat"
            );
            self.reply(event.chat_id, WELCOME_TEXT).await;
            return InboundOutcome::Unpaired {
                chat_id: event.chat_id,
                first_contact,
            };
        };

        if let Some(quoted) = event
            .reply_to_text
            .as_deref()
            .and_then(parse_session_marker)
        {
            if quoted != session_id {
                warn!(
                    chat_id = event.chat_id,
                    session_id = %session_id,
                    quoted_session_id = %quoted,
                    "Operator replied to an older session's message; routing to the current pairing"
                );
            }
        }

        let message = match self
            .registry
            .append(&session_id, event.text, MessageOrigin::Telegram)
            .await
        {
            Ok(message) => message,
            Err(e) => {
                error!(
                    chat_id = event.chat_id,
                    session_id = %session_id,
                    error = %e,
                    "Paired session is missing from the registry"
                );
                return InboundOutcome::Orphaned { session_id };
            }
        };

        let subscribers = self.notifier.publish(&session_id, &message).await;
        info!(
            chat_id = event.chat_id,
            session_id = %session_id,
            subscribers = subscribers,
            "Operator reply relayed"
        );

        if self.ack_relayed {
            self.reply(event.chat_id, RELAYED_ACK_TEXT).await;
        }

        InboundOutcome::Relayed {
            session_id,
            message,
            subscribers,
        }
    }

    /// Consume events until the channel closes
    pub async fn run(self: Arc<Self>, mut events: mpsc::Receiver<InboundEvent>) {
        info!("Inbound listener started");
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        info!("Inbound listener stopped: event source closed");
    }

    async fn reply(&self, chat_id: RemoteChatId, text: &str) {
        let Some(platform) = &self.platform else {
            return;
        };
        if let Err(e) = platform.send_message(chat_id, text).await {
            warn!(chat_id = chat_id, error = %e, "Failed to send notice to operator chat");
        }
    }
}

/// Long-polls the platform's update stream and feeds the listener
pub struct UpdatePoller {
    platform: Arc<dyn RemotePlatform>,
    poll_timeout_secs: u64,
}

impl UpdatePoller {
    /// Create a poller
    pub fn new(platform: Arc<dyn RemotePlatform>, poll_timeout_secs: u64) -> Self {
        Self {
            platform,
            poll_timeout_secs,
        }
    }

    /// Poll until the receiver goes away or another consumer takes the stream
    pub async fn run(self, events: mpsc::Sender<InboundEvent>) {
        let mut offset: Option<i64> = None;
        let mut backoff = INITIAL_BACKOFF;

        info!(poll_timeout_secs = self.poll_timeout_secs, "Update poller started");

        loop {
            match self
                .platform
                .get_updates(offset, self.poll_timeout_secs)
                .await
            {
                Ok(updates) => {
                    backoff = INITIAL_BACKOFF;
                    for update in updates {
                        offset = Some(next_offset(offset, &update));
                        let Some(event) = InboundEvent::from_update(&update) else {
                            debug!(update_id = update.update_id, "Skipping non-text update");
                            continue;
                        };
                        if events.send(event).await.is_err() {
                            info!("Update poller stopped: listener closed");
                            return;
                        }
                    }
                }
                Err(PlatformError::Conflict(description)) => {
                    warn!(
                        description = %description,
                        "Another bot instance is polling; stopping this poller"
                    );
                    return;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_secs = backoff.as_secs(),
                        "Failed to poll updates"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(MAX_BACKOFF);
                }
            }

            if events.is_closed() {
                info!("Update poller stopped: listener closed");
                return;
            }
        }
    }
}

/// Offset that acknowledges `update` and everything before it
fn next_offset(current: Option<i64>, update: &Update) -> i64 {
    let candidate = update.update_id + 1;
    current.map_or(candidate, |c| c.max(candidate))
}
