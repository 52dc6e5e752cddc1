//! Delivery Notifier
//!
//! Process-local publish/subscribe for operator replies. Push is best-effort:
//! a reply reaches whoever is subscribed when it arrives and nobody else.
//! Clients that were not listening catch up through history.

use super::models::{ChatMessage, SessionId};
use std::collections::HashMap;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

/// Per-subscriber buffer; a slow subscriber lags past this many events
const CHANNEL_CAPACITY: usize = 64;

/// Fan-out of reply events keyed by session
#[derive(Debug, Default)]
pub struct DeliveryNotifier {
    channels: RwLock<HashMap<SessionId, broadcast::Sender<ChatMessage>>>,
}

impl DeliveryNotifier {
    /// Create a notifier with no subscribers
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to replies for a session
    pub async fn subscribe(&self, session_id: &str) -> broadcast::Receiver<ChatMessage> {
        let mut channels = self.channels.write().await;
        let sender = channels
            .entry(session_id.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        debug!(
            session_id = %session_id,
            subscribers = sender.receiver_count() + 1,
            "Subscriber attached"
        );
        sender.subscribe()
    }

    /// Deliver a reply to every current subscriber of the session
    ///
    /// Returns the number of subscribers reached. Channels with no remaining
    /// subscribers are dropped.
    pub async fn publish(&self, session_id: &str, message: &ChatMessage) -> usize {
        let mut channels = self.channels.write().await;
        let Some(sender) = channels.get(session_id) else {
            return 0;
        };
        match sender.send(message.clone()) {
            Ok(reached) => reached,
            Err(_) => {
                channels.remove(session_id);
                debug!(session_id = %session_id, "No live subscribers, channel dropped");
                0
            }
        }
    }

    /// Current subscriber count for a session
    pub async fn subscriber_count(&self, session_id: &str) -> usize {
        self.channels
            .read()
            .await
            .get(session_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}
