//! Identity Bridge
//!
//! Pairs visitor sessions with operator chats on the messaging platform.
//! The pairing is a partial bijection: a session has at most one chat and a
//! chat answers for at most one session at a time.

use super::error::BridgeError;
use super::models::{RemoteChatId, SessionId};
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, info};

/// How an unpaired session picks an operator chat
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStrategy {
    /// The earliest discovered contact
    FirstAvailable,
    /// Rotate through discovered contacts in discovery order
    RoundRobin,
    /// Prefer a contact not currently paired, else the earliest
    LeastLoaded,
    /// Always the configured operator chat, discovered or not
    FixedOperator(RemoteChatId),
}

#[derive(Debug, Default)]
struct Pairings {
    /// Contacts in discovery order
    contacts: Vec<RemoteChatId>,
    known: HashSet<RemoteChatId>,
    session_to_remote: HashMap<SessionId, RemoteChatId>,
    remote_to_session: HashMap<RemoteChatId, SessionId>,
    /// Next index for round-robin selection
    cursor: usize,
}

impl Pairings {
    fn bind(&mut self, session_id: &str, remote: RemoteChatId) {
        if let Some(previous_remote) = self.session_to_remote.remove(session_id) {
            self.remote_to_session.remove(&previous_remote);
        }
        if let Some(previous_session) = self.remote_to_session.remove(&remote) {
            self.session_to_remote.remove(&previous_session);
        }
        self.session_to_remote.insert(session_id.to_string(), remote);
        self.remote_to_session.insert(remote, session_id.to_string());
    }

    fn select(&mut self, strategy: &PairingStrategy) -> Option<RemoteChatId> {
        match strategy {
            PairingStrategy::FixedOperator(id) => Some(*id),
            PairingStrategy::FirstAvailable => self.contacts.first().copied(),
            PairingStrategy::RoundRobin => {
                if self.contacts.is_empty() {
                    return None;
                }
                let chosen = self.contacts[self.cursor % self.contacts.len()];
                self.cursor = self.cursor.wrapping_add(1);
                Some(chosen)
            }
            PairingStrategy::LeastLoaded => self
                .contacts
                .iter()
                .copied()
                .find(|c| !self.remote_to_session.contains_key(c))
                .or_else(|| self.contacts.first().copied()),
        }
    }
}

/// Bidirectional session ↔ chat mapping plus the set of known contacts
///
/// Holds identifiers only; session records stay owned by the registry.
#[derive(Debug)]
pub struct IdentityBridge {
    strategy: PairingStrategy,
    inner: RwLock<Pairings>,
}

impl IdentityBridge {
    /// Create a bridge with the given selection policy
    pub fn new(strategy: PairingStrategy) -> Self {
        Self {
            strategy,
            inner: RwLock::new(Pairings::default()),
        }
    }

    /// Selection policy in use
    pub fn strategy(&self) -> &PairingStrategy {
        &self.strategy
    }

    /// Record a chat that has messaged the bot
    ///
    /// Returns `true` if the contact was not known before.
    pub async fn register_contact(&self, remote: RemoteChatId) -> bool {
        let mut inner = self.inner.write().await;
        if inner.known.insert(remote) {
            inner.contacts.push(remote);
            info!(chat_id = remote, "Registered new operator contact");
            true
        } else {
            false
        }
    }

    /// Existing pairing for the session, or a newly assigned one
    ///
    /// # Errors
    /// * `BridgeError::NoRemoteContactAvailable` if no contact is known and no
    ///   operator is configured
    pub async fn resolve_or_assign(&self, session_id: &str) -> Result<RemoteChatId, BridgeError> {
        let mut inner = self.inner.write().await;
        if let Some(remote) = inner.session_to_remote.get(session_id) {
            return Ok(*remote);
        }

        let remote = inner
            .select(&self.strategy)
            .ok_or(BridgeError::NoRemoteContactAvailable)?;
        if let Some(displaced) = inner.remote_to_session.get(&remote) {
            debug!(
                session_id = %session_id,
                displaced_session_id = %displaced,
                chat_id = remote,
                "Operator chat moves to a new session"
            );
        }
        inner.bind(session_id, remote);
        info!(session_id = %session_id, chat_id = remote, "Session paired with operator chat");
        Ok(remote)
    }

    /// Session currently paired with a chat, if any
    pub async fn resolve_session(&self, remote: RemoteChatId) -> Option<SessionId> {
        self.inner.read().await.remote_to_session.get(&remote).cloned()
    }

    /// Chat currently paired with a session, if any
    pub async fn resolve_remote(&self, session_id: &str) -> Option<RemoteChatId> {
        self.inner
            .read()
            .await
            .session_to_remote
            .get(session_id)
            .copied()
    }

    /// Pair a session with a chat, dropping any previous pairing of either side
    pub async fn bind(&self, session_id: &str, remote: RemoteChatId) {
        self.inner.write().await.bind(session_id, remote);
    }

    /// Number of known contacts
    pub async fn contact_count(&self) -> usize {
        self.inner.read().await.contacts.len()
    }

    /// Number of active pairings
    pub async fn pairing_count(&self) -> usize {
        self.inner.read().await.session_to_remote.len()
    }
}

impl Default for IdentityBridge {
    fn default() -> Self {
        Self::new(PairingStrategy::FirstAvailable)
    }
}
