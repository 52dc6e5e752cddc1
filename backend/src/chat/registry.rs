//! Session Registry
//!
//! In-memory store of visitor sessions and their conversation logs.
//! Everything lives for the process lifetime; nothing is persisted.

use super::error::BridgeError;
use super::models::{ChatMessage, ChatSession, Language, MessageOrigin, SessionId, VisitorInfo};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Keyed store of visitor sessions
///
/// All mutations take the write lock, so concurrent appends to one session
/// are serialized and never lost.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, ChatSession>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session with a fresh identifier
    pub async fn create(&self) -> SessionId {
        let mut sessions = self.sessions.write().await;
        let mut id = Uuid::new_v4().simple().to_string();
        while sessions.contains_key(&id) {
            id = Uuid::new_v4().simple().to_string();
        }
        sessions.insert(id.clone(), ChatSession::new(id.clone()));
        debug!(session_id = %id, "Session created");
        id
    }

    /// Append a message to a session's log
    ///
    /// # Errors
    /// * `BridgeError::SessionNotFound` if the session does not exist
    pub async fn append(
        &self,
        id: &str,
        text: impl Into<String>,
        origin: MessageOrigin,
    ) -> Result<ChatMessage, BridgeError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| BridgeError::SessionNotFound(id.to_string()))?;
        let message = ChatMessage::new(text, origin);
        session.messages.push(message.clone());
        debug!(
            session_id = %id,
            origin = origin.as_str(),
            position = session.messages.len(),
            "Message appended"
        );
        Ok(message)
    }

    /// Conversation log in append order; empty for unknown sessions
    pub async fn history(&self, id: &str) -> Vec<ChatMessage> {
        self.sessions
            .read()
            .await
            .get(id)
            .map(|s| s.messages.clone())
            .unwrap_or_default()
    }

    /// Merge visitor details into the session and return the result
    pub async fn set_visitor_info(
        &self,
        id: &str,
        info: VisitorInfo,
    ) -> Result<Option<VisitorInfo>, BridgeError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| BridgeError::SessionNotFound(id.to_string()))?;
        if !info.is_empty() {
            session.visitor.get_or_insert_with(VisitorInfo::default).merge(info);
        }
        Ok(session.visitor.clone())
    }

    /// Record the visitor's page language
    pub async fn set_language(&self, id: &str, language: Language) -> Result<(), BridgeError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| BridgeError::SessionNotFound(id.to_string()))?;
        session.language = language;
        Ok(())
    }

    /// Snapshot of a session
    pub async fn session(&self, id: &str) -> Option<ChatSession> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Whether the session exists
    pub async fn contains(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Number of sessions created since startup
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
