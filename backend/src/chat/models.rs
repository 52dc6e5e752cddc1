//! Chat data models
//!
//! Defines structures for visitor sessions and the messages they carry.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Opaque, visitor-facing session token
pub type SessionId = String;

/// Chat identifier on the messaging platform
pub type RemoteChatId = i64;

/// Which side of the relay a message came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageOrigin {
    /// Message typed by the website visitor
    User,
    /// Message relayed from the operator's chat
    Telegram,
}

impl MessageOrigin {
    /// Convert the origin to its wire representation
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageOrigin::User => "user",
            MessageOrigin::Telegram => "telegram",
        }
    }
}

/// A single entry in a session's conversation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message body
    pub text: String,
    /// Origin of the message
    pub from: MessageOrigin,
    /// Server-assigned RFC 3339 timestamp (UTC, millisecond precision)
    pub timestamp: String,
}

impl ChatMessage {
    /// Create a message stamped with the current time
    pub fn new(text: impl Into<String>, from: MessageOrigin) -> Self {
        Self {
            text: text.into(),
            from,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }

    /// Parse the timestamp back into a `DateTime`
    pub fn timestamp_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.timestamp)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Optional visitor contact details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitorInfo {
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Contact address
    #[serde(default)]
    pub email: Option<String>,
}

impl VisitorInfo {
    /// True when neither field carries a value
    pub fn is_empty(&self) -> bool {
        non_blank(&self.name).is_none() && non_blank(&self.email).is_none()
    }

    /// Merge additively: present, non-blank fields in `other` win, nothing is cleared
    pub fn merge(&mut self, other: VisitorInfo) {
        if let Some(name) = non_blank(&other.name) {
            self.name = Some(name.to_string());
        }
        if let Some(email) = non_blank(&other.email) {
            self.email = Some(email.to_string());
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Site language, used for visitor-facing system texts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Arabic
    Ar,
    /// English
    #[default]
    En,
}

/// A visitor conversation
#[derive(Debug, Clone, Serialize)]
pub struct ChatSession {
    /// Session identifier
    pub id: SessionId,
    /// Append-only conversation log
    pub messages: Vec<ChatMessage>,
    /// Visitor details, if supplied
    pub visitor: Option<VisitorInfo>,
    /// Language of the visitor's page
    pub language: Language,
    /// When the session was created
    pub created_at: DateTime<Utc>,
}

impl ChatSession {
    /// Create an empty session
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            visitor: None,
            language: Language::default(),
            created_at: Utc::now(),
        }
    }
}
