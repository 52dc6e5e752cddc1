//! Chat module
//!
//! The session-to-conversation bridge: visitor sessions on one side, operator
//! chats on the messaging platform on the other.

pub mod bridge;
pub mod envelope;
pub mod error;
pub mod forwarder;
pub mod identity;
pub mod listener;
pub mod models;
pub mod notifier;
pub mod registry;
pub mod telegram;

pub use bridge::{BridgeStatus, ChatBridge, ListenerHandle};
pub use error::{BridgeError, PlatformError};
pub use forwarder::SendAck;
pub use identity::PairingStrategy;
pub use listener::{InboundEvent, InboundOutcome};
pub use models::{ChatMessage, Language, MessageOrigin, RemoteChatId, SessionId, VisitorInfo};
pub use telegram::RemotePlatform;
