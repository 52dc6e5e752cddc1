//! Chat Relay Backend Library
//!
//! This library exposes modules for testing and external use.
//! The main binary is in `src/main.rs`.

pub mod api;
/// Session-to-conversation bridge between the website and the operator's chat
pub mod chat;
pub mod config;
pub mod error;
/// Request id tagging for tracing
pub mod middleware;
/// Application state management
///
/// Holds the chat bridge shared with request handlers.
pub mod state;
pub mod websocket;
