//! Message envelopes and fixed texts
//!
//! Outbound visitor messages are wrapped in a human-readable envelope that
//! names the session, so the operator can tell conversations apart. The
//! envelope uses the platform's legacy Markdown dialect.

use super::models::{Language, SessionId, VisitorInfo};

/// Label preceding the session id inside an envelope
const SESSION_LABEL: &str = "Session:";

/// Sent to a chat that writes to the bot without being paired to a session
pub const WELCOME_TEXT: &str = "👋 Welcome! This bot is connected to the website chat.\n\n\
When a visitor sends a message on the website, you'll receive it here and can reply directly.";

/// Sent back to the operator once a reply has been relayed
pub const RELAYED_ACK_TEXT: &str = "✅ Message sent to website chat";

/// Visitor-facing apology appended when a message cannot reach the operator
pub fn apology_text(language: Language) -> &'static str {
    match language {
        Language::Ar => "عذراً، تعذّر إيصال رسالتك إلى فريقنا حالياً. يرجى المحاولة مرة أخرى بعد قليل.",
        Language::En => {
            "Sorry, we couldn't deliver your message to our team right now. Please try again shortly."
        }
    }
}

/// Escape legacy Markdown control characters
pub fn escape_markdown(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Build the operator-facing envelope for a visitor message
pub fn format_envelope(session_id: &str, text: &str, visitor: Option<&VisitorInfo>) -> String {
    let mut envelope = format!(
        "🌐 *New message from website*\n📝 {} `{}`",
        SESSION_LABEL, session_id
    );

    if let Some(info) = visitor.filter(|v| !v.is_empty()) {
        let name = info
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or("Anonymous");
        envelope.push_str("\n👤 ");
        envelope.push_str(&escape_markdown(name));
        if let Some(email) = info.email.as_deref().map(str::trim).filter(|e| !e.is_empty()) {
            envelope.push_str(&format!(" ({})", escape_markdown(email)));
        }
    }

    envelope.push_str("\n\n");
    envelope.push_str(&escape_markdown(text));
    envelope
}

/// Recover the session id from an envelope
///
/// Accepts both the raw Markdown and the rendered text the platform echoes
/// back in quoted replies (where the backticks are gone).
pub fn parse_session_marker(text: &str) -> Option<SessionId> {
    let start = text.find(SESSION_LABEL)? + SESSION_LABEL.len();
    let rest = text[start..].trim_start().trim_start_matches('`');
    let id: String = rest
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect();
    (!id.is_empty()).then_some(id)
}
