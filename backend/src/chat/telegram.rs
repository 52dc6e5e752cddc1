//! Telegram Bot API client
//!
//! Direct HTTP client for the messaging platform the operator uses.
//! The relay only needs three calls: `sendMessage`, `getUpdates` and `getMe`.

use super::error::PlatformError;
use super::models::RemoteChatId;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout for calls that are not long polls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Extra time granted on top of the long-poll timeout
const POLL_GRACE: Duration = Duration::from_secs(10);

/// The operations the relay needs from a messaging platform
#[async_trait]
pub trait RemotePlatform: Send + Sync {
    /// Deliver text to a chat
    async fn send_message(&self, chat_id: RemoteChatId, text: &str) -> Result<(), PlatformError>;

    /// Fetch pending updates starting at `offset`, waiting up to `timeout_secs`
    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, PlatformError>;

    /// Identity of the bot behind the credentials
    async fn get_me(&self) -> Result<BotUser, PlatformError>;
}

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

/// One entry of the update stream
#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    /// Monotonic update identifier
    pub update_id: i64,
    /// New incoming message
    #[serde(default)]
    pub message: Option<TelegramMessage>,
}

/// A chat message as delivered by the platform
#[derive(Debug, Clone, Deserialize)]
pub struct TelegramMessage {
    /// Message identifier within the chat
    pub message_id: i64,
    /// Chat the message belongs to
    pub chat: Chat,
    /// Text body, absent for stickers, photos, etc.
    #[serde(default)]
    pub text: Option<String>,
    /// Message this one replies to
    #[serde(default)]
    pub reply_to_message: Option<Box<TelegramMessage>>,
}

/// Chat reference
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    /// Chat identifier
    pub id: RemoteChatId,
}

/// Bot account details returned by `getMe`
#[derive(Debug, Clone, Deserialize)]
pub struct BotUser {
    /// User identifier
    pub id: i64,
    /// Always true for bot accounts
    pub is_bot: bool,
    /// Bot username
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: RemoteChatId,
    text: &'a str,
    parse_mode: &'static str,
}

#[derive(Serialize)]
struct GetUpdatesRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

/// HTTP client for the Telegram Bot API
#[derive(Clone)]
pub struct TelegramClient {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl std::fmt::Debug for TelegramClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl TelegramClient {
    /// Create a client for the given API base URL and bot token
    ///
    /// # Errors
    /// * `PlatformError::MissingToken` if the token is empty
    pub fn new(
        client: reqwest::Client,
        base_url: impl Into<String>,
        token: impl Into<String>,
    ) -> Result<Self, PlatformError> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(PlatformError::MissingToken);
        }
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn call<P, T>(&self, method: &str, payload: &P, timeout: Duration) -> Result<T, PlatformError>
    where
        P: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = format!("{}/bot{}/{}", self.base_url, self.token, method);

        // reqwest errors carry the URL, which embeds the token
        let response = self
            .client
            .post(&url)
            .timeout(timeout)
            .json(payload)
            .send()
            .await
            .map_err(|e| PlatformError::Http(e.without_url()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PlatformError::Http(e.without_url()))?;

        let parsed: ApiResponse<T> = match serde_json::from_str(&body) {
            Ok(parsed) => parsed,
            Err(e) if status.is_success() => {
                return Err(PlatformError::InvalidResponse(format!(
                    "{} returned unparsable body: {}",
                    method, e
                )))
            }
            Err(_) => {
                return Err(PlatformError::Api {
                    status: status.as_u16(),
                    description: body,
                })
            }
        };

        if !parsed.ok {
            let code = parsed.error_code.unwrap_or_else(|| status.as_u16());
            let description = parsed
                .description
                .unwrap_or_else(|| "no description".to_string());
            tracing::warn!(method = method, code = code, description = %description, "Bot API call rejected");
            if code == 409 {
                return Err(PlatformError::Conflict(description));
            }
            return Err(PlatformError::Api {
                status: code,
                description,
            });
        }

        parsed
            .result
            .ok_or_else(|| PlatformError::InvalidResponse(format!("{} returned no result", method)))
    }
}

#[async_trait]
impl RemotePlatform for TelegramClient {
    async fn send_message(&self, chat_id: RemoteChatId, text: &str) -> Result<(), PlatformError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "Markdown",
        };
        let _: serde_json::Value = self.call("sendMessage", &request, REQUEST_TIMEOUT).await?;
        tracing::debug!(chat_id = chat_id, text_len = text.len(), "Message delivered");
        Ok(())
    }

    async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, PlatformError> {
        let request = GetUpdatesRequest {
            offset,
            timeout: timeout_secs,
            allowed_updates: ["message"],
        };
        self.call(
            "getUpdates",
            &request,
            Duration::from_secs(timeout_secs) + POLL_GRACE,
        )
        .await
    }

    async fn get_me(&self) -> Result<BotUser, PlatformError> {
        self.call("getMe", &serde_json::json!({}), REQUEST_TIMEOUT)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use serial_test::serial;

    fn client_for(server: &Server) -> TelegramClient {
        TelegramClient::new(reqwest::Client::new(), server.url(), "test-token").unwrap()
    }

    #[test]
    fn test_empty_token_rejected() {
        let result = TelegramClient::new(reqwest::Client::new(), "http://localhost", "  ");
        assert!(matches!(result, Err(PlatformError::MissingToken)));
    }

    #[test]
    fn test_debug_hides_token() {
        let client =
            TelegramClient::new(reqwest::Client::new(), "http://localhost/", "123:secret").unwrap();
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("http://localhost"));
    }

    #[tokio::test]
    #[serial]
    async fn test_send_message_success() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/sendMessage")
            .match_header("content-type", "application/json")
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 42,
                "text": "hello",
                "parse_mode": "Markdown"
            })))
            .with_status(200)
            .with_body(r#"{"ok": true, "result": {"message_id": 1, "chat": {"id": 42}}}"#)
            .create_async()
            .await;

        let result = client_for(&server).send_message(42, "hello").await;

        mock.assert_async().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    #[serial]
    async fn test_send_message_rejected() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/sendMessage")
            .with_status(403)
            .with_body(
                r#"{"ok": false, "error_code": 403, "description": "Forbidden: bot was blocked by the user"}"#,
            )
            .create_async()
            .await;

        let result = client_for(&server).send_message(42, "hello").await;

        mock.assert_async().await;
        match result {
            Err(PlatformError::Api {
                status,
                description,
            }) => {
                assert_eq!(status, 403);
                assert!(description.contains("blocked"));
            }
            other => panic!("Expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    #[serial]
    async fn test_non_json_error_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/sendMessage")
            .with_status(502)
            .with_body("Bad Gateway")
            .create_async()
            .await;

        let result = client_for(&server).send_message(42, "hello").await;

        mock.assert_async().await;
        assert!(matches!(result, Err(PlatformError::Api { status: 502, .. })));
    }

    #[tokio::test]
    #[serial]
    async fn test_get_updates_parses_messages() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/getUpdates")
            .match_body(Matcher::PartialJson(json!({"offset": 10, "timeout": 0})))
            .with_status(200)
            .with_body(
                r#"{"ok": true, "result": [
                    {"update_id": 10, "message": {"message_id": 5, "chat": {"id": 7}, "text": "hi there"}},
                    {"update_id": 11, "message": {"message_id": 6, "chat": {"id": 7}}},
                    {"update_id": 12}
                ]}"#,
            )
            .create_async()
            .await;

        let updates = client_for(&server).get_updates(Some(10), 0).await.unwrap();

        mock.assert_async().await;
        assert_eq!(updates.len(), 3);
        let first = updates[0].message.as_ref().unwrap();
        assert_eq!(first.chat.id, 7);
        assert_eq!(first.text.as_deref(), Some("hi there"));
        assert!(updates[1].message.as_ref().unwrap().text.is_none());
        assert!(updates[2].message.is_none());
    }

    #[tokio::test]
    #[serial]
    async fn test_get_updates_conflict() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/getUpdates")
            .with_status(409)
            .with_body(
                r#"{"ok": false, "error_code": 409, "description": "Conflict: terminated by other getUpdates request"}"#,
            )
            .create_async()
            .await;

        let result = client_for(&server).get_updates(None, 0).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(PlatformError::Conflict(_))));
    }

    #[tokio::test]
    #[serial]
    async fn test_get_me() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/getMe")
            .with_status(200)
            .with_body(r#"{"ok": true, "result": {"id": 1, "is_bot": true, "username": "site_bot"}}"#)
            .create_async()
            .await;

        let me = client_for(&server).get_me().await.unwrap();

        mock.assert_async().await;
        assert!(me.is_bot);
        assert_eq!(me.username.as_deref(), Some("site_bot"));
    }

    #[tokio::test]
    #[serial]
    async fn test_invalid_success_body() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/bottest-token/getMe")
            .with_status(200)
            .with_body("This is not JSON")
            .create_async()
            .await;

        let result = client_for(&server).get_me().await;

        mock.assert_async().await;
        assert!(matches!(result, Err(PlatformError::InvalidResponse(_))));
    }
}
