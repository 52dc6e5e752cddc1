//! End-to-end relay flows through ChatBridge

use async_trait::async_trait;
use chat_relay_backend::chat::telegram::{BotUser, Chat, TelegramMessage, Update};
use chat_relay_backend::chat::{
    BridgeError, ChatBridge, InboundEvent, InboundOutcome, MessageOrigin, PairingStrategy,
    PlatformError, RemoteChatId, RemotePlatform, VisitorInfo,
};
use chat_relay_backend::config::{BridgeConfig, TelegramConfig};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Platform double: records sends and replays scripted update batches
#[derive(Default)]
struct ScriptedPlatform {
    sent: Mutex<Vec<(RemoteChatId, String)>>,
    batches: Mutex<VecDeque<Vec<Update>>>,
    fail_sends: AtomicBool,
}

impl ScriptedPlatform {
    fn with_batches(batches: Vec<Vec<Update>>) -> Self {
        Self {
            batches: Mutex::new(batches.into()),
            ..Default::default()
        }
    }

    fn sent(&self) -> Vec<(RemoteChatId, String)> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemotePlatform for ScriptedPlatform {
    async fn send_message(&self, chat_id: RemoteChatId, text: &str) -> Result<(), PlatformError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(PlatformError::Api {
                status: 400,
                description: "Bad Request: chat not found".to_string(),
            });
        }
        self.sent.lock().unwrap().push((chat_id, text.to_string()));
        Ok(())
    }

    async fn get_updates(
        &self,
        _offset: Option<i64>,
        _timeout_secs: u64,
    ) -> Result<Vec<Update>, PlatformError> {
        let next = self.batches.lock().unwrap().pop_front();
        match next {
            Some(batch) => Ok(batch),
            // Ends the poller once the script is exhausted
            None => Err(PlatformError::Conflict("script finished".to_string())),
        }
    }

    async fn get_me(&self) -> Result<BotUser, PlatformError> {
        Ok(BotUser {
            id: 1,
            is_bot: true,
            username: Some("relay_bot".to_string()),
        })
    }
}

fn text_update(update_id: i64, chat_id: RemoteChatId, text: &str) -> Update {
    Update {
        update_id,
        message: Some(TelegramMessage {
            message_id: update_id,
            chat: Chat { id: chat_id },
            text: Some(text.to_string()),
            reply_to_message: None,
        }),
    }
}

fn event(chat_id: RemoteChatId, text: &str) -> InboundEvent {
    InboundEvent {
        chat_id,
        text: text.to_string(),
        reply_to_text: None,
    }
}

fn bridge_with(platform: Arc<ScriptedPlatform>, config: BridgeConfig) -> ChatBridge {
    ChatBridge::new(Some(platform as Arc<dyn RemotePlatform>), &config, 0)
}

#[tokio::test]
async fn test_no_contact_then_operator_discovered() {
    let platform = Arc::new(ScriptedPlatform::default());
    let bridge = bridge_with(platform.clone(), BridgeConfig::default());
    let session = bridge.create_session().await;

    // Nobody has messaged the bot yet
    let err = bridge
        .send_message(&session, "hello", None, None)
        .await
        .unwrap_err();
    assert_eq!(err, BridgeError::NoRemoteContactAvailable);

    let history = bridge.history(&session).await;
    assert_eq!(history[0].text, "hello");
    assert_eq!(history[0].from, MessageOrigin::User);
    assert_eq!(history.len(), 2, "apology follows the visitor message");

    // The operator introduces themselves
    let outcome = bridge.handle_inbound(event(77, "/start")).await;
    assert_eq!(
        outcome,
        InboundOutcome::Unpaired {
            chat_id: 77,
            first_contact: true
        }
    );

    let ack = bridge
        .send_message(&session, "anyone there?", None, None)
        .await
        .unwrap();
    assert!(ack.forwarded);
    assert_eq!(ack.chat_id, Some(77));
    assert_eq!(bridge.identity().resolve_session(77).await, Some(session.clone()));

    let mut replies = bridge.subscribe(&session).await;
    let outcome = bridge.handle_inbound(event(77, "yes, how can I help?")).await;
    let InboundOutcome::Relayed {
        session_id,
        message,
        subscribers,
    } = outcome
    else {
        panic!("expected a relayed reply, got {:?}", outcome);
    };
    assert_eq!(session_id, session);
    assert_eq!(subscribers, 1);

    let pushed = replies.recv().await.unwrap();
    assert_eq!(pushed, message);
    let last = bridge.history(&session).await.pop().unwrap();
    assert_eq!(last, pushed);
    assert_eq!(last.from, MessageOrigin::Telegram);
}

#[tokio::test]
async fn test_envelope_reaches_operator() {
    let platform = Arc::new(ScriptedPlatform::default());
    let bridge = bridge_with(platform.clone(), BridgeConfig::default());
    bridge.handle_inbound(event(9, "hi bot")).await;

    let session = bridge.create_session().await;
    let visitor = VisitorInfo {
        name: Some("Mona".to_string()),
        email: Some("mona@example.com".to_string()),
    };
    bridge
        .send_message(&session, "Do you ship abroad?", Some(visitor), None)
        .await
        .unwrap();

    let sent = platform.sent();
    let (chat_id, envelope) = sent.last().unwrap();
    assert_eq!(*chat_id, 9);
    assert!(envelope.contains(&session));
    assert!(envelope.contains("Mona"));
    assert!(envelope.contains("mona@example.com"));
    assert!(envelope.ends_with("Do you ship abroad?"));
}

#[tokio::test]
async fn test_delivery_failure_keeps_visitor_message() {
    let platform = Arc::new(ScriptedPlatform::default());
    let bridge = bridge_with(platform.clone(), BridgeConfig::default());
    bridge.handle_inbound(event(5, "/start")).await;
    platform.fail_sends.store(true, Ordering::SeqCst);

    let session = bridge.create_session().await;
    let err = bridge
        .send_message(&session, "hello", None, None)
        .await
        .unwrap_err();
    assert!(matches!(err, BridgeError::DeliveryFailed(_)));

    let history = bridge.history(&session).await;
    assert_eq!(history[0].text, "hello");
    assert_eq!(history[0].from, MessageOrigin::User);
}

#[tokio::test]
async fn test_new_session_takes_over_operator_chat() {
    let platform = Arc::new(ScriptedPlatform::default());
    let bridge = bridge_with(platform.clone(), BridgeConfig::default());
    bridge.handle_inbound(event(5, "/start")).await;

    let first = bridge.create_session().await;
    let second = bridge.create_session().await;
    bridge.send_message(&first, "one", None, None).await.unwrap();
    bridge.send_message(&second, "two", None, None).await.unwrap();

    // Last bind wins: replies go to the most recent session
    bridge.handle_inbound(event(5, "reply")).await;
    assert_eq!(bridge.history(&first).await.len(), 1);
    assert_eq!(bridge.history(&second).await.len(), 2);
    assert_eq!(bridge.identity().resolve_remote(&first).await, None);
}

#[tokio::test]
async fn test_round_robin_spreads_sessions() {
    let platform = Arc::new(ScriptedPlatform::default());
    let config = BridgeConfig {
        pairing_strategy: PairingStrategy::RoundRobin,
        ..BridgeConfig::default()
    };
    let bridge = bridge_with(platform.clone(), config);
    bridge.handle_inbound(event(1, "/start")).await;
    bridge.handle_inbound(event(2, "/start")).await;

    let a = bridge.create_session().await;
    let b = bridge.create_session().await;
    let ack_a = bridge.send_message(&a, "a", None, None).await.unwrap();
    let ack_b = bridge.send_message(&b, "b", None, None).await.unwrap();

    assert_eq!(ack_a.chat_id, Some(1));
    assert_eq!(ack_b.chat_id, Some(2));
    assert_eq!(bridge.status().await.pairings, 2);
}

#[tokio::test]
async fn test_disabled_bridge_flow() {
    let telegram = TelegramConfig {
        bot_token: None,
        api_base_url: "http://127.0.0.1:9".to_string(),
        poll_timeout_secs: 1,
    };
    let bridge =
        ChatBridge::from_config(reqwest::Client::new(), &telegram, &BridgeConfig::default());
    assert!(!bridge.is_enabled());
    assert!(bridge.spawn_listener().is_none());

    let session = bridge.create_session().await;
    let ack = bridge
        .send_message(&session, "is anyone there?", None, None)
        .await
        .unwrap();
    assert!(!ack.forwarded);
    assert_eq!(ack.chat_id, None);
    assert_eq!(bridge.history(&session).await.len(), 1);
}

#[tokio::test]
async fn test_listener_relays_polled_updates() {
    let platform = Arc::new(ScriptedPlatform::with_batches(vec![
        vec![text_update(100, 42, "/start")],
        vec![],
    ]));
    let bridge = bridge_with(platform.clone(), BridgeConfig::default());
    let handle = bridge.spawn_listener().unwrap();

    // Wait for the poller to register the operator
    let registered = tokio::time::timeout(Duration::from_secs(5), async {
        while bridge.status().await.known_contacts == 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(registered.is_ok(), "operator chat was never registered");

    let session = bridge.create_session().await;
    let ack = bridge.send_message(&session, "hello", None, None).await.unwrap();
    assert_eq!(ack.chat_id, Some(42));

    handle.shutdown();
}

#[tokio::test]
async fn test_full_relay_against_mock_bot_api() {
    let mut server = mockito::Server::new_async().await;
    let get_me = server
        .mock("POST", "/botabc:token/getMe")
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{"id":1,"is_bot":true,"username":"relay_bot"}}"#)
        .create_async()
        .await;
    let send = server
        .mock("POST", "/botabc:token/sendMessage")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "chat_id": 314,
            "parse_mode": "Markdown"
        })))
        .with_status(200)
        .with_body(r#"{"ok":true,"result":{"message_id":1}}"#)
        .expect_at_least(2)
        .create_async()
        .await;

    let telegram = TelegramConfig {
        bot_token: Some("abc:token".to_string()),
        api_base_url: server.url(),
        poll_timeout_secs: 1,
    };
    let bridge =
        ChatBridge::from_config(reqwest::Client::new(), &telegram, &BridgeConfig::default());
    assert_eq!(
        bridge.verify_credentials().await.unwrap().as_deref(),
        Some("relay_bot")
    );

    // Welcome notice goes out through sendMessage
    bridge.handle_inbound(event(314, "/start")).await;

    let session = bridge.create_session().await;
    let ack = bridge.send_message(&session, "hello", None, None).await.unwrap();
    assert!(ack.forwarded);

    get_me.assert_async().await;
    send.assert_async().await;
}
