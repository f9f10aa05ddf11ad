//! Bot API transport over HTTP long polling.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use guestline_core::config::ChatConfig;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::debug;

use crate::commands::{split_command, CommandPayload};
use crate::events::{ChatEnvelope, ChatEvent, ChatOrigin, MessageEvent};
use crate::polling::{ChatTransport, TransportError};
use crate::reply::RenderedReply;

/// Added to the long-poll timeout before the HTTP request gives up.
const REQUEST_GRACE_SECS: u64 = 10;

#[derive(Default)]
struct PollState {
    offset: Option<i64>,
    pending: VecDeque<ChatEnvelope>,
}

pub struct TelegramTransport {
    client: Client,
    api_base: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
    state: Mutex<PollState>,
}

impl TelegramTransport {
    pub fn new(config: &ChatConfig) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + REQUEST_GRACE_SECS))
            .build()
            .map_err(|error| TransportError::Connect(error.without_url().to_string()))?;
        Ok(Self {
            client,
            api_base: config.api_base.trim().trim_end_matches('/').to_string(),
            bot_token: config.bot_token.clone(),
            poll_timeout_secs: config.poll_timeout_secs,
            state: Mutex::new(PollState::default()),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token.expose_secret())
    }

    /// Calls a bot API method and unwraps the `{ok, result}` envelope. Errors
    /// never carry the URL, which embeds the token.
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
    ) -> Result<T, String> {
        let response =
            request.send().await.map_err(|error| format!("{method}: {}", error.without_url()))?;
        let status = response.status();
        let body: ApiResponse<T> = response
            .json()
            .await
            .map_err(|error| format!("{method}: HTTP {status}: {}", error.without_url()))?;

        match (body.ok, body.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(format!(
                "{method}: HTTP {status}: {}",
                body.description.unwrap_or_else(|| "no description".to_string())
            )),
        }
    }

    async fn get_updates(&self, offset: Option<i64>) -> Result<Vec<Update>, TransportError> {
        let mut query = vec![("timeout", self.poll_timeout_secs.to_string())];
        if let Some(offset) = offset {
            query.push(("offset", offset.to_string()));
        }
        let request = self.client.get(self.method_url("getUpdates")).query(&query);
        self.call(request, "getUpdates").await.map_err(TransportError::Receive)
    }

    async fn post(&self, method: &str, payload: Value) -> Result<(), TransportError> {
        let request = self.client.post(self.method_url(method)).json(&payload);
        self.call::<Value>(request, method).await.map(|_| ()).map_err(TransportError::Send)
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let request = self.client.get(self.method_url("getMe"));
        let me: BotUser = self.call(request, "getMe").await.map_err(TransportError::Connect)?;
        debug!(bot_id = me.id, "bot identity confirmed");
        Ok(())
    }

    /// Blocks across empty polls until at least one update is available.
    async fn next_update(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        let mut state = self.state.lock().await;
        loop {
            if let Some(envelope) = state.pending.pop_front() {
                return Ok(Some(envelope));
            }

            let updates = self.get_updates(state.offset).await?;
            for update in updates {
                state.offset = Some(state.offset.unwrap_or(0).max(update.update_id + 1));
                state.pending.push_back(update.into_envelope());
            }
        }
    }

    async fn send_reply(&self, chat_id: i64, reply: &RenderedReply) -> Result<(), TransportError> {
        self.post(
            "sendMessage",
            json!({"chat_id": chat_id, "text": reply.text, "parse_mode": reply.parse_mode}),
        )
        .await
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError> {
        self.post("sendChatAction", json!({"chat_id": chat_id, "action": "typing"})).await
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Deserialize)]
struct BotUser {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<Sender>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct Sender {
    id: i64,
    #[serde(default)]
    is_bot: bool,
}

impl Update {
    fn into_envelope(self) -> ChatEnvelope {
        let update_id = self.update_id;
        let unsupported = |event_type: &str| ChatEnvelope {
            update_id,
            event: ChatEvent::Unsupported { event_type: event_type.to_string() },
        };

        let Some(message) = self.message else {
            return unsupported("non_message");
        };
        if message.from.as_ref().is_some_and(|sender| sender.is_bot) {
            return unsupported("bot_message");
        }
        let user_id = message.from.as_ref().map(|sender| sender.id);
        let origin = match message.chat.kind.as_str() {
            "private" => ChatOrigin::private(message.chat.id),
            "group" | "supergroup" => ChatOrigin::group(message.chat.id, user_id),
            _ => return unsupported("channel_post"),
        };
        let Some(text) = message.text else {
            return unsupported("non_text");
        };

        let event = match split_command(&text) {
            Some((name, args)) => ChatEvent::Command(CommandPayload { origin, name, args }),
            None => ChatEvent::Message(MessageEvent { origin, text }),
        };
        ChatEnvelope { update_id, event }
    }
}

#[cfg(test)]
mod tests {
    use guestline_core::config::ChatConfig;
    use httpmock::prelude::*;
    use secrecy::SecretString;
    use serde_json::json;

    use super::TelegramTransport;
    use crate::events::{ChatEvent, ChatOrigin, ChatType};
    use crate::polling::{ChatTransport, TransportError};
    use crate::reply::Reply;

    fn transport(server: &MockServer) -> TelegramTransport {
        let config = ChatConfig {
            bot_token: SecretString::from("123:abc".to_string()),
            api_base: server.base_url(),
            poll_timeout_secs: 0,
        };
        TelegramTransport::new(&config).expect("transport")
    }

    #[tokio::test]
    async fn connect_checks_the_token() {
        let server = MockServer::start_async().await;
        let me = server.mock(|when, then| {
            when.method(GET).path("/bot123:abc/getMe");
            then.status(401)
                .json_body(json!({"ok": false, "error_code": 401, "description": "Unauthorized"}));
        });

        let error = transport(&server).connect().await.expect_err("unauthorized");
        assert!(matches!(
            error,
            TransportError::Connect(ref message) if message.contains("Unauthorized")
        ));
        assert!(!error.to_string().contains("123:abc"));
        me.assert_calls(1);
    }

    #[tokio::test]
    async fn updates_are_parsed_and_offset_advances() {
        let server = MockServer::start_async().await;
        let first = server.mock(|when, then| {
            when.method(GET).path("/bot123:abc/getUpdates").query_param("timeout", "0");
            then.status(200).json_body(json!({
                "ok": true,
                "result": [
                    {"update_id": 40, "message": {"chat": {"id": 42, "type": "private"},
                        "from": {"id": 42, "is_bot": false}, "text": "who's approved for ETHDenver?"}},
                    {"update_id": 41, "message": {"chat": {"id": -100, "type": "supergroup"},
                        "from": {"id": 7, "is_bot": false}, "text": "/guests@guestline_bot evt-1 approved"}},
                    {"update_id": 42, "edited_message": {"chat": {"id": 42, "type": "private"}}}
                ]
            }));
        });
        let transport = transport(&server);

        let message = transport.next_update().await.expect("poll").expect("update");
        assert_eq!(message.update_id, 40);
        let ChatEvent::Message(event) = message.event else {
            panic!("expected message");
        };
        assert_eq!(event.origin, ChatOrigin::private(42));
        assert_eq!(event.text, "who's approved for ETHDenver?");

        let command = transport.next_update().await.expect("poll").expect("update");
        let ChatEvent::Command(payload) = command.event else {
            panic!("expected command");
        };
        assert_eq!(payload.origin.chat_type, ChatType::Group);
        assert_eq!(payload.origin.user_id, Some(7));
        assert_eq!(payload.name, "guests");
        assert_eq!(payload.args, "evt-1 approved");

        let other = transport.next_update().await.expect("poll").expect("update");
        assert!(matches!(other.event, ChatEvent::Unsupported { .. }));
        first.assert_calls(1);
        assert_eq!(transport.state.lock().await.offset, Some(43));
    }

    #[tokio::test]
    async fn send_reply_posts_markdown_v2() {
        let server = MockServer::start_async().await;
        let send = server.mock(|when, then| {
            when.method(POST).path("/bot123:abc/sendMessage").json_body(json!({
                "chat_id": 42,
                "text": "evt\\-1 ok\\.",
                "parse_mode": "MarkdownV2"
            }));
            then.status(200).json_body(json!({"ok": true, "result": {"message_id": 1}}));
        });

        transport(&server)
            .send_reply(42, &Reply::new("evt-1 ok.").render())
            .await
            .expect("sent");
        send.assert_calls(1);
    }

    #[tokio::test]
    async fn rejected_send_is_a_send_error() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/bot123:abc/sendChatAction");
            then.status(400).json_body(
                json!({"ok": false, "description": "Bad Request: chat not found"}),
            );
        });

        let error = transport(&server).send_typing(1).await.expect_err("rejected");
        assert!(matches!(
            error,
            TransportError::Send(ref message) if message.contains("chat not found")
        ));
    }
}
