use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use guestline_core::errors::InterfaceError;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::events::{
    ChatEnvelope, DispatchError, EventContext, EventDispatcher, EventHandlerError, HandlerResult,
};
use crate::reply::{RenderedReply, Reply};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport failed to connect: {0}")]
    Connect(String),
    #[error("transport read failed: {0}")]
    Receive(String),
    #[error("transport send failed: {0}")]
    Send(String),
    #[error("transport disconnect failed: {0}")]
    Disconnect(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn connect(&self) -> Result<(), TransportError>;
    /// `None` means the update stream is closed.
    async fn next_update(&self) -> Result<Option<ChatEnvelope>, TransportError>;
    async fn send_reply(&self, chat_id: i64, reply: &RenderedReply) -> Result<(), TransportError>;
    async fn send_typing(&self, chat_id: i64) -> Result<(), TransportError>;
    async fn disconnect(&self) -> Result<(), TransportError>;
}

#[derive(Default)]
pub struct NoopChatTransport;

#[async_trait]
impl ChatTransport for NoopChatTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn next_update(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        Ok(None)
    }

    async fn send_reply(
        &self,
        _chat_id: i64,
        _reply: &RenderedReply,
    ) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_typing(&self, _chat_id: i64) -> Result<(), TransportError> {
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

pub struct PollingRunner {
    transport: Arc<dyn ChatTransport>,
    dispatcher: Arc<EventDispatcher>,
    reconnect_policy: ReconnectPolicy,
}

impl PollingRunner {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        dispatcher: EventDispatcher,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { transport, dispatcher: Arc::new(dispatcher), reconnect_policy }
    }

    /// Runs until the stream closes or retries are exhausted. A session that
    /// handled at least one update clears the failure count, so only
    /// consecutive failures stop the loop. Turns still in flight survive a
    /// reconnect and are awaited before returning.
    pub async fn start(&self) {
        let mut turns = JoinSet::new();
        let mut failures: u32 = 0;
        loop {
            let Err(session) = self.connect_and_pump(failures, &mut turns).await else {
                return;
            };
            if session.handled_updates > 0 {
                failures = 0;
            }
            warn!(
                attempt = failures,
                max_retries = self.reconnect_policy.max_retries,
                handled_updates = session.handled_updates,
                error = %session.error,
                "chat transport failed"
            );

            if failures >= self.reconnect_policy.max_retries {
                warn!(
                    max_retries = self.reconnect_policy.max_retries,
                    "chat transport retries exhausted; stopping polling loop"
                );
                while turns.join_next().await.is_some() {}
                return;
            }

            let delay = self.reconnect_policy.backoff(failures);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            failures += 1;
        }
    }

    /// Each update becomes its own task, so a slow turn never holds up the
    /// next poll.
    async fn connect_and_pump(
        &self,
        attempt: u32,
        turns: &mut JoinSet<()>,
    ) -> Result<(), SessionFailure> {
        info!(attempt, "opening chat transport connection");
        self.transport
            .connect()
            .await
            .map_err(|error| SessionFailure { error, handled_updates: 0 })?;
        info!(attempt, "chat transport connected");

        let mut handled_updates = 0;
        loop {
            while turns.try_join_next().is_some() {}

            let envelope = match self.transport.next_update().await {
                Ok(Some(envelope)) => envelope,
                Ok(None) => break,
                Err(error) => return Err(SessionFailure { error, handled_updates }),
            };
            handled_updates += 1;
            turns.spawn(handle_update(
                Arc::clone(&self.transport),
                Arc::clone(&self.dispatcher),
                envelope,
            ));
        }

        while turns.join_next().await.is_some() {}
        info!(attempt, handled_updates, "chat update stream closed");
        self.transport
            .disconnect()
            .await
            .map_err(|error| SessionFailure { error, handled_updates })
    }
}

/// Why a connection session ended, and how much it got done first.
struct SessionFailure {
    error: TransportError,
    handled_updates: usize,
}

/// Command services that fail are upstream outages; anything else is ours.
fn interface_error(error: &DispatchError, correlation_id: &str) -> InterfaceError {
    match error {
        DispatchError::Handler(EventHandlerError::Route(route)) => {
            InterfaceError::ServiceUnavailable {
                message: route.to_string(),
                correlation_id: correlation_id.to_string(),
            }
        }
        DispatchError::Handler(EventHandlerError::Message(_)) => {
            InterfaceError::internal(error.to_string(), correlation_id)
        }
    }
}

/// One turn. Failures end in an apology or a log line, never in an error.
async fn handle_update(
    transport: Arc<dyn ChatTransport>,
    dispatcher: Arc<EventDispatcher>,
    envelope: ChatEnvelope,
) {
    let correlation_id = format!("update-{}", envelope.update_id);
    let chat_id = envelope.origin().map(|origin| origin.chat_id);
    info!(
        event_name = "ingress.chat.update_received",
        update_id = envelope.update_id,
        event_type = ?envelope.event.event_type(),
        correlation_id = %correlation_id,
        "received chat update"
    );

    let Some(chat_id) = chat_id else {
        debug!(correlation_id = %correlation_id, "update has no chat to answer; skipped");
        return;
    };

    if let Err(error) = transport.send_typing(chat_id).await {
        debug!(
            event_name = "egress.chat.typing_failed",
            correlation_id = %correlation_id,
            error = %error,
            "typing indicator not sent"
        );
    }

    let context = EventContext { correlation_id: correlation_id.clone() };
    let reply = match dispatcher.dispatch(&envelope, &context).await {
        Ok(HandlerResult::Responded(reply)) => reply,
        Ok(HandlerResult::Processed | HandlerResult::Ignored) => return,
        Err(error) => {
            let failure = interface_error(&error, &correlation_id);
            warn!(
                event_name = "ingress.chat.dispatch_failed",
                correlation_id = failure.correlation_id(),
                error = %failure,
                "event dispatch failed; sending apology"
            );
            Reply::apology(&failure)
        }
    };

    match transport.send_reply(chat_id, &reply.render()).await {
        Ok(()) => debug!(
            event_name = "egress.chat.reply_sent",
            correlation_id = %correlation_id,
            chat_id,
            "reply sent"
        ),
        Err(error) => warn!(
            event_name = "egress.chat.send_failed",
            correlation_id = %correlation_id,
            chat_id,
            error = %error,
            "failed to send reply; continuing polling loop"
        ),
    }
}
