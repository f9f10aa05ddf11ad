use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use thiserror::Error;

use crate::commands::{CommandPayload, CommandRouteError, CommandRouter, CommandService};
use crate::reply::Reply;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub update_id: i64,
    pub event: ChatEvent,
}

impl ChatEnvelope {
    pub fn origin(&self) -> Option<&ChatOrigin> {
        match &self.event {
            ChatEvent::Command(payload) => Some(&payload.origin),
            ChatEvent::Message(message) => Some(&message.origin),
            ChatEvent::Unsupported { .. } => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Command(CommandPayload),
    Message(MessageEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Command(_) => ChatEventType::Command,
            Self::Message(_) => ChatEventType::Message,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Command,
    Message,
    Unsupported,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatType {
    Private,
    Group,
}

/// Where an update came from and where the reply goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatOrigin {
    pub chat_id: i64,
    pub chat_type: ChatType,
    pub user_id: Option<i64>,
}

impl ChatOrigin {
    pub fn private(user_id: i64) -> Self {
        Self { chat_id: user_id, chat_type: ChatType::Private, user_id: Some(user_id) }
    }

    pub fn group(chat_id: i64, user_id: Option<i64>) -> Self {
        Self { chat_id, chat_type: ChatType::Group, user_id }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub origin: ChatOrigin,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(Reply),
    Processed,
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error(transparent)]
    Route(#[from] CommandRouteError),
    #[error("message handler failure: {0}")]
    Message(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

/// Registers the command and free-text handlers.
pub fn build_dispatcher<C, M>(commands: C, conversation: M) -> EventDispatcher
where
    C: CommandService + 'static,
    M: ConversationService + 'static,
{
    let mut dispatcher = EventDispatcher::new();
    dispatcher.register(CommandHandler::new(commands));
    dispatcher.register(MessageHandler::new(conversation));
    dispatcher
}

pub struct CommandHandler<S> {
    router: CommandRouter<S>,
}

impl<S> CommandHandler<S>
where
    S: CommandService,
{
    pub fn new(service: S) -> Self {
        Self { router: CommandRouter::new(service) }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: CommandService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Command
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Command(payload) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.router.route(payload, ctx).await?;
        Ok(HandlerResult::Responded(reply))
    }
}

/// Free-text turns.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<Reply>, EventHandlerError>;
}

pub struct MessageHandler<S> {
    service: S,
}

impl<S> MessageHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Message
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.text.trim().is_empty() {
            return Ok(HandlerResult::Ignored);
        }

        let reply = self.service.handle_message(event, ctx).await?;
        Ok(match reply {
            Some(reply) => HandlerResult::Responded(reply),
            None => HandlerResult::Processed,
        })
    }
}
