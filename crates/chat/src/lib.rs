//! Chat Integration - long-poll bot interface
//!
//! This crate provides the chat surface for guestline:
//! - **Polling** (`polling`) - update loop with reconnect backoff
//! - **Bot API** (`telegram`) - `getUpdates`, `sendMessage`, `sendChatAction`
//! - **Commands** (`commands`) - `/events`, `/guests`, `/approve`, `/decline`
//! - **Events** (`events`) - routes commands and free text to services
//! - **Replies** (`reply`) - MarkdownV2 rendering at the send boundary
//!
//! # Architecture
//!
//! ```text
//! Bot API → PollingRunner → EventDispatcher → Handlers → Services (agent runtime)
//!                 ↓
//!           Reply::render ← Response
//! ```

pub mod commands;
pub mod events;
pub mod polling;
pub mod reply;
pub mod telegram;

pub use commands::{ChatCommand, CommandRouter, CommandService};
pub use events::{
    build_dispatcher, ChatEnvelope, ChatEvent, ChatOrigin, ChatType, ConversationService,
    EventContext, EventDispatcher, HandlerResult,
};
pub use polling::{ChatTransport, PollingRunner, ReconnectPolicy, TransportError};
pub use reply::{RenderedReply, Reply};
pub use telegram::TelegramTransport;
