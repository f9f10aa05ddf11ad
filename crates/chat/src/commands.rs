use async_trait::async_trait;
use guestline_core::domain::guest::{is_plausible_email, DecisionStatus};
use thiserror::Error;

use crate::events::{ChatOrigin, EventContext};
use crate::reply::Reply;

pub const HELP_TEXT: &str = "\
I help you manage your events and guest lists. Ask me in plain words, for example:
- who is approved for ETHDenver?
- what's happening in Dubai?
- decline jane@x.com for the Denver event

Commands:
/events - upcoming events
/guests <event> [status] - guest list, optionally filtered by status
/approve <event> <email> - approve a guest
/decline <event> <email> - decline a guest
/help - this message

<event> is an event id or part of its name.";

pub const WELCOME_TEXT: &str =
    "Hi! I'm Guestline. I can look up your events and guests and approve or decline guests.";

const GUEST_STATUS_WORDS: &[&str] =
    &["approved", "declined", "pending_approval", "pending", "invited", "waitlist"];

/// A slash command as received, before classification.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandPayload {
    pub origin: ChatOrigin,
    pub name: String,
    pub args: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatCommand {
    Start,
    Help,
    Events,
    Guests { event: String, status: Option<String> },
    SetStatus { event: String, guest_email: String, status: DecisionStatus },
    Usage { usage: &'static str },
    Unknown { name: String },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandRouteError {
    #[error("command service failed: {0}")]
    Service(String),
}

/// Splits `/name@bot args` into a lower-cased name and the trimmed args.
pub fn split_command(text: &str) -> Option<(String, String)> {
    let rest = text.trim().strip_prefix('/')?;
    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or_default().to_ascii_lowercase();
    if name.is_empty() {
        return None;
    }
    Some((name, args.to_string()))
}

pub fn classify_command(name: &str, args: &str) -> ChatCommand {
    match name {
        "start" => ChatCommand::Start,
        "help" => ChatCommand::Help,
        "events" => ChatCommand::Events,
        "guests" => parse_guests(args),
        "approve" => parse_set_status(args, DecisionStatus::Approved, "/approve <event> <email>"),
        "decline" => parse_set_status(args, DecisionStatus::Declined, "/decline <event> <email>"),
        _ => ChatCommand::Unknown { name: name.to_string() },
    }
}

fn parse_guests(args: &str) -> ChatCommand {
    let mut tokens = args.split_whitespace().collect::<Vec<_>>();
    let status = match tokens.last() {
        Some(last) if tokens.len() > 1 && is_status_word(last) => {
            tokens.pop().map(|token| token.to_ascii_lowercase())
        }
        _ => None,
    };
    if tokens.is_empty() {
        return ChatCommand::Usage { usage: "/guests <event> [status]" };
    }
    ChatCommand::Guests { event: tokens.join(" "), status }
}

fn is_status_word(token: &str) -> bool {
    let token = token.to_ascii_lowercase();
    GUEST_STATUS_WORDS.contains(&token.as_str())
}

/// The email may appear anywhere; everything else names the event.
fn parse_set_status(args: &str, status: DecisionStatus, usage: &'static str) -> ChatCommand {
    let tokens = args.split_whitespace().collect::<Vec<_>>();
    let Some(position) = tokens.iter().position(|token| is_plausible_email(token)) else {
        return ChatCommand::Usage { usage };
    };
    let event = tokens
        .iter()
        .enumerate()
        .filter(|(index, _)| *index != position)
        .map(|(_, token)| *token)
        .collect::<Vec<_>>()
        .join(" ");
    if event.is_empty() {
        return ChatCommand::Usage { usage };
    }
    ChatCommand::SetStatus { event, guest_email: tokens[position].to_string(), status }
}

/// Commands that need the event platform.
#[async_trait]
pub trait CommandService: Send + Sync {
    async fn list_events(
        &self,
        origin: &ChatOrigin,
        ctx: &EventContext,
    ) -> Result<Reply, CommandRouteError>;

    async fn list_guests(
        &self,
        event: String,
        status: Option<String>,
        origin: &ChatOrigin,
        ctx: &EventContext,
    ) -> Result<Reply, CommandRouteError>;

    async fn set_guest_status(
        &self,
        event: String,
        guest_email: String,
        status: DecisionStatus,
        origin: &ChatOrigin,
        ctx: &EventContext,
    ) -> Result<Reply, CommandRouteError>;
}

pub struct CommandRouter<S> {
    service: S,
}

impl<S> CommandRouter<S>
where
    S: CommandService,
{
    pub fn new(service: S) -> Self {
        Self { service }
    }

    pub async fn route(
        &self,
        payload: &CommandPayload,
        ctx: &EventContext,
    ) -> Result<Reply, CommandRouteError> {
        let origin = &payload.origin;
        match classify_command(&payload.name, &payload.args) {
            ChatCommand::Start => Ok(Reply::new(format!("{WELCOME_TEXT}\n\n{HELP_TEXT}"))),
            ChatCommand::Help => Ok(Reply::new(HELP_TEXT)),
            ChatCommand::Events => self.service.list_events(origin, ctx).await,
            ChatCommand::Guests { event, status } => {
                self.service.list_guests(event, status, origin, ctx).await
            }
            ChatCommand::SetStatus { event, guest_email, status } => {
                self.service.set_guest_status(event, guest_email, status, origin, ctx).await
            }
            ChatCommand::Usage { usage } => Ok(Reply::new(format!("Usage: {usage}"))),
            ChatCommand::Unknown { name } => Ok(Reply::new(format!(
                "I don't know the command /{name}. Send /help to see what I can do."
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use guestline_core::domain::guest::DecisionStatus;

    use super::{
        classify_command, split_command, ChatCommand, CommandPayload, CommandRouteError,
        CommandRouter, CommandService, HELP_TEXT,
    };
    use crate::events::{ChatOrigin, EventContext};
    use crate::reply::Reply;

    #[derive(Default)]
    struct RecordingService {
        calls: Mutex<Vec<String>>,
    }

    impl RecordingService {
        fn record(&self, call: String) -> Result<Reply, CommandRouteError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(call.clone());
            }
            Ok(Reply::new(call))
        }
    }

    #[async_trait]
    impl CommandService for RecordingService {
        async fn list_events(
            &self,
            _origin: &ChatOrigin,
            _ctx: &EventContext,
        ) -> Result<Reply, CommandRouteError> {
            self.record("events".to_string())
        }

        async fn list_guests(
            &self,
            event: String,
            status: Option<String>,
            _origin: &ChatOrigin,
            _ctx: &EventContext,
        ) -> Result<Reply, CommandRouteError> {
            self.record(format!("guests {event} {status:?}"))
        }

        async fn set_guest_status(
            &self,
            event: String,
            guest_email: String,
            status: DecisionStatus,
            _origin: &ChatOrigin,
            _ctx: &EventContext,
        ) -> Result<Reply, CommandRouteError> {
            self.record(format!("{status} {guest_email} {event}"))
        }
    }

    fn payload(text: &str) -> CommandPayload {
        let (name, args) = split_command(text).expect("command");
        CommandPayload { origin: ChatOrigin::private(42), name, args }
    }

    #[test]
    fn split_strips_bot_suffix_and_lowercases() {
        assert_eq!(
            split_command("/Guests@guestline_bot  ETH Summit approved "),
            Some(("guests".to_string(), "ETH Summit approved".to_string()))
        );
        assert_eq!(split_command("/events"), Some(("events".to_string(), String::new())));
        assert_eq!(split_command("hello /events"), None);
        assert_eq!(split_command("/"), None);
    }

    #[test]
    fn guests_takes_trailing_status_and_multi_word_event() {
        assert_eq!(
            classify_command("guests", "ETH Summit Approved"),
            ChatCommand::Guests {
                event: "ETH Summit".to_string(),
                status: Some("approved".to_string())
            }
        );
        assert_eq!(
            classify_command("guests", "evt-1"),
            ChatCommand::Guests { event: "evt-1".to_string(), status: None }
        );
        assert_eq!(
            classify_command("guests", "approved"),
            ChatCommand::Guests { event: "approved".to_string(), status: None }
        );
        assert!(matches!(classify_command("guests", ""), ChatCommand::Usage { .. }));
    }

    #[test]
    fn approve_and_decline_find_the_email() {
        assert_eq!(
            classify_command("approve", "jane@x.com ETH Denver"),
            ChatCommand::SetStatus {
                event: "ETH Denver".to_string(),
                guest_email: "jane@x.com".to_string(),
                status: DecisionStatus::Approved,
            }
        );
        assert!(matches!(
            classify_command("decline", "evt-1 jane"),
            ChatCommand::Usage { usage: "/decline <event> <email>" }
        ));
        assert!(matches!(classify_command("decline", "jane@x.com"), ChatCommand::Usage { .. }));
    }

    #[tokio::test]
    async fn router_dispatches_to_service_and_answers_static_commands() {
        let router = CommandRouter::new(RecordingService::default());
        let ctx = EventContext::default();

        let reply = router.route(&payload("/decline evt-1 jane@x.com"), &ctx).await.expect("route");
        assert_eq!(reply.text, "declined jane@x.com evt-1");

        let reply = router.route(&payload("/help"), &ctx).await.expect("route");
        assert_eq!(reply.text, HELP_TEXT);

        let reply = router.route(&payload("/cancel evt-1"), &ctx).await.expect("route");
        assert!(reply.text.contains("/cancel"));
        assert!(reply.text.contains("/help"));
    }
}
