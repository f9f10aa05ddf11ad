use std::sync::Arc;

use chrono::{DateTime, Utc};
use guestline_core::audit::AuditRecorder;
use guestline_core::config::AppConfig;
use guestline_core::domain::event::{format_start, EventDetail};
use guestline_core::platform::EventPlatform;
use guestline_core::reference::{EventMention, Grounding, ReferenceResolver, ResolveError};
use tracing::{info, warn};

use crate::context::EventContextProvider;
use crate::dispatcher::{ActionDispatcher, DispatchError, ValidationError};
use crate::formatter::ResponseFormatter;
use crate::guardrails::GuardrailPolicy;
use crate::intent::{IntentDecision, IntentResolver, ToolCall};
use crate::llm::LlmClient;
use crate::prompts::{PromptError, Prompts};
use crate::scope::TurnScope;
use crate::tone::ToneNormalizer;
use crate::tools::ToolName;

/// Parameter used by chat commands: an event id or a name fragment.
pub const EVENT_PARAM: &str = "event";

const GROUNDING_UNAVAILABLE_REPLY: &str =
    "Sorry, I couldn't load your events right now, so I can't act on one. Please try again shortly.";
const MISSING_EVENT_REPLY: &str =
    "Which event do you mean? Mention its name or id, or send /events to list them.";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReplyKind {
    Answer,
    Clarification,
    Error,
}

impl ReplyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Answer => "answer",
            Self::Clarification => "clarification",
            Self::Error => "error",
        }
    }
}

/// Plain, unescaped reply text for one turn.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    pub kind: ReplyKind,
}

impl TurnReply {
    pub fn answer(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: ReplyKind::Answer }
    }

    pub fn clarification(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: ReplyKind::Clarification }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self { text: text.into(), kind: ReplyKind::Error }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentSettings {
    pub allow_guest_updates: bool,
    pub hydrate_event_details: bool,
    pub max_pages: u32,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self { allow_guest_updates: true, hydrate_event_details: false, max_pages: 10 }
    }
}

impl AgentSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            allow_guest_updates: config.agent.allow_guest_updates,
            hydrate_event_details: config.agent.hydrate_event_details,
            max_pages: config.platform.max_pages,
        }
    }
}

pub struct AgentRuntime {
    context: EventContextProvider,
    references: ReferenceResolver,
    intent: IntentResolver,
    dispatcher: ActionDispatcher,
    formatter: ResponseFormatter,
    tone: ToneNormalizer,
    hydrate_event_details: bool,
}

impl AgentRuntime {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        platform: Arc<dyn EventPlatform>,
        audit: AuditRecorder,
        settings: AgentSettings,
    ) -> Result<Self, PromptError> {
        let prompts = Arc::new(Prompts::new()?);
        Ok(Self {
            context: EventContextProvider::new(Arc::clone(&platform), settings.max_pages),
            references: ReferenceResolver::new(),
            intent: IntentResolver::new(Arc::clone(&llm), Arc::clone(&prompts)),
            dispatcher: ActionDispatcher::new(
                platform,
                audit,
                GuardrailPolicy::new(settings.allow_guest_updates),
            ),
            formatter: ResponseFormatter::new(Arc::clone(&llm), Arc::clone(&prompts)),
            tone: ToneNormalizer::new(llm, prompts),
            hydrate_event_details: settings.hydrate_event_details,
        })
    }

    /// Free-text turn: grounding, one intent call, then at most one action.
    pub async fn handle_message(&self, text: &str, scope: &TurnScope) -> TurnReply {
        let correlation_id = scope.correlation_id.as_str();
        let snapshot = self.context.snapshot(self.hydrate_event_details, correlation_id).await;
        let resolved = self.intent.resolve(text, &snapshot, correlation_id).await;

        let reply = match resolved.decision {
            IntentDecision::DirectAnswer { text } => match resolved.model_failure {
                Some(_) => TurnReply::error(text),
                None => TurnReply::answer(self.tone.normalize(&text, correlation_id).await),
            },
            IntentDecision::Clarification { prompt } => TurnReply::clarification(prompt),
            IntentDecision::ToolCall(call) => {
                self.execute_tool_call(call, &snapshot.grounding, scope).await
            }
        };
        log_turn(scope, "message", &reply);
        reply
    }

    /// Deterministic entry used by chat commands. Skips the intent call but
    /// still resolves the event against fresh grounding.
    pub async fn handle_tool_call(&self, call: ToolCall, scope: &TurnScope) -> TurnReply {
        let grounding = self.context.load(&scope.correlation_id).await;
        let reply = self.execute_tool_call(call, &grounding, scope).await;
        log_turn(scope, "command", &reply);
        reply
    }

    /// Lists upcoming events with start time and location.
    pub async fn upcoming_events(&self, scope: &TurnScope) -> TurnReply {
        let snapshot = self.context.snapshot(true, &scope.correlation_id).await;
        let reply = match snapshot.grounding {
            Grounding::Unavailable { .. } => TurnReply::error(GROUNDING_UNAVAILABLE_REPLY),
            Grounding::Available(_) => {
                TurnReply::answer(render_upcoming(&snapshot.details, Utc::now()))
            }
        };
        log_turn(scope, "events", &reply);
        reply
    }

    async fn execute_tool_call(
        &self,
        mut call: ToolCall,
        grounding: &Grounding,
        scope: &TurnScope,
    ) -> TurnReply {
        if ToolName::parse(&call.tool).is_none() {
            warn!(
                event_name = "agent.dispatch.unknown_action",
                correlation_id = %scope.correlation_id,
                tool = %call.tool,
                "model requested an unknown action"
            );
            let error = DispatchError::from(ValidationError::UnknownAction(call.tool.clone()));
            return TurnReply::error(error.user_message());
        }

        let mention = mention_for(&call, grounding);
        let event = match self.references.resolve(&mention, grounding) {
            Ok(event) => event,
            Err(error) => return resolution_reply(error, scope),
        };
        call.params.remove(EVENT_PARAM);
        call.params.remove("event_name");
        call.params.insert("event_id".to_string(), event.id.to_string());

        match self.dispatcher.dispatch(&call, scope).await {
            Ok(dispatched) => {
                let draft = self.formatter.format(&dispatched, &scope.correlation_id).await;
                TurnReply::answer(self.tone.normalize(&draft, &scope.correlation_id).await)
            }
            Err(error) => TurnReply::error(error.user_message()),
        }
    }
}

/// Commands pass `event`, which is matched as an id first and as a name
/// otherwise. Model tool calls pass `event_id` and/or `event_name`.
fn mention_for(call: &ToolCall, grounding: &Grounding) -> EventMention {
    if let Some(raw) = call.params.get(EVENT_PARAM).map(|value| value.trim()) {
        let is_known_id = grounding.events().iter().any(|event| event.id.as_str() == raw);
        return if is_known_id { EventMention::by_id(raw) } else { EventMention::by_name(raw) };
    }
    EventMention {
        event_id: call.params.get("event_id").cloned(),
        event_name: call.params.get("event_name").cloned(),
    }
}

fn resolution_reply(error: ResolveError, scope: &TurnScope) -> TurnReply {
    info!(
        event_name = "agent.reference.unresolved",
        correlation_id = %scope.correlation_id,
        error = %error,
        "event reference not resolved"
    );
    match error {
        ResolveError::Ambiguous(ambiguity) => {
            TurnReply::clarification(ambiguity.clarification_prompt())
        }
        ResolveError::MissingReference => TurnReply::clarification(MISSING_EVENT_REPLY),
        ResolveError::NotFound(id) => TurnReply::error(format!(
            "Event {id} was not found in the current event list. Send /events to see your events."
        )),
        ResolveError::NoMatch(name) => TurnReply::error(format!(
            "I couldn't find an event matching \"{name}\". Send /events to see your events."
        )),
        ResolveError::GroundingUnavailable(_) => TurnReply::error(GROUNDING_UNAVAILABLE_REPLY),
    }
}

fn log_turn(scope: &TurnScope, entry: &'static str, reply: &TurnReply) {
    info!(
        event_name = "agent.turn.completed",
        correlation_id = %scope.correlation_id,
        org_id = %scope.org_id,
        entry,
        reply_kind = reply.kind.as_str(),
        "turn completed"
    );
}

/// Events that have not ended yet, soonest first. Unknown start times sort last.
pub fn render_upcoming(details: &[EventDetail], now: DateTime<Utc>) -> String {
    let mut upcoming = details
        .iter()
        .filter(|event| match (event.end_at, event.start_at) {
            (Some(end), _) => end >= now,
            (None, Some(start)) => start >= now,
            (None, None) => true,
        })
        .collect::<Vec<_>>();
    if upcoming.is_empty() {
        return "No upcoming events found.".to_string();
    }
    upcoming.sort_by_key(|event| (event.start_at.is_none(), event.start_at));

    let mut lines = vec![format!("Upcoming events ({}):", upcoming.len())];
    for (index, event) in upcoming.iter().enumerate() {
        let mut line = format!(
            "{}. {} (id: {}), starts {}",
            index + 1,
            event.name,
            event.id,
            format_start(event.start_at)
        );
        if let Some(location) = &event.location {
            line.push_str(&format!(", {location}"));
        }
        lines.push(line);
    }
    lines.join("\n")
}
