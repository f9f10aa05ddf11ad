//! Bridges chat handlers to the agent runtime.

use std::sync::Arc;

use async_trait::async_trait;
use guestline_agent::dispatcher::UPDATE_GUEST_STATUS_ACTION;
use guestline_agent::runtime::EVENT_PARAM;
use guestline_agent::tools::ToolName;
use guestline_agent::{AgentRuntime, ToolCall, TurnReply, TurnScope};
use guestline_chat::commands::CommandRouteError;
use guestline_chat::events::{EventHandlerError, MessageEvent};
use guestline_chat::{
    ChatOrigin, ChatType, CommandService, ConversationService, EventContext, Reply,
};
use guestline_core::domain::guest::DecisionStatus;

/// Every chat is served on behalf of the one configured organization.
#[derive(Clone)]
pub struct AgentService {
    runtime: Arc<AgentRuntime>,
    org_id: String,
}

impl AgentService {
    pub fn new(runtime: Arc<AgentRuntime>, org_id: impl Into<String>) -> Self {
        Self { runtime, org_id: org_id.into() }
    }

    fn scope(&self, origin: &ChatOrigin, ctx: &EventContext) -> TurnScope {
        let scope = match origin.chat_type {
            ChatType::Private => {
                let user_id = origin.user_id.unwrap_or(origin.chat_id);
                TurnScope::direct(self.org_id.as_str(), user_id.to_string())
            }
            ChatType::Group => TurnScope::group(self.org_id.as_str(), origin.chat_id.to_string()),
        };
        scope.with_correlation_id(ctx.correlation_id.as_str())
    }
}

fn into_reply(reply: TurnReply) -> Reply {
    Reply::new(reply.text)
}

#[async_trait]
impl CommandService for AgentService {
    async fn list_events(
        &self,
        origin: &ChatOrigin,
        ctx: &EventContext,
    ) -> Result<Reply, CommandRouteError> {
        let scope = self.scope(origin, ctx);
        Ok(into_reply(self.runtime.upcoming_events(&scope).await))
    }

    async fn list_guests(
        &self,
        event: String,
        status: Option<String>,
        origin: &ChatOrigin,
        ctx: &EventContext,
    ) -> Result<Reply, CommandRouteError> {
        let mut call = ToolCall::new(ToolName::GetGuests.as_str()).param(EVENT_PARAM, event);
        if let Some(status) = status {
            call = call.param("status_filter", status);
        }
        let scope = self.scope(origin, ctx);
        Ok(into_reply(self.runtime.handle_tool_call(call, &scope).await))
    }

    async fn set_guest_status(
        &self,
        event: String,
        guest_email: String,
        status: DecisionStatus,
        origin: &ChatOrigin,
        ctx: &EventContext,
    ) -> Result<Reply, CommandRouteError> {
        let call = ToolCall::new(UPDATE_GUEST_STATUS_ACTION)
            .param(EVENT_PARAM, event)
            .param("guest_email", guest_email)
            .param("new_status", status.as_str());
        let scope = self.scope(origin, ctx);
        Ok(into_reply(self.runtime.handle_tool_call(call, &scope).await))
    }
}

#[async_trait]
impl ConversationService for AgentService {
    async fn handle_message(
        &self,
        event: &MessageEvent,
        ctx: &EventContext,
    ) -> Result<Option<Reply>, EventHandlerError> {
        let scope = self.scope(&event.origin, ctx);
        Ok(Some(into_reply(self.runtime.handle_message(&event.text, &scope).await)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use guestline_agent::llm::{LlmClient, LlmCompletion, LlmError, LlmRequest};
    use guestline_agent::{AgentRuntime, AgentSettings, ChatKind};
    use guestline_chat::commands::CommandPayload;
    use guestline_chat::events::HandlerResult;
    use guestline_chat::{build_dispatcher, ChatEnvelope, ChatEvent, ChatOrigin, EventContext};
    use guestline_core::audit::AuditRecorder;
    use guestline_core::domain::event::{EventDetail, EventId, EventRef};
    use guestline_core::domain::guest::{Guest, GuestStatus};
    use guestline_core::platform::{
        EventPage, EventPlatform, GuestPage, GuestStatusUpdate, PlatformError,
    };
    use guestline_core::testing::InMemoryAuditStore;

    use super::AgentService;

    /// The model is never reachable, so replies use the deterministic fallback.
    struct OfflineLlm;

    #[async_trait]
    impl LlmClient for OfflineLlm {
        async fn generate(&self, _request: &LlmRequest) -> Result<LlmCompletion, LlmError> {
            Err(LlmError::InvalidResponse("offline".to_string()))
        }
    }

    #[derive(Default)]
    struct StubPlatform {
        updates: Mutex<Vec<GuestStatusUpdate>>,
        guest_filters: Mutex<Vec<Option<GuestStatus>>>,
    }

    #[async_trait]
    impl EventPlatform for StubPlatform {
        async fn list_events(&self, _cursor: Option<&str>) -> Result<EventPage, PlatformError> {
            Ok(EventPage {
                events: vec![
                    EventRef::new("evt-1", "ETHDenver"),
                    EventRef::new("evt-2", "ETH Summit"),
                    EventRef::new("evt-3", "ETH Summit"),
                ],
                next_cursor: None,
            })
        }

        async fn get_event(&self, event_id: &EventId) -> Result<EventDetail, PlatformError> {
            Err(PlatformError::NotFound(event_id.to_string()))
        }

        async fn get_guests(
            &self,
            _event_id: &EventId,
            status_filter: Option<&GuestStatus>,
        ) -> Result<GuestPage, PlatformError> {
            if let Ok(mut filters) = self.guest_filters.lock() {
                filters.push(status_filter.cloned());
            }
            Ok(GuestPage {
                guests: vec![Guest {
                    email: "jane@x.com".to_string(),
                    name: Some("Jane Doe".to_string()),
                    status: GuestStatus::Approved,
                    registered_at: None,
                }],
                has_more: false,
            })
        }

        async fn update_guest_status(
            &self,
            update: &GuestStatusUpdate,
        ) -> Result<(), PlatformError> {
            if let Ok(mut updates) = self.updates.lock() {
                updates.push(update.clone());
            }
            Ok(())
        }
    }

    struct Fixture {
        service: AgentService,
        platform: Arc<StubPlatform>,
        audit: Arc<InMemoryAuditStore>,
    }

    fn fixture() -> Fixture {
        let platform = Arc::new(StubPlatform::default());
        let audit = Arc::new(InMemoryAuditStore::default());
        let runtime = AgentRuntime::new(
            Arc::new(OfflineLlm),
            platform.clone(),
            AuditRecorder::new(audit.clone()),
            AgentSettings::default(),
        )
        .expect("runtime");
        Fixture { service: AgentService::new(Arc::new(runtime), "org-1"), platform, audit }
    }

    fn command(origin: ChatOrigin, name: &str, args: &str) -> ChatEnvelope {
        ChatEnvelope {
            update_id: 9,
            event: ChatEvent::Command(CommandPayload {
                origin,
                name: name.to_string(),
                args: args.to_string(),
            }),
        }
    }

    fn ctx() -> EventContext {
        EventContext { correlation_id: "update-9".to_string() }
    }

    #[test]
    fn private_chats_scope_to_the_user_and_groups_to_the_chat() {
        let service = fixture().service;

        let direct = service.scope(&ChatOrigin::private(42), &ctx());
        assert_eq!(direct.chat, ChatKind::Direct { user_id: "42".to_string() });
        assert_eq!(direct.correlation_id, "update-9");
        assert_eq!(direct.org_id, "org-1");

        let group = service.scope(&ChatOrigin::group(-100, Some(7)), &ctx());
        assert_eq!(group.chat, ChatKind::Group { chat_id: "-100".to_string() });
    }

    #[tokio::test]
    async fn approve_command_updates_and_audits_as_the_group() {
        let fixture = fixture();
        let dispatcher = build_dispatcher(fixture.service.clone(), fixture.service.clone());

        let envelope =
            command(ChatOrigin::group(-100, Some(7)), "approve", "ETHDenver jane@x.com");
        let result = dispatcher.dispatch(&envelope, &ctx()).await.expect("dispatch");

        let HandlerResult::Responded(reply) = result else {
            panic!("expected a reply");
        };
        assert_eq!(reply.text, "Guest jane@x.com is now approved for event evt-1.");

        let updates = fixture.platform.updates.lock().expect("updates").clone();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].event_id, EventId("evt-1".to_string()));

        let entries = fixture.audit.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].success);
        assert_eq!(entries[0].actor.group_id(), Some("-100"));
    }

    #[tokio::test]
    async fn ambiguous_command_asks_instead_of_updating() {
        let fixture = fixture();
        let dispatcher = build_dispatcher(fixture.service.clone(), fixture.service.clone());

        let envelope = command(ChatOrigin::private(42), "decline", "ETH Summit jane@x.com");
        let result = dispatcher.dispatch(&envelope, &ctx()).await.expect("dispatch");

        let HandlerResult::Responded(reply) = result else {
            panic!("expected a reply");
        };
        assert!(reply.text.contains("evt-2"));
        assert!(reply.text.contains("evt-3"));
        assert!(fixture.platform.updates.lock().expect("updates").is_empty());
        assert!(fixture.audit.entries().is_empty());
    }

    #[tokio::test]
    async fn guests_command_passes_the_status_filter() {
        let fixture = fixture();
        let dispatcher = build_dispatcher(fixture.service.clone(), fixture.service.clone());

        let result = dispatcher
            .dispatch(&command(ChatOrigin::private(42), "guests", "evt-1 approved"), &ctx())
            .await
            .expect("dispatch");

        let HandlerResult::Responded(reply) = result else {
            panic!("expected a reply");
        };
        assert!(reply.text.contains("evt-1"));
        assert!(reply.text.contains("Jane Doe <jane@x.com> - approved"));
        let filters = fixture.platform.guest_filters.lock().expect("filters").clone();
        assert_eq!(filters, vec![Some(GuestStatus::Approved)]);
    }
}
