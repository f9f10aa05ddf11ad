//! Action dispatch
//!
//! Turns a raw [`ToolCall`] into a typed [`ActionRequest`], applies the write
//! guardrail, performs exactly one platform call and audits every guest
//! status change attempt.

use std::sync::Arc;

use guestline_core::audit::AuditRecorder;
use guestline_core::domain::event::{EventDetail, EventId};
use guestline_core::domain::guest::{is_plausible_email, DecisionStatus, Guest, GuestStatus};
use guestline_core::platform::{EventPlatform, GuestStatusUpdate, PlatformError, PlatformErrorKind};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::{info, warn};

use crate::guardrails::{GuardrailDecision, GuardrailPolicy};
use crate::intent::ToolCall;
use crate::scope::TurnScope;
use crate::tools::ToolName;

pub const UPDATE_GUEST_STATUS_ACTION: &str = "update_guest_status";

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("unknown action requested: `{0}`")]
    UnknownAction(String),
    #[error("`{tool}` needs the `{field}` parameter")]
    MissingParameter { tool: ToolName, field: &'static str },
    #[error("`{tool}` got an invalid `{field}`: {reason}")]
    InvalidParameter { tool: ToolName, field: &'static str, reason: String },
}

impl ValidationError {
    pub fn user_message(&self) -> String {
        match self {
            Self::UnknownAction(_) => {
                "Sorry, an unknown action was requested, so I did nothing.".to_string()
            }
            Self::MissingParameter { field, .. } => {
                let label = field_label(field);
                format!("I need the {label} to do that. Please include it and try again.")
            }
            Self::InvalidParameter { field, reason, .. } => {
                format!("The {} doesn't look right: {reason}.", field_label(field))
            }
        }
    }
}

fn field_label(field: &str) -> &'static str {
    match field {
        "event_id" => "event",
        "guest_email" => "guest's email address",
        "new_status" => "new status (approved or declined)",
        "status_filter" => "status filter",
        "should_refund" => "refund flag",
        _ => "request details",
    }
}

/// A validated instruction. Execution is an exhaustive match over this enum.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    GetGuests { event_id: EventId, status_filter: Option<GuestStatus> },
    GetEvent { event_id: EventId },
    UpdateGuestStatus {
        event_id: EventId,
        guest_email: String,
        new_status: DecisionStatus,
        should_refund: bool,
    },
}

impl ActionRequest {
    pub fn from_tool_call(call: &ToolCall) -> Result<Self, ValidationError> {
        let tool = ToolName::parse(&call.tool)
            .ok_or_else(|| ValidationError::UnknownAction(call.tool.clone()))?;
        let params = Params { tool, call };

        match tool {
            ToolName::GetGuests => {
                let event_id = params.event_id()?;
                let status_filter = match params.optional("status_filter") {
                    None => None,
                    Some(raw) => {
                        let status = GuestStatus::parse(raw);
                        if !status.is_filterable() {
                            return Err(params.invalid(
                                "status_filter",
                                format!("`{raw}` is not a guest status"),
                            ));
                        }
                        Some(status)
                    }
                };
                Ok(Self::GetGuests { event_id, status_filter })
            }
            ToolName::GetEvent => Ok(Self::GetEvent { event_id: params.event_id()? }),
            ToolName::UpdateGuestStatus => {
                let event_id = params.event_id()?;
                let guest_email = params.required("guest_email")?;
                if !is_plausible_email(guest_email) {
                    return Err(params.invalid(
                        "guest_email",
                        format!("`{guest_email}` is not an email address"),
                    ));
                }
                let raw_status = params.required("new_status")?;
                let new_status = DecisionStatus::parse(raw_status).ok_or_else(|| {
                    params.invalid(
                        "new_status",
                        format!("`{raw_status}` must be approved or declined"),
                    )
                })?;
                let should_refund = match params.optional("should_refund") {
                    None => false,
                    Some(raw) => parse_flag(raw).ok_or_else(|| {
                        params.invalid("should_refund", format!("`{raw}` is not true or false"))
                    })?,
                };
                Ok(Self::UpdateGuestStatus {
                    event_id,
                    guest_email: guest_email.to_string(),
                    new_status,
                    should_refund,
                })
            }
        }
    }

    pub fn tool_name(&self) -> ToolName {
        match self {
            Self::GetGuests { .. } => ToolName::GetGuests,
            Self::GetEvent { .. } => ToolName::GetEvent,
            Self::UpdateGuestStatus { .. } => ToolName::UpdateGuestStatus,
        }
    }

    pub fn event_id(&self) -> &EventId {
        match self {
            Self::GetGuests { event_id, .. }
            | Self::GetEvent { event_id }
            | Self::UpdateGuestStatus { event_id, .. } => event_id,
        }
    }

    /// Short description handed to the response formatter.
    pub fn describe(&self) -> String {
        match self {
            Self::GetGuests { event_id, status_filter: Some(status) } => {
                format!("guests of event {event_id} with status {status}")
            }
            Self::GetGuests { event_id, status_filter: None } => {
                format!("all guests of event {event_id}")
            }
            Self::GetEvent { event_id } => format!("details of event {event_id}"),
            Self::UpdateGuestStatus { event_id, guest_email, new_status, should_refund } => {
                let refund = if *should_refund { " with refund" } else { "" };
                format!("set {guest_email} to {new_status}{refund} for event {event_id}")
            }
        }
    }
}

struct Params<'a> {
    tool: ToolName,
    call: &'a ToolCall,
}

impl<'a> Params<'a> {
    fn optional(&self, field: &str) -> Option<&'a str> {
        self.call.params.get(field).map(|value| value.trim()).filter(|value| !value.is_empty())
    }

    fn required(&self, field: &'static str) -> Result<&'a str, ValidationError> {
        self.optional(field)
            .ok_or(ValidationError::MissingParameter { tool: self.tool, field })
    }

    fn event_id(&self) -> Result<EventId, ValidationError> {
        self.required("event_id").map(|id| EventId(id.to_string()))
    }

    fn invalid(&self, field: &'static str, reason: String) -> ValidationError {
        ValidationError::InvalidParameter { tool: self.tool, field, reason }
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ActionOutcome {
    Guests {
        event_id: EventId,
        status_filter: Option<GuestStatus>,
        guests: Vec<Guest>,
        has_more: bool,
    },
    Event(EventDetail),
    GuestStatusUpdated { event_id: EventId, guest_email: String, new_status: DecisionStatus },
}

/// Upstream failure wrapped with the operation and its target.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{operation} failed for {target_id}: {message}")]
pub struct ActionError {
    pub operation: ToolName,
    pub target_id: String,
    pub kind: PlatformErrorKind,
    pub message: String,
}

impl ActionError {
    fn from_platform(operation: ToolName, target_id: impl Into<String>, error: PlatformError) -> Self {
        Self {
            operation,
            target_id: target_id.into(),
            kind: error.kind(),
            message: error.to_string(),
        }
    }

    pub fn user_message(&self) -> String {
        match self.kind {
            PlatformErrorKind::Authentication => format!(
                "The event platform rejected our credentials while running {}. \
                 Ask an admin to check the platform API key.",
                self.operation
            ),
            PlatformErrorKind::NotFound => {
                format!("The event platform could not find {}.", self.target_id)
            }
            PlatformErrorKind::Other => format!(
                "The event platform failed while running {} for {}. Please try again.",
                self.operation, self.target_id
            ),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("refused by guardrail: {reason_code}")]
    Refused { reason_code: &'static str, user_message: String },
    #[error(transparent)]
    Upstream(#[from] ActionError),
}

impl DispatchError {
    pub fn user_message(&self) -> String {
        match self {
            Self::Invalid(error) => error.user_message(),
            Self::Refused { user_message, .. } => user_message.clone(),
            Self::Upstream(error) => error.user_message(),
        }
    }

    pub fn class(&self) -> &'static str {
        match self {
            Self::Invalid(ValidationError::UnknownAction(_)) => "unknown_action",
            Self::Invalid(_) => "validation",
            Self::Refused { .. } => "refused",
            Self::Upstream(_) => "upstream",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Dispatched {
    pub request: ActionRequest,
    pub outcome: ActionOutcome,
}

pub struct ActionDispatcher {
    platform: Arc<dyn EventPlatform>,
    audit: AuditRecorder,
    guardrails: GuardrailPolicy,
}

impl ActionDispatcher {
    pub fn new(
        platform: Arc<dyn EventPlatform>,
        audit: AuditRecorder,
        guardrails: GuardrailPolicy,
    ) -> Self {
        Self { platform, audit, guardrails }
    }

    pub async fn dispatch(
        &self,
        call: &ToolCall,
        scope: &TurnScope,
    ) -> Result<Dispatched, DispatchError> {
        let request = match ActionRequest::from_tool_call(call) {
            Ok(request) => request,
            Err(error) => {
                warn!(
                    event_name = "agent.dispatch.invalid",
                    correlation_id = %scope.correlation_id,
                    tool = %call.tool,
                    error = %error,
                    "tool call rejected by validation"
                );
                return Err(error.into());
            }
        };

        if let GuardrailDecision::Deny { reason_code, user_message } =
            self.guardrails.evaluate(&request)
        {
            warn!(
                event_name = "agent.dispatch.refused",
                correlation_id = %scope.correlation_id,
                tool = %request.tool_name(),
                reason_code,
                "tool call refused by guardrail"
            );
            return Err(DispatchError::Refused { reason_code, user_message });
        }

        let result = self.execute(&request, scope).await;
        match &result {
            Ok(_) => info!(
                event_name = "agent.dispatch.completed",
                correlation_id = %scope.correlation_id,
                tool = %request.tool_name(),
                event_id = %request.event_id(),
                "tool call executed"
            ),
            Err(error) => warn!(
                event_name = "agent.dispatch.failed",
                correlation_id = %scope.correlation_id,
                tool = %request.tool_name(),
                event_id = %request.event_id(),
                error_kind = ?error.kind,
                error = %error,
                "tool call failed upstream"
            ),
        }

        let outcome = result?;
        Ok(Dispatched { request, outcome })
    }

    async fn execute(
        &self,
        request: &ActionRequest,
        scope: &TurnScope,
    ) -> Result<ActionOutcome, ActionError> {
        let operation = request.tool_name();
        match request {
            ActionRequest::GetGuests { event_id, status_filter } => {
                let page = self
                    .platform
                    .get_guests(event_id, status_filter.as_ref())
                    .await
                    .map_err(|error| ActionError::from_platform(operation, event_id.as_str(), error))?;
                Ok(ActionOutcome::Guests {
                    event_id: event_id.clone(),
                    status_filter: status_filter.clone(),
                    guests: page.guests,
                    has_more: page.has_more,
                })
            }
            ActionRequest::GetEvent { event_id } => self
                .platform
                .get_event(event_id)
                .await
                .map(ActionOutcome::Event)
                .map_err(|error| ActionError::from_platform(operation, event_id.as_str(), error)),
            ActionRequest::UpdateGuestStatus { event_id, guest_email, new_status, should_refund } => {
                let update = GuestStatusUpdate {
                    event_id: event_id.clone(),
                    guest_email: guest_email.clone(),
                    status: *new_status,
                    should_refund: *should_refund,
                };
                let result = self
                    .platform
                    .update_guest_status(&update)
                    .await
                    .map_err(|error| {
                        ActionError::from_platform(
                            operation,
                            format!("guest {guest_email} of event {event_id}"),
                            error,
                        )
                    });
                self.audit_update(&update, scope, result.as_ref().err()).await;
                result?;
                Ok(ActionOutcome::GuestStatusUpdated {
                    event_id: event_id.clone(),
                    guest_email: guest_email.clone(),
                    new_status: *new_status,
                })
            }
        }
    }

    async fn audit_update(
        &self,
        update: &GuestStatusUpdate,
        scope: &TurnScope,
        error: Option<&ActionError>,
    ) {
        let mut details = json!({
            "event_id": update.event_id,
            "guest_email": update.guest_email,
            "new_status": update.status,
            "should_refund": update.should_refund,
            "correlation_id": scope.correlation_id,
        });
        if let Some(error) = error {
            details["error"] = json!(error.message);
            details["error_kind"] = json!(error.kind);
        }
        self.audit
            .record(
                UPDATE_GUEST_STATUS_ACTION,
                &scope.org_id,
                scope.actor(),
                error.is_none(),
                details,
            )
            .await;
    }
}
