use guestline_core::domain::guest::DecisionStatus;

use crate::dispatcher::ActionRequest;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardrailDecision {
    Allow,
    Deny { reason_code: &'static str, user_message: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuardrailPolicy {
    pub guest_updates_enabled: bool,
}

impl Default for GuardrailPolicy {
    fn default() -> Self {
        Self { guest_updates_enabled: true }
    }
}

impl GuardrailPolicy {
    pub fn new(guest_updates_enabled: bool) -> Self {
        Self { guest_updates_enabled }
    }

    /// Runs after validation and before any upstream call.
    pub fn evaluate(&self, request: &ActionRequest) -> GuardrailDecision {
        match request {
            ActionRequest::GetGuests { .. } | ActionRequest::GetEvent { .. } => {
                GuardrailDecision::Allow
            }
            ActionRequest::UpdateGuestStatus { .. } if !self.guest_updates_enabled => {
                GuardrailDecision::Deny {
                    reason_code: "guest_updates_disabled",
                    user_message: "Changing guest statuses from chat is turned off for this \
                                   organization. Please use the event platform directly."
                        .to_string(),
                }
            }
            ActionRequest::UpdateGuestStatus {
                new_status: DecisionStatus::Approved,
                should_refund: true,
                ..
            } => GuardrailDecision::Deny {
                reason_code: "refund_requires_decline",
                user_message: "Refunds only apply when declining a guest, so I did not approve \
                               anyone. Ask again without the refund."
                    .to_string(),
            },
            ActionRequest::UpdateGuestStatus { .. } => GuardrailDecision::Allow,
        }
    }
}
