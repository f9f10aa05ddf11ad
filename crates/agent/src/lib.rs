//! Agent Runtime - intent resolution and action dispatch for guest-list chat
//!
//! A single user turn flows through:
//! 1. **Grounding** (`context`) - load the organization's known events
//! 2. **Intent Resolution** (`intent`) - one model call decides between a
//!    direct answer, a single tool call, or a clarification
//! 3. **Reference Resolution** - the mentioned event is matched against the
//!    grounding list before anything is dispatched
//! 4. **Dispatch** (`dispatcher`) - validate, guard, execute, audit
//! 5. **Formatting** (`formatter`, `tone`) - shape the result into a reply
//!
//! The model is a translator only. It never picks an event id that is not in
//! the grounding list and never bypasses parameter validation.

pub mod context;
pub mod dispatcher;
pub mod formatter;
pub mod guardrails;
pub mod intent;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod scope;
pub mod tone;
pub mod tools;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{ActionDispatcher, ActionError, ActionOutcome, ActionRequest, DispatchError};
pub use intent::{IntentDecision, IntentResolver, ToolCall};
pub use llm::{GeminiClient, LlmClient, LlmCompletion, LlmError};
pub use runtime::{AgentRuntime, AgentSettings, ReplyKind, TurnReply};
pub use scope::{ChatKind, TurnScope};
