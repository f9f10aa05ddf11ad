//! Prompt templates for the three model calls of a turn.

use tera::{Context, Tera};
use thiserror::Error;

use crate::tools::tool_catalogue;

/// What the assistant can and cannot do. Embedded verbatim in the intent prompt.
pub const CAPABILITIES: &str = "\
You can:
- answer questions about the organizer's events using the known events list
- list the guests of one event, optionally filtered by approval status
- show the full details of one event
- approve or decline a single guest for one event, optionally refunding a declined guest

You must refuse to:
- create, edit, cancel or delete events
- message, email or invite guests
- change ticket prices, capacity or any status other than approved or declined
- act on an event that is not in the known events list
- act on more than one guest per request";

const INTENT_TEMPLATE: &str = r#"You are Guestline, an assistant for people who organize events and manage their guest lists.

{{ capabilities }}

Known events:
{% if event_lines | length > 0 %}{% for line in event_lines %}- {{ line }}
{% endfor %}{% else %}(no known events)
{% endif %}{% if grounding_note %}Note: {{ grounding_note }}
{% endif %}
Tools:
{{ tool_catalogue }}

Answer with exactly one of:
1. A single JSON object {"action": "TOOL_CALL", "tool": "<tool name>", "params": {"<name>": "<value>"}} when a tool is needed. All parameter values are strings or booleans.
2. A single JSON object {"action": "CLARIFY", "prompt": "<question>"} when something required is missing.
3. Otherwise, a short plain-text answer with no JSON at all.
Never invent event ids. Never describe a tool call in prose instead of emitting it.

User message:
{{ user_text }}
"#;

const FORMAT_TEMPLATE: &str = r#"Turn the data below into a short chat reply for an event organizer.

The organizer asked for: {{ request }}

Rules:
- Start with the number of items, then one line per item.
- For guests show name, email and status. For events show name, id and time.
- If there are no items, say plainly that none were found.
- If the data says more results exist, say so.
- Keep every event id and email exactly as given. Do not add facts.

Data:
{{ data }}
"#;

const TONE_TEMPLATE: &str = r#"Rewrite the message below for a chat app.
Make it concise and friendly, drop decorative formatting such as bold or headings, keep every link, id, email and number exactly as written, and do not add any new information.
Reply with the rewritten message only.

Message:
{{ draft }}
"#;

#[derive(Debug, Error)]
#[error("prompt rendering failed: {0}")]
pub struct PromptError(#[from] tera::Error);

/// Compiled prompt templates, shared read-only across turns.
pub struct Prompts {
    tera: Tera,
}

impl Prompts {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            ("intent.txt", INTENT_TEMPLATE),
            ("format.txt", FORMAT_TEMPLATE),
            ("tone.txt", TONE_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    pub fn intent(
        &self,
        user_text: &str,
        event_lines: &[String],
        grounding_note: Option<&str>,
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("capabilities", CAPABILITIES);
        context.insert("tool_catalogue", &tool_catalogue());
        context.insert("event_lines", event_lines);
        context.insert("grounding_note", &grounding_note);
        context.insert("user_text", user_text);
        Ok(self.tera.render("intent.txt", &context)?)
    }

    pub fn format(&self, request: &str, data: &str) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("request", request);
        context.insert("data", data);
        Ok(self.tera.render("format.txt", &context)?)
    }

    pub fn tone(&self, draft: &str) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("draft", draft);
        Ok(self.tera.render("tone.txt", &context)?)
    }
}
