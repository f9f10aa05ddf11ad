use guestline_core::errors::InterfaceError;
use guestline_core::markup::escape_markdown_v2;

pub const PARSE_MODE: &str = "MarkdownV2";

/// Plain reply text. Escaping happens only in [`Reply::render`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
}

impl Reply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn apology(error: &InterfaceError) -> Self {
        Self::new(error.user_message())
    }

    pub fn render(&self) -> RenderedReply {
        RenderedReply { text: escape_markdown_v2(&self.text), parse_mode: PARSE_MODE }
    }
}

/// Wire-ready text for `sendMessage`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedReply {
    pub text: String,
    pub parse_mode: &'static str,
}
