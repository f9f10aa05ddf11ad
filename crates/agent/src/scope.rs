use guestline_core::audit::AuditActor;
use uuid::Uuid;

/// Where a turn came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Direct { user_id: String },
    Group { chat_id: String },
}

/// Per-turn context passed through the whole pipeline. Nothing about a
/// conversation outlives it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TurnScope {
    pub org_id: String,
    pub chat: ChatKind,
    pub correlation_id: String,
}

impl TurnScope {
    pub fn direct(org_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(org_id, ChatKind::Direct { user_id: user_id.into() })
    }

    pub fn group(org_id: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self::new(org_id, ChatKind::Group { chat_id: chat_id.into() })
    }

    fn new(org_id: impl Into<String>, chat: ChatKind) -> Self {
        Self { org_id: org_id.into(), chat, correlation_id: Uuid::new_v4().to_string() }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = correlation_id.into();
        self
    }

    /// Direct chats attribute to the user, shared chats to the group.
    pub fn actor(&self) -> AuditActor {
        match &self.chat {
            ChatKind::Direct { user_id } => AuditActor::User(user_id.clone()),
            ChatKind::Group { chat_id } => AuditActor::Group(chat_id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use guestline_core::audit::AuditActor;

    use super::TurnScope;

    #[test]
    fn actor_follows_chat_kind() {
        let direct = TurnScope::direct("org-1", "42");
        assert_eq!(direct.actor(), AuditActor::User("42".to_string()));

        let group = TurnScope::group("org-1", "-100200").with_correlation_id("turn-9");
        assert_eq!(group.actor(), AuditActor::Group("-100200".to_string()));
        assert_eq!(group.correlation_id, "turn-9");
    }

    #[test]
    fn each_scope_gets_its_own_correlation_id() {
        let first = TurnScope::direct("org-1", "1");
        let second = TurnScope::direct("org-1", "1");
        assert_ne!(first.correlation_id, second.correlation_id);
    }
}
