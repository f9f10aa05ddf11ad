/// The closed set of actions the assistant may perform on the event platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ToolName {
    GetGuests,
    GetEvent,
    UpdateGuestStatus,
}

impl ToolName {
    pub const ALL: [ToolName; 3] = [Self::GetGuests, Self::GetEvent, Self::UpdateGuestStatus];

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "get_guests" => Some(Self::GetGuests),
            "get_event" => Some(Self::GetEvent),
            "update_guest_status" => Some(Self::UpdateGuestStatus),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetGuests => "get_guests",
            Self::GetEvent => "get_event",
            Self::UpdateGuestStatus => "update_guest_status",
        }
    }

    pub fn is_state_changing(&self) -> bool {
        matches!(self, Self::UpdateGuestStatus)
    }

    fn catalogue_entry(&self) -> ToolSpec {
        match self {
            Self::GetGuests => ToolSpec {
                name: self.as_str(),
                params: &[
                    ("event_id", true, "id of the event, taken from the known events list"),
                    (
                        "status_filter",
                        false,
                        "one of approved, declined, pending_approval, invited, waitlist",
                    ),
                ],
                description: "List the guests registered for an event, optionally by status.",
            },
            Self::GetEvent => ToolSpec {
                name: self.as_str(),
                params: &[("event_id", true, "id of the event, taken from the known events list")],
                description: "Fetch the full details of one event: time, location, link.",
            },
            Self::UpdateGuestStatus => ToolSpec {
                name: self.as_str(),
                params: &[
                    ("event_id", true, "id of the event, taken from the known events list"),
                    ("guest_email", true, "email address of the guest"),
                    ("new_status", true, "approved or declined"),
                    ("should_refund", false, "true to refund a paid ticket when declining"),
                ],
                description: "Approve or decline one guest for an event.",
            },
        }
    }
}

impl std::fmt::Display for ToolName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

struct ToolSpec {
    name: &'static str,
    params: &'static [(&'static str, bool, &'static str)],
    description: &'static str,
}

/// Tool catalogue as embedded in the intent prompt.
pub fn tool_catalogue() -> String {
    let mut lines = Vec::new();
    for tool in ToolName::ALL {
        let spec = tool.catalogue_entry();
        lines.push(format!("- {}: {}", spec.name, spec.description));
        for (param, required, hint) in spec.params {
            let requirement = if *required { "required" } else { "optional" };
            lines.push(format!("    - {param} ({requirement}): {hint}"));
        }
    }
    lines.push(
        "If you only know the event by name, pass it as \"event_name\" instead of \"event_id\"."
            .to_string(),
    );
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::{tool_catalogue, ToolName};

    #[test]
    fn parse_is_case_insensitive_and_closed() {
        assert_eq!(ToolName::parse("GET_GUESTS"), Some(ToolName::GetGuests));
        assert_eq!(ToolName::parse(" update_guest_status "), Some(ToolName::UpdateGuestStatus));
        assert_eq!(ToolName::parse("delete_event"), None);
        assert_eq!(ToolName::parse(""), None);
    }

    #[test]
    fn only_status_update_changes_state() {
        let changing = ToolName::ALL.iter().filter(|tool| tool.is_state_changing()).count();
        assert_eq!(changing, 1);
    }

    #[test]
    fn catalogue_lists_every_tool_and_required_params() {
        let catalogue = tool_catalogue();
        for tool in ToolName::ALL {
            assert!(catalogue.contains(tool.as_str()), "missing {tool}");
        }
        assert!(catalogue.contains("guest_email (required)"));
        assert!(catalogue.contains("should_refund (optional)"));
    }
}
