use thiserror::Error;

/// A failure as the chat user sees it. The message stays in the logs; only
/// [`InterfaceError::user_message`] is ever sent.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn internal(message: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), correlation_id: correlation_id.into() }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::ServiceUnavailable { .. } => {
                "Sorry, a service I depend on is unavailable right now. Please retry shortly."
            }
            Self::Internal { .. } => {
                "Sorry, something went wrong while handling your message. Please try again."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::ServiceUnavailable { correlation_id, .. }
            | Self::Internal { correlation_id, .. } => correlation_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::InterfaceError;

    #[test]
    fn internal_errors_hide_their_cause() {
        let error = InterfaceError::internal("sqlite busy", "update-7");

        assert_eq!(error.correlation_id(), "update-7");
        assert!(error.to_string().contains("sqlite busy"));
        assert!(!error.user_message().contains("sqlite"));
        assert_eq!(
            error.user_message(),
            "Sorry, something went wrong while handling your message. Please try again."
        );
    }

    #[test]
    fn unavailable_upstreams_get_a_retry_hint() {
        let unavailable = InterfaceError::ServiceUnavailable {
            message: "command service failed: 502 bad gateway".to_owned(),
            correlation_id: "update-8".to_owned(),
        };

        assert_eq!(unavailable.correlation_id(), "update-8");
        assert!(unavailable.user_message().contains("unavailable"));
        assert!(!unavailable.user_message().contains("502"));
    }
}
