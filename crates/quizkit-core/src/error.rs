//! Client error types.
//!
//! Every failure surfaced by the gateway or the session engine is a
//! `QuizError`. The variants follow the classifier's taxonomy so callers can
//! branch on kind without string matching.

use thiserror::Error;

use crate::classify::ErrorType;
use crate::model::SessionStatus;

pub type Result<T, E = QuizError> = std::result::Result<T, E>;

/// Errors surfaced to callers of the quiz client.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QuizError {
    /// No response was received (connect failure, timeout, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The server answered but the envelope code was not 200, or the HTTP
    /// status is one without a dedicated kind.
    #[error("business error ({code}): {message}")]
    Business { code: i64, message: String },

    /// Caller input was rejected before or by the server (HTTP 400).
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication or authorization failed (HTTP 401/403).
    #[error("permission denied (HTTP {status}): {message}")]
    Permission { status: u16, message: String },

    /// The server failed (HTTP 5xx).
    #[error("system error (HTTP {status}): {message}")]
    System { status: u16, message: String },

    /// The operation is not valid in the session's current state.
    #[error("cannot {action} while session is {state}")]
    InvalidState {
        state: SessionStatus,
        action: &'static str,
    },

    /// A response arrived for a session that is no longer active.
    #[error("session {session_id} is no longer active")]
    StaleSession { session_id: String },
}

impl QuizError {
    pub fn validation(message: impl Into<String>) -> Self {
        QuizError::Validation(message.into())
    }

    pub fn invalid_state(state: SessionStatus, action: &'static str) -> Self {
        QuizError::InvalidState { state, action }
    }

    /// The classifier type this error belongs to.
    pub fn kind(&self) -> ErrorType {
        match self {
            QuizError::Network(_) => ErrorType::Network,
            QuizError::Business { .. } => ErrorType::Business,
            QuizError::Validation(_) | QuizError::InvalidState { .. } => ErrorType::Validation,
            QuizError::Permission { .. } => ErrorType::Permission,
            QuizError::System { .. } => ErrorType::System,
            QuizError::StaleSession { .. } => ErrorType::Business,
        }
    }

    /// Only transport failures are worth retrying, and only for reads.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuizError::Network(_))
    }

    /// True for a 401, which ends the current login.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, QuizError::Permission { status: 401, .. })
    }

    /// Numeric code carried by the error, if any.
    pub fn code(&self) -> Option<i64> {
        match self {
            QuizError::Business { code, .. } => Some(*code),
            QuizError::Permission { status, .. } | QuizError::System { status, .. } => {
                Some(i64::from(*status))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_retryable() {
        assert!(QuizError::Network("reset".into()).is_retryable());
        assert!(!QuizError::System {
            status: 503,
            message: "down".into()
        }
        .is_retryable());
        assert!(!QuizError::validation("empty").is_retryable());
    }

    #[test]
    fn kind_and_code() {
        let err = QuizError::Permission {
            status: 401,
            message: "expired".into(),
        };
        assert_eq!(err.kind(), ErrorType::Permission);
        assert_eq!(err.code(), Some(401));
        assert!(err.is_unauthorized());

        let err = QuizError::Business {
            code: 4001,
            message: "bank closed".into(),
        };
        assert_eq!(err.kind(), ErrorType::Business);
        assert_eq!(err.code(), Some(4001));
        assert!(!err.is_unauthorized());
    }

    #[test]
    fn invalid_state_message() {
        let err = QuizError::invalid_state(SessionStatus::Completed, "stage an answer");
        assert_eq!(
            err.to_string(),
            "cannot stage an answer while session is completed"
        );
    }
}
