//! Application error types

use elim_domain::error_codes::{
    codes, default_message_for_status, message_for_code,
};
use elim_domain::{AuthEndpoint, StatusCode};
use thiserror::Error;

use crate::auth::SessionEndReason;
use crate::ports::TransportError;

/// Why a refresh attempt did not produce a token.
///
/// Every waiter of a refresh ticket receives a clone of the same value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefreshFailure {
    /// The refresh endpoint answered with a failure.
    #[error("refresh rejected with status {status}")]
    Rejected {
        /// HTTP status.
        status: StatusCode,
        /// Backend code, when the body carried one.
        code: Option<i64>,
        /// Backend message, when the body carried one.
        message: Option<String>,
    },

    /// No response was received.
    #[error("refresh transport failure: {0}")]
    Transport(#[from] TransportError),

    /// The response was 2xx but carried no usable token.
    #[error("malformed refresh response: {0}")]
    MalformedResponse(String),

    /// The refresh call exceeded the transport timeout.
    #[error("refresh timed out after {timeout_ms}ms")]
    TimedOut {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The session was ended before or while the refresh ran.
    #[error("session ended before the refresh completed")]
    SessionEnded,

    /// The refresh task stopped without reporting an outcome.
    #[error("refresh task ended without an outcome")]
    Abandoned,
}

impl RefreshFailure {
    /// Backend code when the refresh endpoint sent one.
    #[must_use]
    pub const fn code(&self) -> Option<i64> {
        match self {
            Self::Rejected { code, .. } => *code,
            Self::Transport(_) | Self::TimedOut { .. } => Some(codes::NETWORK_ERROR),
            Self::MalformedResponse(_) => Some(codes::INVALID_RESPONSE),
            Self::SessionEnded | Self::Abandoned => None,
        }
    }
}

/// Errors surfaced to code that sends requests through the session core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    /// No response was received.
    #[error("network error: {0}")]
    Network(#[from] TransportError),

    /// A login, logout, refresh or "who am I" call failed.
    ///
    /// Never triggers a refresh.
    #[error("{} endpoint failed with status {status}", endpoint.as_str())]
    AuthEndpoint {
        /// Which auth endpoint.
        endpoint: AuthEndpoint,
        /// HTTP status.
        status: StatusCode,
        /// Backend code.
        code: Option<i64>,
        /// Backend message.
        message: Option<String>,
    },

    /// A protected call got 401 and the session could not be recovered.
    #[error("session expired: {reason}")]
    SessionExpired {
        /// What ended the session.
        reason: SessionEndReason,
    },

    /// Any other non-2xx response.
    #[error("request failed with status {status}")]
    Request {
        /// HTTP status.
        status: StatusCode,
        /// Backend code.
        code: Option<i64>,
        /// Backend message.
        message: Option<String>,
    },

    /// A 2xx response whose body could not be decoded.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// Login succeeded without handing out an access token.
    #[error("login response carried no access token")]
    MissingToken,
}

impl ClientError {
    /// Returns true for `SessionExpired`.
    #[must_use]
    pub const fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired { .. })
    }

    /// HTTP status of the failing response, if there was one.
    #[must_use]
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::AuthEndpoint { status, .. } | Self::Request { status, .. } => Some(*status),
            Self::SessionExpired { .. } => Some(StatusCode::UNAUTHORIZED),
            Self::Network(_) | Self::InvalidResponse(_) | Self::MissingToken => None,
        }
    }

    /// Numeric code for display: backend code, else HTTP status, else a
    /// negative client-side code.
    #[must_use]
    pub fn code(&self) -> i64 {
        match self {
            Self::Network(_) => codes::NETWORK_ERROR,
            Self::AuthEndpoint { status, code, .. } | Self::Request { status, code, .. } => {
                code.unwrap_or_else(|| i64::from(status.as_u16()))
            }
            Self::SessionExpired { reason } => match reason {
                SessionEndReason::RefreshFailed(failure) => {
                    failure.code().unwrap_or(codes::UNAUTHORIZED)
                }
                _ => codes::UNAUTHORIZED,
            },
            Self::InvalidResponse(_) => codes::INVALID_RESPONSE,
            Self::MissingToken => codes::MISSING_TOKEN,
        }
    }

    /// Message suitable for showing to a user.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(message) = message_for_code(self.code()) {
            return message.to_string();
        }
        let backend_message = match self {
            Self::AuthEndpoint { message, .. } | Self::Request { message, .. } => message.clone(),
            _ => None,
        };
        backend_message.unwrap_or_else(|| {
            self.status()
                .map_or("An error occurred.", |s| default_message_for_status(s.as_u16()))
                .to_string()
        })
    }
}

/// Result type alias for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_code_prefers_backend_code() {
        let error = ClientError::Request {
            status: StatusCode::new(400),
            code: Some(codes::VALIDATION_FAILED),
            message: Some("name is required".to_string()),
        };
        assert_eq!(error.code(), codes::VALIDATION_FAILED);
        assert_eq!(error.user_message(), "Please check the information you entered.");
    }

    #[test]
    fn test_unknown_code_falls_back_to_backend_message_then_status() {
        let with_message = ClientError::Request {
            status: StatusCode::new(409),
            code: Some(40901),
            message: Some("duplicate engineer".to_string()),
        };
        assert_eq!(with_message.user_message(), "duplicate engineer");

        let bare = ClientError::Request {
            status: StatusCode::new(404),
            code: None,
            message: None,
        };
        assert_eq!(bare.code(), 404);
        assert_eq!(bare.user_message(), "The requested resource was not found.");
    }

    #[test]
    fn test_session_expired_code_comes_from_refresh_failure() {
        let error = ClientError::SessionExpired {
            reason: SessionEndReason::RefreshFailed(RefreshFailure::Rejected {
                status: StatusCode::UNAUTHORIZED,
                code: Some(codes::REFRESH_TOKEN_EXPIRED),
                message: None,
            }),
        };
        assert!(error.is_session_expired());
        assert_eq!(error.code(), codes::REFRESH_TOKEN_EXPIRED);

        let rejected = ClientError::SessionExpired {
            reason: SessionEndReason::TokenRejected,
        };
        assert_eq!(rejected.code(), codes::UNAUTHORIZED);
    }

    #[test]
    fn test_client_side_codes() {
        assert_eq!(
            ClientError::Network(TransportError::Timeout { timeout_ms: 10 }).code(),
            codes::NETWORK_ERROR
        );
        assert_eq!(ClientError::MissingToken.code(), codes::MISSING_TOKEN);
        assert_eq!(
            ClientError::InvalidResponse("x".to_string()).user_message(),
            "The server response was malformed."
        );
    }
}
