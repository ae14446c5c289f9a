//! Access token and session snapshot types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Short-lived bearer credential held in memory.
///
/// `Debug` prints a preview only, so tokens can flow through `tracing`
/// fields without leaking.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the `Authorization` header value.
    #[must_use]
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }

    /// Get a preview of the token (first 8 chars + ...).
    #[must_use]
    pub fn preview(&self) -> String {
        if self.0.chars().count() > 12 {
            let head: String = self.0.chars().take(8).collect();
            format!("{head}...")
        } else {
            "***".to_string()
        }
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken").field(&self.preview()).finish()
    }
}

/// Snapshot of the in-memory session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Current access token, absent when logged out.
    pub access_token: Option<AccessToken>,
}

impl Session {
    /// Derived: a token is held.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.access_token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bearer_header_value() {
        assert_eq!(AccessToken::new("abc").bearer(), "Bearer abc");
    }

    #[test]
    fn test_debug_never_prints_full_token() {
        let token = AccessToken::new("eyJhbGciOiJIUzI1NiJ9.payload.signature");
        let debug = format!("{token:?}");

        assert_eq!(debug, "AccessToken(\"eyJhbGci...\")");
        assert_eq!(format!("{:?}", AccessToken::new("short")), "AccessToken(\"***\")");
    }

    #[test]
    fn test_session_authenticated() {
        assert!(!Session::default().is_authenticated());
        let session = Session {
            access_token: Some(AccessToken::new("t")),
        };
        assert!(session.is_authenticated());
    }
}
