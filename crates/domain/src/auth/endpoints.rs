//! Endpoints exempt from the 401 refresh-and-retry policy.

use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// One of the authentication endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthEndpoint {
    /// Exchanges credentials for an access token.
    Login,
    /// Drops the server-side refresh token.
    Logout,
    /// Mints a new access token from the refresh-token cookie.
    Refresh,
    /// Describes the logged-in user.
    Me,
}

impl AuthEndpoint {
    /// Returns the endpoint name for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Refresh => "refresh",
            Self::Me => "me",
        }
    }
}

/// The fixed set of authentication endpoint paths.
///
/// Failures on these paths are always surfaced to the caller and never
/// trigger a refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthEndpointSet {
    /// Login path.
    pub login_path: String,
    /// Logout path.
    pub logout_path: String,
    /// Refresh path.
    pub refresh_path: String,
    /// "Who am I" path.
    pub me_path: String,
}

impl Default for AuthEndpointSet {
    fn default() -> Self {
        Self {
            login_path: "/auth/login".to_string(),
            logout_path: "/auth/logout".to_string(),
            refresh_path: "/auth/refresh".to_string(),
            me_path: "/auth/me".to_string(),
        }
    }
}

impl AuthEndpointSet {
    /// Creates a set, rejecting paths that are empty or not rooted.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidEndpointPath` for the first bad path.
    pub fn new(
        login_path: impl Into<String>,
        logout_path: impl Into<String>,
        refresh_path: impl Into<String>,
        me_path: impl Into<String>,
    ) -> DomainResult<Self> {
        let set = Self {
            login_path: login_path.into(),
            logout_path: logout_path.into(),
            refresh_path: refresh_path.into(),
            me_path: me_path.into(),
        };
        set.validate()?;
        Ok(set)
    }

    /// Checks every path is non-empty and starts with `/`.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidEndpointPath` for the first bad path.
    pub fn validate(&self) -> DomainResult<()> {
        for path in [
            &self.login_path,
            &self.logout_path,
            &self.refresh_path,
            &self.me_path,
        ] {
            if path.trim_end_matches('/').is_empty() || !path.starts_with('/') {
                return Err(DomainError::InvalidEndpointPath(path.clone()));
            }
        }
        Ok(())
    }

    /// Returns the configured path of an endpoint.
    #[must_use]
    pub fn path(&self, endpoint: AuthEndpoint) -> &str {
        match endpoint {
            AuthEndpoint::Login => &self.login_path,
            AuthEndpoint::Logout => &self.logout_path,
            AuthEndpoint::Refresh => &self.refresh_path,
            AuthEndpoint::Me => &self.me_path,
        }
    }

    /// Identifies which auth endpoint `target` addresses, if any.
    ///
    /// `target` may be a relative path or an absolute URL; query string,
    /// fragment and a trailing slash are ignored. A match requires the
    /// target to end with the full endpoint path.
    #[must_use]
    pub fn classify(&self, target: &str) -> Option<AuthEndpoint> {
        let end = target.find(['?', '#']).unwrap_or(target.len());
        let target = target[..end].trim_end_matches('/');

        [
            AuthEndpoint::Refresh,
            AuthEndpoint::Login,
            AuthEndpoint::Logout,
            AuthEndpoint::Me,
        ]
        .into_iter()
        .find(|endpoint| target.ends_with(self.path(*endpoint).trim_end_matches('/')))
    }

    /// Returns true if `target` is the refresh endpoint.
    #[must_use]
    pub fn is_refresh(&self, target: &str) -> bool {
        self.classify(target) == Some(AuthEndpoint::Refresh)
    }
}
