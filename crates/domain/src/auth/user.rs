//! Login payloads and the current-user record.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::AccessToken;

/// Credentials posted to the login endpoint.
#[derive(Clone, Serialize)]
pub struct LoginCredentials {
    /// Account email.
    pub email: String,
    /// Plain password, only ever sent over the wire.
    pub password: String,
}

impl LoginCredentials {
    /// Creates credentials.
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginCredentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// `data` of a successful refresh response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    /// New access token.
    pub access_token: String,
}

/// `data` of a successful login response.
///
/// Some backends nest the token under `jwtTokenRes` and name the user id
/// `userSeq`; both shapes are accepted.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginPayload {
    /// User id.
    #[serde(default, alias = "userSeq")]
    pub user_id: Option<i64>,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Granted roles, most significant first.
    #[serde(default)]
    pub roles: Vec<String>,
    /// License the user belongs to.
    #[serde(default)]
    pub license_seq: Option<i64>,
    /// Flat access token.
    #[serde(default)]
    pub access_token: Option<String>,
    /// Nested token response.
    #[serde(default)]
    pub jwt_token_res: Option<TokenPayload>,
}

impl LoginPayload {
    /// Returns the access token from whichever field carries it.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.access_token
            .as_deref()
            .or_else(|| self.jwt_token_res.as_ref().map(|t| t.access_token.as_str()))
            .filter(|t| !t.is_empty())
            .map(AccessToken::new)
    }

    /// Builds the current-user record.
    #[must_use]
    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            user_id: self.user_id.unwrap_or_default(),
            name: self.name.clone(),
            role: self.roles.first().cloned(),
            license_seq: self.license_seq,
        }
    }
}

/// `data` of the "who am I" response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MePayload {
    /// User id.
    #[serde(alias = "userSeq")]
    pub user_id: i64,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Granted roles.
    #[serde(default)]
    pub roles: Vec<String>,
    /// License the user belongs to.
    #[serde(default)]
    pub license_seq: Option<i64>,
}

impl From<MePayload> for CurrentUser {
    fn from(me: MePayload) -> Self {
        Self {
            user_id: me.user_id,
            name: me.name,
            role: me.roles.into_iter().next(),
            license_seq: me.license_seq,
        }
    }
}

/// The logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// User id.
    pub user_id: i64,
    /// Display name.
    pub name: String,
    /// Primary role.
    pub role: Option<String>,
    /// License the user belongs to.
    pub license_seq: Option<i64>,
}
