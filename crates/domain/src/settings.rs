//! Client settings
//!
//! Every section and field has a default, so an empty configuration
//! source yields a usable client pointed at `localhost`.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::auth::AuthEndpointSet;
use crate::error::{DomainError, DomainResult};

/// Top-level settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ClientSettings {
    /// Transport settings.
    pub client: TransportSettings,
    /// Authentication endpoint paths.
    pub auth: AuthEndpointSet,
    /// Session gate behaviour.
    pub gate: GateSettings,
    /// Logging.
    pub log: LogSettings,
}

impl ClientSettings {
    /// Validates cross-field constraints.
    ///
    /// # Errors
    /// Returns an error if the base URL does not parse or an auth path is invalid.
    pub fn validate(&self) -> DomainResult<()> {
        self.client.base_url()?;
        self.auth.validate()
    }
}

/// HTTP transport settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    /// Base URL every relative request path is appended to.
    pub base_url: String,
    /// Timeout applied to every call, the refresh call included.
    pub timeout_ms: u64,
    /// `User-Agent` header value.
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            timeout_ms: 30_000,
            user_agent: concat!("elim/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl TransportSettings {
    /// Parses the base URL.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidUrl` if it does not parse or is not http(s).
    pub fn base_url(&self) -> DomainResult<Url> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| DomainError::InvalidUrl(format!("{e}: {}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(DomainError::InvalidUrl(format!(
                "unsupported scheme: {}",
                self.base_url
            )));
        }
        Ok(url)
    }

    /// Returns true if the base URL points at a loopback host.
    #[must_use]
    pub fn is_loopback(&self) -> bool {
        self.base_url().is_ok_and(|url| match url.host() {
            Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
            Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
            Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
            None => false,
        })
    }
}

/// Session gate settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GateSettings {
    /// Route the UI navigates to when a login is required.
    pub login_route: String,
    /// Let protected content through without a session (loopback only).
    pub skip_protection: bool,
    /// How long the gate waits before offering a manual re-login.
    pub relogin_prompt_after_ms: u64,
}

impl Default for GateSettings {
    fn default() -> Self {
        Self {
            login_route: "/login".to_string(),
            skip_protection: false,
            relogin_prompt_after_ms: 3_000,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_defaults_are_valid() {
        let settings = ClientSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.client.timeout_ms, 30_000);
        assert_eq!(settings.gate.login_route, "/login");
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let settings: ClientSettings =
            serde_json::from_str(r#"{"client":{"base_url":"https://api.example.com"}}"#).unwrap();

        assert_eq!(settings.client.base_url, "https://api.example.com");
        assert_eq!(settings.client.timeout_ms, 30_000);
        assert_eq!(settings.auth, AuthEndpointSet::default());
    }

    #[test]
    fn test_loopback_detection() {
        let mut transport = TransportSettings::default();
        assert!(transport.is_loopback());

        transport.base_url = "http://127.0.0.1:9000".to_string();
        assert!(transport.is_loopback());

        transport.base_url = "https://api.example.com".to_string();
        assert!(!transport.is_loopback());
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        let transport = TransportSettings {
            base_url: "ftp://example.com".to_string(),
            ..TransportSettings::default()
        };
        assert!(matches!(
            transport.base_url(),
            Err(DomainError::InvalidUrl(_))
        ));
    }
}
