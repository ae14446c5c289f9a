//! Tracing setup.
//!
//! Logging starts with a bootstrap filter so settings loading can already
//! log, and is switched to the configured filter once settings are known.
//! `RUST_LOG`, when set, takes precedence over both.

use elim_domain::LogSettings;
use thiserror::Error;
use tracing_subscriber::{
    EnvFilter, Registry, fmt, layer::SubscriberExt, reload, util::SubscriberInitExt,
};

/// Filter used until settings are loaded.
pub const BOOTSTRAP_FILTER: &str = "info";

/// Errors raised while configuring tracing.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The filter directive does not parse.
    #[error("invalid log filter '{filter}': {message}")]
    InvalidFilter {
        /// Offending directive.
        filter: String,
        /// Parser message.
        message: String,
    },

    /// A global subscriber was already installed.
    #[error("tracing already initialized: {0}")]
    AlreadyInitialized(String),

    /// The subscriber holding the filter is gone.
    #[error("failed to reload log filter: {0}")]
    Reload(#[from] reload::Error),
}

/// Handle on the installed subscriber.
#[derive(Debug)]
pub struct Logger {
    reload_handle: reload::Handle<EnvFilter, Registry>,
    env_override: bool,
}

impl Logger {
    /// Installs the global subscriber with the bootstrap filter.
    ///
    /// # Errors
    ///
    /// Fails if a global subscriber is already installed.
    pub fn init_bootstrap() -> Result<Self, TelemetryError> {
        let env_filter = EnvFilter::try_from_default_env().ok();
        let env_override = env_filter.is_some();
        let filter = env_filter.unwrap_or_else(|| EnvFilter::new(BOOTSTRAP_FILTER));
        let (filter, reload_handle) = reload::Layer::new(filter);

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;

        Ok(Self {
            reload_handle,
            env_override,
        })
    }

    /// Applies the configured filter unless `RUST_LOG` overrides it.
    ///
    /// # Errors
    ///
    /// Fails on an invalid directive.
    pub fn apply(&self, settings: &LogSettings) -> Result<(), TelemetryError> {
        let filter = parse_filter(&settings.filter)?;
        if self.env_override {
            tracing::debug!(filter = %settings.filter, "RUST_LOG set, keeping its filter");
            return Ok(());
        }
        self.reload_handle.reload(filter)?;
        Ok(())
    }
}

/// Parses a filter directive such as `info,elim_application=debug`.
///
/// # Errors
///
/// Returns `InvalidFilter` when the directive does not parse.
pub fn parse_filter(filter: &str) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_new(filter).map_err(|e| TelemetryError::InvalidFilter {
        filter: filter.to_string(),
        message: e.to_string(),
    })
}
