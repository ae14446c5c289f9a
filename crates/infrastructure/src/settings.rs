//! Settings loading.
//!
//! Sources, later ones winning: built-in defaults, an optional TOML file,
//! then `ELIM_`-prefixed environment variables with `__` between nested
//! keys (`ELIM_CLIENT__BASE_URL`, `ELIM_GATE__SKIP_PROTECTION`).

use std::path::Path;

use config::{Config, Environment, File, FileFormat};
use elim_domain::{ClientSettings, DomainError};
use thiserror::Error;

/// File read when no path is given, if it exists.
pub const DEFAULT_SETTINGS_FILE: &str = "elim.toml";

/// Errors raised while loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// A source could not be read or deserialized.
    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),

    /// The merged settings are not usable.
    #[error("invalid settings: {0}")]
    Invalid(#[from] DomainError),
}

/// Loads settings from `path` (required when given) and the environment.
///
/// # Errors
///
/// Returns `Load` when the file is missing or malformed and `Invalid` when
/// the result fails validation.
pub fn load_settings(path: Option<&Path>) -> Result<ClientSettings, SettingsError> {
    load_with_environment(path, environment())
}

fn environment() -> Environment {
    Environment::with_prefix("ELIM")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

fn load_with_environment(
    path: Option<&Path>,
    environment: Environment,
) -> Result<ClientSettings, SettingsError> {
    let file = match path {
        Some(path) => File::from(path).format(FileFormat::Toml).required(true),
        None => File::new(DEFAULT_SETTINGS_FILE, FileFormat::Toml).required(false),
    };

    let settings: ClientSettings = Config::builder()
        .add_source(file)
        .add_source(environment)
        .build()?
        .try_deserialize()?;
    settings.validate()?;

    tracing::debug!(base_url = %settings.client.base_url, "settings loaded");
    Ok(settings)
}
