//! Elim Infrastructure - Adapters and implementations
//!
//! This crate provides concrete implementations of the ports
//! defined in the application layer, plus settings loading and
//! tracing setup.

pub mod adapters;
pub mod settings;
pub mod telemetry;

pub use adapters::{ReqwestTransport, SystemClock};
pub use settings::{DEFAULT_SETTINGS_FILE, SettingsError, load_settings};
pub use telemetry::{Logger, TelemetryError, parse_filter};
