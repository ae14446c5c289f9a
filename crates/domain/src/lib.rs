//! Elim Domain - Core types for the authenticated API client
//!
//! This crate defines requests, responses, tokens and settings.
//! All types here are pure Rust with no I/O dependencies.

pub mod auth;
pub mod error;
pub mod error_codes;
pub mod id;
pub mod request;
pub mod response;
pub mod settings;

pub use auth::{
    AccessToken, AuthEndpoint, AuthEndpointSet, CurrentUser, LoginCredentials, LoginPayload,
    MePayload, Session, TokenPayload,
};
pub use error::{DomainError, DomainResult};
pub use id::generate_id;
pub use request::{ApiRequest, Headers, HttpMethod};
pub use response::{ApiEnvelope, ApiResponse, StatusCode};
pub use settings::{ClientSettings, GateSettings, LogSettings, TransportSettings};
