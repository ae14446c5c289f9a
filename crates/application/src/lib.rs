//! Elim Application - Session core for the authenticated API client
//!
//! This crate holds the ports the infrastructure layer implements and the
//! session-token lifecycle built on them: token storage, credential
//! injection, single-flight refresh, the 401 replay pipeline and the
//! session gate.

pub mod auth;
pub mod client;
pub mod error;
pub mod ports;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{
    AuthService, CredentialInjector, GateState, PendingRequest, RefreshCoordinator,
    RefreshOutcome, RefreshPhase, RequestPipeline, SessionEndReason, SessionEnded, SessionEvents,
    SessionGate, SubscriptionId, TokenStore,
};
pub use client::SessionClient;
pub use error::{ClientError, ClientResult, RefreshFailure};
pub use ports::{Clock, HttpTransport, TransportError};
