//! Session-token lifecycle.
//!
//! This module provides:
//! - In-memory token storage with change notification
//! - Credential injection for outgoing requests
//! - Single-flight token refresh and the 401 replay pipeline
//! - The session gate and explicit login/logout flows

mod credential_injector;
mod events;
mod listeners;
mod pipeline;
mod refresh_coordinator;
mod service;
mod session_gate;
mod token_store;

pub use credential_injector::CredentialInjector;
pub use events::{SessionEndReason, SessionEnded, SessionEvents};
pub use listeners::SubscriptionId;
pub use pipeline::{PendingRequest, RequestPipeline};
pub use refresh_coordinator::{RefreshCoordinator, RefreshOutcome, RefreshPhase};
pub use service::AuthService;
pub use session_gate::{GateState, SessionGate};
pub use token_store::TokenStore;
