//! "Session ended" broadcast.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use super::listeners::{Listeners, SubscriptionId};
use crate::error::RefreshFailure;

/// What ended a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEndReason {
    /// The refresh call failed; the refresh-token cookie is unusable.
    RefreshFailed(RefreshFailure),
    /// A request replayed with a freshly refreshed token was rejected again.
    TokenRejected,
    /// The user logged out.
    LoggedOut,
    /// The UI asked for a fresh login.
    ForcedRelogin,
}

impl fmt::Display for SessionEndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RefreshFailed(failure) => write!(f, "refresh failed: {failure}"),
            Self::TokenRejected => f.write_str("refreshed token was rejected"),
            Self::LoggedOut => f.write_str("logged out"),
            Self::ForcedRelogin => f.write_str("re-login requested"),
        }
    }
}

/// Event broadcast when the session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEnded {
    /// Why it ended.
    pub reason: SessionEndReason,
    /// When it ended.
    pub at: DateTime<Utc>,
}

/// Broadcaster for `SessionEnded`.
///
/// Any component can listen, not only the caller whose request failed, so
/// other screens holding in-flight work are not left stuck.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    listeners: Arc<Listeners<SessionEnded>>,
}

impl SessionEvents {
    /// Creates a broadcaster with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Arc::new(Listeners::new()),
        }
    }

    /// Registers a callback for every `SessionEnded`.
    pub fn on_session_ended<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEnded) + Send + Sync + 'static,
    {
        self.listeners.add(callback)
    }

    /// Removes a callback.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        self.listeners.remove(id)
    }

    /// Broadcasts an event.
    pub fn emit(&self, event: &SessionEnded) {
        self.listeners.notify(event);
    }
}

impl Default for SessionEvents {
    fn default() -> Self {
        Self::new()
    }
}
