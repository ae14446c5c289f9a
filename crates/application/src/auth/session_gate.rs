//! Gate in front of protected screens.

use std::fmt;
use std::sync::{Arc, Weak};

use chrono::{DateTime, TimeDelta, Utc};
use elim_domain::{GateSettings, Session};
use parking_lot::RwLock;
use tracing::{debug, info};

use super::RefreshCoordinator;
use super::events::SessionEndReason;
use super::listeners::{Listeners, SubscriptionId};
use crate::ports::Clock;

/// Whether protected content may be shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GateState {
    /// Trying to resume a session.
    Checking,
    /// A session exists.
    Ready,
    /// No session; the user has to log in.
    LoginRequired,
}

/// Blocks protected content until a session exists.
///
/// Follows the token store: holding a token opens the gate, losing it
/// closes the gate again.
#[derive(Clone)]
pub struct SessionGate {
    inner: Arc<GateInner>,
}

struct GateInner {
    coordinator: RefreshCoordinator,
    settings: GateSettings,
    bypass: bool,
    clock: Arc<dyn Clock>,
    status: RwLock<(GateState, DateTime<Utc>)>,
    listeners: Listeners<GateState>,
    subscription: SubscriptionId,
}

impl SessionGate {
    /// Creates a gate in the `Checking` state.
    ///
    /// `bypass_allowed` must only be true for a local backend; together with
    /// `settings.skip_protection` it keeps the gate open without a session.
    #[must_use]
    pub fn new(
        coordinator: RefreshCoordinator,
        settings: GateSettings,
        bypass_allowed: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let bypass = settings.skip_protection && bypass_allowed;
        let now = clock.now();
        let inner = Arc::new_cyclic(|weak: &Weak<GateInner>| {
            let weak = weak.clone();
            let subscription = coordinator.store().subscribe(move |session| {
                if let Some(gate) = weak.upgrade() {
                    gate.on_session(session);
                }
            });
            GateInner {
                coordinator,
                settings,
                bypass,
                clock,
                status: RwLock::new((GateState::Checking, now)),
                listeners: Listeners::new(),
                subscription,
            }
        });
        Self { inner }
    }

    /// Resolves the initial state.
    ///
    /// With a token in memory the gate opens at once. Otherwise one refresh
    /// is attempted, which succeeds when the server still holds a valid
    /// refresh-token cookie.
    pub async fn bootstrap(&self) -> GateState {
        if self.inner.bypass {
            info!("session protection skipped for local backend");
            self.inner.transition(GateState::Ready);
            return GateState::Ready;
        }
        if self.inner.coordinator.store().is_authenticated() {
            self.inner.transition(GateState::Ready);
            return GateState::Ready;
        }

        self.inner.transition(GateState::Checking);
        let state = match self.inner.coordinator.refresh().await {
            Ok(_) => GateState::Ready,
            Err(failure) => {
                info!(error = %failure, "no session to resume");
                GateState::LoginRequired
            }
        };
        self.inner.transition(state);
        state
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> GateState {
        self.inner.status.read().0
    }

    /// Returns true when protected content may be rendered.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == GateState::Ready
    }

    /// Where to navigate, if anywhere.
    #[must_use]
    pub fn redirect_target(&self) -> Option<&str> {
        (self.state() == GateState::LoginRequired).then_some(self.inner.settings.login_route.as_str())
    }

    /// Returns true once the gate has been closed long enough to offer a
    /// "log in again" action.
    #[must_use]
    pub fn relogin_prompt_due(&self) -> bool {
        let (state, since) = *self.inner.status.read();
        if state == GateState::Ready {
            return false;
        }
        let after = i64::try_from(self.inner.settings.relogin_prompt_after_ms).unwrap_or(i64::MAX);
        self.inner.clock.now() - since >= TimeDelta::milliseconds(after)
    }

    /// Drops the session and closes the gate. Returns the login route.
    pub fn force_relogin(&self) -> String {
        self.inner.coordinator.end_session(SessionEndReason::ForcedRelogin);
        self.inner.transition(GateState::LoginRequired);
        self.inner.settings.login_route.clone()
    }

    /// Registers a callback for state changes.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&GateState) + Send + Sync + 'static,
    {
        self.inner.listeners.add(callback)
    }
}

impl GateInner {
    fn on_session(&self, session: &Session) {
        if self.bypass {
            return;
        }
        let state = if session.is_authenticated() {
            GateState::Ready
        } else {
            GateState::LoginRequired
        };
        self.transition(state);
    }

    fn transition(&self, next: GateState) {
        {
            let mut status = self.status.write();
            if status.0 == next {
                return;
            }
            if status.0 == GateState::Ready {
                status.1 = self.clock.now();
            }
            debug!(from = ?status.0, to = ?next, "session gate changed");
            status.0 = next;
        }
        self.listeners.notify(&next);
    }
}

impl Drop for GateInner {
    fn drop(&mut self) {
        self.coordinator.store().unsubscribe(self.subscription);
    }
}

impl fmt::Debug for SessionGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionGate")
            .field("state", &self.state())
            .field("bypass", &self.inner.bypass)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::testing::{Harness, RefreshScript};
    use elim_domain::AccessToken;
    use elim_domain::error_codes::codes;
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    fn gate(h: &Harness) -> SessionGate {
        SessionGate::new(
            h.coordinator.clone(),
            GateSettings::default(),
            false,
            h.clock.clone(),
        )
    }

    #[tokio::test]
    async fn test_cold_start_without_refresh_row_redirects_to_login() {
        let h = Harness::new();
        h.backend.script_refresh(RefreshScript::Reject {
            status: 401,
            code: codes::REFRESH_ROW_NOT_FOUND,
        });
        let gate = gate(&h);

        assert_eq!(gate.bootstrap().await, GateState::LoginRequired);
        assert_eq!(h.store.access_token(), None);
        assert_eq!(gate.redirect_target(), Some("/login"));
        assert!(!gate.is_ready());
    }

    #[tokio::test]
    async fn test_cold_start_with_cookie_opens_gate() {
        let h = Harness::new();
        let gate = gate(&h);
        assert_eq!(gate.state(), GateState::Checking);

        assert_eq!(gate.bootstrap().await, GateState::Ready);
        assert_eq!(h.store.access_token(), Some(AccessToken::new("T2")));
        assert_eq!(gate.redirect_target(), None);
    }

    #[tokio::test]
    async fn test_held_token_opens_gate_without_refresh() {
        let h = Harness::new().with_session("T1", Some("T1"));
        let gate = gate(&h);

        assert_eq!(gate.bootstrap().await, GateState::Ready);
        assert_eq!(h.backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_gate_follows_store() {
        let h = Harness::new().with_session("T1", Some("T1"));
        let gate = gate(&h);
        gate.bootstrap().await;
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        gate.on_change(move |state| sink.lock().push(*state));

        h.coordinator.end_session(SessionEndReason::LoggedOut);
        assert_eq!(gate.state(), GateState::LoginRequired);

        h.coordinator.begin_session(AccessToken::new("T-login"));
        assert!(gate.is_ready());
        assert_eq!(*seen.lock(), vec![GateState::LoginRequired, GateState::Ready]);
    }

    #[tokio::test]
    async fn test_skip_protection_requires_local_backend() {
        let h = Harness::new();
        h.backend.script_refresh(RefreshScript::Unreachable);
        let settings = GateSettings {
            skip_protection: true,
            ..GateSettings::default()
        };

        let local = SessionGate::new(h.coordinator.clone(), settings.clone(), true, h.clock.clone());
        assert_eq!(local.bootstrap().await, GateState::Ready);
        assert_eq!(h.backend.refresh_calls(), 0);

        let remote = SessionGate::new(h.coordinator.clone(), settings, false, h.clock.clone());
        assert_eq!(remote.bootstrap().await, GateState::LoginRequired);
    }

    #[tokio::test]
    async fn test_relogin_prompt_after_delay() {
        let h = Harness::new();
        h.backend.script_refresh(RefreshScript::Unreachable);
        let gate = gate(&h);
        gate.bootstrap().await;

        assert!(!gate.relogin_prompt_due());
        h.clock.advance_ms(2_999);
        assert!(!gate.relogin_prompt_due());
        h.clock.advance_ms(1);
        assert!(gate.relogin_prompt_due());
    }

    #[tokio::test]
    async fn test_force_relogin() {
        let h = Harness::new().with_session("T1", Some("T1"));
        let gate = gate(&h);
        gate.bootstrap().await;

        assert_eq!(gate.force_relogin(), "/login");

        assert_eq!(gate.state(), GateState::LoginRequired);
        assert_eq!(h.store.access_token(), None);
        assert_eq!(h.ended(), vec![SessionEndReason::ForcedRelogin]);
    }
}
