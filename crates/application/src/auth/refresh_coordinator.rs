//! Single-flight access token refresh.
//!
//! At most one refresh call is in flight at any time. Every caller that
//! needs a new token while it runs joins the same ticket and receives a
//! clone of the same outcome. The network call runs on its own task, so a
//! caller that gives up waiting cannot cancel it for everybody else.

use std::cell::Cell;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use elim_domain::{AccessToken, ApiRequest, ApiResponse, TokenPayload, generate_id};
use parking_lot::{Mutex, ReentrantMutex};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::events::{SessionEndReason, SessionEnded, SessionEvents};
use super::{CredentialInjector, TokenStore};
use crate::error::RefreshFailure;
use crate::ports::{Clock, HttpTransport, TransportError};

/// Result delivered to every waiter of a refresh ticket.
pub type RefreshOutcome = Result<AccessToken, RefreshFailure>;

/// Observable state of the coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshPhase {
    /// No refresh is running.
    Idle,
    /// A refresh call is in flight.
    Refreshing {
        /// Ticket identifier, for logs.
        ticket_id: String,
        /// When the refresh started.
        started_at: DateTime<Utc>,
        /// Callers currently waiting for the outcome.
        waiters: usize,
    },
}

struct RefreshTicket {
    id: String,
    started_at: DateTime<Utc>,
    waiters: Vec<oneshot::Sender<RefreshOutcome>>,
}

enum RefreshState {
    Idle,
    Refreshing(RefreshTicket),
}

enum Decision {
    Reuse(AccessToken),
    Fail(RefreshFailure),
    Start,
}

enum Joined {
    Ready(RefreshOutcome),
    Waiting(oneshot::Receiver<RefreshOutcome>),
}

/// Coordinates access token refreshes and session termination.
///
/// Cloning is cheap; clones share the same ticket.
#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn HttpTransport>,
    injector: CredentialInjector,
    store: TokenStore,
    events: SessionEvents,
    clock: Arc<dyn Clock>,
    timeout: Duration,
    state: Mutex<RefreshState>,
    /// Session epoch, bumped whenever a session begins or ends. Held across
    /// every epoch check and the store write that depends on it, so a refresh
    /// started under an older epoch never writes to the store.
    session: ReentrantMutex<Cell<u64>>,
    network_calls: AtomicU64,
}

impl RefreshCoordinator {
    /// Creates a coordinator.
    ///
    /// `timeout` bounds the refresh call; it should match the transport
    /// timeout.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        injector: CredentialInjector,
        events: SessionEvents,
        clock: Arc<dyn Clock>,
        timeout: Duration,
    ) -> Self {
        let store = injector.store().clone();
        Self {
            inner: Arc::new(Inner {
                transport,
                injector,
                store,
                events,
                clock,
                timeout,
                state: Mutex::new(RefreshState::Idle),
                session: ReentrantMutex::new(Cell::new(0)),
                network_calls: AtomicU64::new(0),
            }),
        }
    }

    /// Obtains a usable token.
    ///
    /// Joins the in-flight refresh if there is one. Otherwise returns the
    /// held token without a network call, or starts a refresh when no token
    /// is held (cold start).
    pub async fn refresh(&self) -> RefreshOutcome {
        let joined = self.join_or_start(|held| held.map_or(Decision::Start, Decision::Reuse));
        Self::wait(joined).await
    }

    /// Obtains a replacement for a token the server just rejected with 401.
    ///
    /// If the store already holds a different token (another caller finished
    /// a refresh in the meantime) that token is returned without a network
    /// call. If the session was ended since `rejected` was sent, fails with
    /// [`RefreshFailure::SessionEnded`].
    pub async fn refresh_after_rejection(&self, rejected: Option<&AccessToken>) -> RefreshOutcome {
        let joined = self.join_or_start(|held| match (held, rejected) {
            (Some(current), Some(rejected)) if current == *rejected => Decision::Start,
            (Some(current), _) => Decision::Reuse(current),
            (None, Some(_)) => Decision::Fail(RefreshFailure::SessionEnded),
            (None, None) => Decision::Start,
        });
        Self::wait(joined).await
    }

    /// Installs a token obtained by logging in.
    pub fn begin_session(&self, token: AccessToken) {
        let epoch = self.inner.session.lock();
        epoch.set(epoch.get() + 1);
        self.inner.store.set(Some(token));
    }

    /// Ends the session: drops the token and broadcasts `SessionEnded`.
    ///
    /// A refresh still in flight completes, but its token is discarded.
    pub fn end_session(&self, reason: SessionEndReason) {
        {
            let epoch = self.inner.session.lock();
            epoch.set(epoch.get() + 1);
            self.inner.store.clear();
        }
        info!(%reason, "session ended");
        self.inner.emit(reason);
    }

    /// Ends the session because `rejected`, a freshly refreshed token, was
    /// refused by the server.
    ///
    /// Only the first caller holding that token ends the session; later
    /// callers find the store already changed and return false.
    pub fn expire_rejected(&self, rejected: &AccessToken) -> bool {
        {
            let epoch = self.inner.session.lock();
            if !self.inner.store.replace_if(Some(rejected), None) {
                return false;
            }
            epoch.set(epoch.get() + 1);
        }
        warn!(token = ?rejected, "refreshed token rejected, ending session");
        self.inner.emit(SessionEndReason::TokenRejected);
        true
    }

    /// Returns the current phase.
    #[must_use]
    pub fn phase(&self) -> RefreshPhase {
        match &*self.inner.state.lock() {
            RefreshState::Idle => RefreshPhase::Idle,
            RefreshState::Refreshing(ticket) => RefreshPhase::Refreshing {
                ticket_id: ticket.id.clone(),
                started_at: ticket.started_at,
                waiters: ticket.waiters.len(),
            },
        }
    }

    /// Number of refresh calls sent to the server so far.
    #[must_use]
    pub fn network_calls(&self) -> u64 {
        self.inner.network_calls.load(Ordering::SeqCst)
    }

    /// The token store this coordinator writes to.
    #[must_use]
    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// The broadcaster for `SessionEnded`.
    #[must_use]
    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    fn join_or_start<F>(&self, decide: F) -> Joined
    where
        F: FnOnce(Option<AccessToken>) -> Decision,
    {
        // Read before the state lock. A session change after this point only
        // makes the new ticket's outcome stale, and stale outcomes are dropped.
        let epoch = self.inner.session.lock().get();
        let mut state = self.inner.state.lock();
        if let RefreshState::Refreshing(ticket) = &mut *state {
            let (tx, rx) = oneshot::channel();
            ticket.waiters.push(tx);
            debug!(ticket = %ticket.id, waiters = ticket.waiters.len(), "joined in-flight refresh");
            return Joined::Waiting(rx);
        }

        match decide(self.inner.store.access_token()) {
            Decision::Reuse(token) => Joined::Ready(Ok(token)),
            Decision::Fail(failure) => Joined::Ready(Err(failure)),
            Decision::Start => {
                let (tx, rx) = oneshot::channel();
                let ticket = RefreshTicket {
                    id: generate_id(),
                    started_at: self.inner.clock.now(),
                    waiters: vec![tx],
                };
                let ticket_id = ticket.id.clone();
                *state = RefreshState::Refreshing(ticket);
                drop(state);

                info!(ticket = %ticket_id, "starting access token refresh");
                tokio::spawn(Arc::clone(&self.inner).run(ticket_id, epoch));
                Joined::Waiting(rx)
            }
        }
    }

    async fn wait(joined: Joined) -> RefreshOutcome {
        match joined {
            Joined::Ready(outcome) => outcome,
            Joined::Waiting(rx) => rx.await.unwrap_or(Err(RefreshFailure::Abandoned)),
        }
    }
}

impl Inner {
    async fn run(self: Arc<Self>, ticket_id: String, epoch: u64) {
        let mut guard = TicketGuard {
            inner: Arc::clone(&self),
            armed: true,
        };

        let result = self.request_new_token().await;

        let mut ended = None;
        let outcome = {
            let session = self.session.lock();
            let current = session.get() == epoch;
            match result {
                Ok(token) if current => {
                    self.store.set(Some(token.clone()));
                    info!(ticket = %ticket_id, token = ?token, "access token refreshed");
                    Ok(token)
                }
                Err(failure) if current => {
                    warn!(
                        ticket = %ticket_id,
                        error = %failure,
                        code = ?failure.code(),
                        "access token refresh failed"
                    );
                    self.store.clear();
                    ended = Some(SessionEndReason::RefreshFailed(failure.clone()));
                    Err(failure)
                }
                // The session was replaced or ended while the call ran.
                _ => {
                    debug!(ticket = %ticket_id, "discarding refresh outcome from an older session");
                    self.store
                        .access_token()
                        .ok_or(RefreshFailure::SessionEnded)
                }
            }
        };

        guard.armed = false;
        let ticket = match std::mem::replace(&mut *self.state.lock(), RefreshState::Idle) {
            RefreshState::Refreshing(ticket) => Some(ticket),
            RefreshState::Idle => None,
        };

        if let Some(reason) = ended {
            self.emit(reason);
        }
        if let Some(ticket) = ticket {
            let waiters = ticket.waiters.len();
            for waiter in ticket.waiters {
                let _ = waiter.send(outcome.clone());
            }
            debug!(ticket = %ticket.id, waiters, "refresh ticket released");
        }
    }

    async fn request_new_token(&self) -> RefreshOutcome {
        self.network_calls.fetch_add(1, Ordering::SeqCst);
        let timeout_ms = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
        let request = self.injector.decorate(
            ApiRequest::post(self.injector.endpoints().refresh_path.clone())
                .with_timeout_ms(timeout_ms),
        );

        match tokio::time::timeout(self.timeout, self.transport.execute(&request)).await {
            Ok(Ok(response)) => parse_refresh_response(&response),
            Ok(Err(TransportError::Timeout { timeout_ms })) => {
                Err(RefreshFailure::TimedOut { timeout_ms })
            }
            Ok(Err(error)) => Err(RefreshFailure::Transport(error)),
            Err(_) => Err(RefreshFailure::TimedOut { timeout_ms }),
        }
    }

    fn emit(&self, reason: SessionEndReason) {
        self.events.emit(&SessionEnded {
            reason,
            at: self.clock.now(),
        });
    }
}

/// Resets the coordinator if the refresh task is dropped before finishing.
/// Dropping the ticket drops its senders, so waiters see `Abandoned`.
struct TicketGuard {
    inner: Arc<Inner>,
    armed: bool,
}

impl Drop for TicketGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let previous = std::mem::replace(&mut *self.inner.state.lock(), RefreshState::Idle);
        if let RefreshState::Refreshing(ticket) = previous {
            warn!(ticket = %ticket.id, "refresh task stopped before completing");
        }
    }
}

/// Extracts the new access token from a refresh response.
fn parse_refresh_response(response: &ApiResponse) -> RefreshOutcome {
    if !response.is_success() {
        let (code, message) = response.error_details();
        return Err(RefreshFailure::Rejected {
            status: response.status,
            code,
            message,
        });
    }

    let envelope = response
        .envelope::<TokenPayload>()
        .map_err(|e| RefreshFailure::MalformedResponse(e.to_string()))?;
    if !envelope.success {
        return Err(RefreshFailure::Rejected {
            status: response.status,
            code: envelope.code(),
            message: envelope.message(),
        });
    }

    match envelope.into_data() {
        Some(payload) if !payload.access_token.is_empty() => {
            Ok(AccessToken::new(payload.access_token))
        }
        _ => Err(RefreshFailure::MalformedResponse(
            "response carried no access token".to_string(),
        )),
    }
}

impl fmt::Debug for RefreshCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshCoordinator")
            .field("phase", &self.phase())
            .field("timeout", &self.inner.timeout)
            .field("network_calls", &self.network_calls())
            .finish_non_exhaustive()
    }
}
