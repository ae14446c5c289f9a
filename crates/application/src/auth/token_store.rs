//! In-memory access token holder.
//!
//! The access token is never persisted; after a restart the session is
//! recovered through the refresh-token cookie the server holds.

use std::fmt;
use std::sync::Arc;

use elim_domain::{AccessToken, Session};
use parking_lot::{ReentrantMutex, RwLock};
use tracing::debug;

use super::listeners::{Listeners, SubscriptionId};

/// Thread-safe holder of the current session.
///
/// Reads and writes are serialized; subscribers are notified synchronously,
/// in update order, after every change. Setting the value it already holds
/// notifies nobody.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<Inner>,
}

struct Inner {
    session: RwLock<Session>,
    listeners: Listeners<Session>,
    /// Keeps "write then notify" atomic with respect to other writers while
    /// letting a subscriber write from inside its callback.
    updates: ReentrantMutex<()>,
}

impl TokenStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                session: RwLock::new(Session::default()),
                listeners: Listeners::new(),
                updates: ReentrantMutex::new(()),
            }),
        }
    }

    /// Returns a snapshot of the session.
    #[must_use]
    pub fn get(&self) -> Session {
        self.inner.session.read().clone()
    }

    /// Returns the current access token.
    #[must_use]
    pub fn access_token(&self) -> Option<AccessToken> {
        self.inner.session.read().access_token.clone()
    }

    /// Returns true if a token is held.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.session.read().is_authenticated()
    }

    /// Replaces the token. Returns true if the session changed.
    pub fn set(&self, token: Option<AccessToken>) -> bool {
        self.update(|_| Some(token))
    }

    /// Drops the token. Returns true if one was held.
    pub fn clear(&self) -> bool {
        self.set(None)
    }

    /// Replaces the token only if the store still holds `expected`.
    ///
    /// Returns true if the swap happened and changed the session.
    pub fn replace_if(&self, expected: Option<&AccessToken>, token: Option<AccessToken>) -> bool {
        self.update(|current| (current.as_ref() == expected).then_some(token))
    }

    /// Registers a callback invoked with the new session after each change.
    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Session) + Send + Sync + 'static,
    {
        self.inner.listeners.add(callback)
    }

    /// Removes a callback. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.inner.listeners.remove(id)
    }

    fn update<F>(&self, decide: F) -> bool
    where
        F: FnOnce(&Option<AccessToken>) -> Option<Option<AccessToken>>,
    {
        let _serial = self.inner.updates.lock();
        let snapshot = {
            let mut session = self.inner.session.write();
            match decide(&session.access_token) {
                Some(next) if next != session.access_token => {
                    session.access_token = next;
                    session.clone()
                }
                _ => return false,
            }
        };
        debug!(
            authenticated = snapshot.is_authenticated(),
            token = ?snapshot.access_token,
            "session updated"
        );
        self.inner.listeners.notify(&snapshot);
        true
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenStore")
            .field("session", &*self.inner.session.read())
            .field("listeners", &self.inner.listeners)
            .finish()
    }
}
