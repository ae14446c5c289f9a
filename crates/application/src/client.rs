//! One-stop client wiring the session core around a transport.

use std::sync::Arc;
use std::time::Duration;

use elim_domain::{AccessToken, ApiRequest, ApiResponse, ClientSettings, CurrentUser, LoginCredentials};
use serde::de::DeserializeOwned;

use crate::auth::{
    AuthService, CredentialInjector, RefreshCoordinator, RequestPipeline, SessionEnded,
    SessionEvents, SessionGate, SubscriptionId, TokenStore,
};
use crate::error::ClientResult;
use crate::ports::{Clock, HttpTransport};

/// Authenticated API client.
///
/// All clones share one token store and one refresh coordinator.
#[derive(Debug, Clone)]
pub struct SessionClient {
    store: TokenStore,
    events: SessionEvents,
    coordinator: RefreshCoordinator,
    pipeline: RequestPipeline,
    gate: SessionGate,
    auth: AuthService,
}

impl SessionClient {
    /// Builds the session core.
    ///
    /// The refresh call uses the same timeout as ordinary requests, and the
    /// gate may only be bypassed when the backend is on a loopback host.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        settings: &ClientSettings,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let store = TokenStore::new();
        let events = SessionEvents::new();
        let injector = CredentialInjector::new(settings.auth.clone(), store.clone());
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&transport),
            injector.clone(),
            events.clone(),
            Arc::clone(&clock),
            Duration::from_millis(settings.client.timeout_ms),
        );
        let pipeline = RequestPipeline::new(transport, injector, coordinator.clone());
        let gate = SessionGate::new(
            coordinator.clone(),
            settings.gate.clone(),
            settings.client.is_loopback(),
            clock,
        );
        let auth = AuthService::new(pipeline.clone());

        Self {
            store,
            events,
            coordinator,
            pipeline,
            gate,
            auth,
        }
    }

    /// Sends a request with credentials, recovering once from an expired token.
    ///
    /// # Errors
    /// See [`RequestPipeline::send`].
    pub async fn send_authenticated(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        self.pipeline.send(request).await
    }

    /// Like `send_authenticated`, decoding the envelope's `data`.
    ///
    /// # Errors
    /// See [`RequestPipeline::send_json`].
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        self.pipeline.send_json(request).await
    }

    /// Registers a callback for the end of the session.
    pub fn on_session_ended<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SessionEnded) + Send + Sync + 'static,
    {
        self.events.on_session_ended(callback)
    }

    /// The access token currently held, if any.
    #[must_use]
    pub fn current_token(&self) -> Option<AccessToken> {
        self.store.access_token()
    }

    /// Logs in with email and password.
    ///
    /// # Errors
    /// See [`AuthService::login`].
    pub async fn login(&self, credentials: &LoginCredentials) -> ClientResult<CurrentUser> {
        self.auth.login(credentials).await
    }

    /// Logs out; the local session always ends.
    pub async fn logout(&self) {
        self.auth.logout().await;
    }

    /// Resumes a session from the refresh-token cookie.
    ///
    /// # Errors
    /// See [`AuthService::resume`].
    pub async fn resume(&self) -> ClientResult<Option<CurrentUser>> {
        self.auth.resume().await
    }

    /// The logged-in user, when known.
    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.auth.current_user()
    }

    /// The session gate.
    #[must_use]
    pub const fn gate(&self) -> &SessionGate {
        &self.gate
    }

    /// The token store.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    /// The refresh coordinator.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }
}
