//! In-memory backend and manual clock for unit tests.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use elim_domain::request::AUTHORIZATION;
use elim_domain::{ApiRequest, ApiResponse, AuthEndpoint, AuthEndpointSet};
use parking_lot::Mutex;
use serde_json::json;

use crate::auth::{
    CredentialInjector, RefreshCoordinator, RequestPipeline, SessionEvents, TokenStore,
};
use crate::ports::{Clock, HttpTransport, TransportError};

/// What the fake refresh endpoint does.
#[derive(Debug, Clone)]
pub(crate) enum RefreshScript {
    /// Issue this token and accept it from now on.
    Issue(&'static str),
    /// Answer with a failure envelope.
    Reject { status: u16, code: i64 },
    /// Answer 200 without a token.
    Malformed,
    /// Answer 200 with this body as it is.
    Raw(serde_json::Value),
    /// Fail at the transport level.
    Unreachable,
    /// Never answer.
    Hang,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedRequest {
    pub path: String,
    pub authorization: Option<String>,
}

struct BackendState {
    valid_token: Option<String>,
    refresh: RefreshScript,
    refresh_delay: Duration,
    login_token: Option<&'static str>,
    fail_logout: bool,
}

/// Backend that accepts exactly one bearer token at a time.
///
/// Protected paths answer 200 for the valid token and 401 otherwise, except:
/// `/always-401`, `/server-error` (500), `/bad-request` (400) and
/// `/unreachable` (transport failure).
pub(crate) struct FakeBackend {
    endpoints: AuthEndpointSet,
    state: Mutex<BackendState>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            endpoints: AuthEndpointSet::default(),
            state: Mutex::new(BackendState {
                valid_token: None,
                refresh: RefreshScript::Issue("T2"),
                refresh_delay: Duration::ZERO,
                login_token: Some("T-login"),
                fail_logout: false,
            }),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn accept_token(&self, token: Option<&str>) {
        self.state.lock().valid_token = token.map(String::from);
    }

    pub(crate) fn script_refresh(&self, script: RefreshScript) {
        self.state.lock().refresh = script;
    }

    pub(crate) fn delay_refresh(&self, delay: Duration) {
        self.state.lock().refresh_delay = delay;
    }

    pub(crate) fn login_issues(&self, token: Option<&'static str>) {
        self.state.lock().login_token = token;
    }

    pub(crate) fn fail_logout(&self) {
        self.state.lock().fail_logout = true;
    }

    pub(crate) fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().clone()
    }

    pub(crate) fn count(&self, path: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.path == path).count()
    }

    pub(crate) fn refresh_calls(&self) -> usize {
        self.count("/auth/refresh")
    }

    async fn handle(&self, request: ApiRequest) -> Result<ApiResponse, TransportError> {
        let authorization = request.headers.get(AUTHORIZATION).map(String::from);
        self.requests.lock().push(RecordedRequest {
            path: request.path.clone(),
            authorization: authorization.clone(),
        });

        match self.endpoints.classify(&request.path) {
            Some(AuthEndpoint::Refresh) => self.refresh().await,
            Some(AuthEndpoint::Login) => Ok(self.login(&request)),
            Some(AuthEndpoint::Logout) => self.logout(),
            Some(AuthEndpoint::Me) => Ok(if self.authorized(authorization.as_deref()) {
                ok(json!({"userSeq": 1, "name": "Kim", "roles": ["ADMIN"], "licenseSeq": 4}))
            } else {
                unauthorized()
            }),
            None => self.protected(&request.path, authorization.as_deref()),
        }
    }

    fn authorized(&self, authorization: Option<&str>) -> bool {
        let state = self.state.lock();
        match (&state.valid_token, authorization) {
            (Some(valid), Some(header)) => header == format!("Bearer {valid}"),
            _ => false,
        }
    }

    fn protected(
        &self,
        path: &str,
        authorization: Option<&str>,
    ) -> Result<ApiResponse, TransportError> {
        match path {
            "/always-401" => Ok(unauthorized()),
            "/server-error" => Ok(failure(500, 50000, "boom")),
            "/bad-request" => Ok(failure(400, 40001, "name is required")),
            "/unreachable" => Err(TransportError::ConnectionFailed("refused".to_string())),
            _ if self.authorized(authorization) => Ok(ok(json!({ "path": path }))),
            _ => Ok(unauthorized()),
        }
    }

    async fn refresh(&self) -> Result<ApiResponse, TransportError> {
        let delay = self.state.lock().refresh_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let script = self.state.lock().refresh.clone();
        match script {
            RefreshScript::Issue(token) => {
                self.accept_token(Some(token));
                Ok(ok(json!({ "accessToken": token })))
            }
            RefreshScript::Reject { status, code } => Ok(failure(status, code, "refresh rejected")),
            RefreshScript::Malformed => Ok(ok(json!({}))),
            RefreshScript::Raw(body) => Ok(ApiResponse::json_body(200, &body)),
            RefreshScript::Unreachable => {
                Err(TransportError::ConnectionFailed("refused".to_string()))
            }
            RefreshScript::Hang => std::future::pending().await,
        }
    }

    fn login(&self, request: &ApiRequest) -> ApiResponse {
        let password = request
            .body
            .as_ref()
            .and_then(|b| b.get("password"))
            .and_then(|p| p.as_str());
        if password != Some("secret") {
            return failure(401, 40112, "invalid password");
        }
        let token = self.state.lock().login_token;
        if let Some(token) = token {
            self.accept_token(Some(token));
        }
        ok(json!({
            "userSeq": 1,
            "name": "Kim",
            "roles": ["ADMIN"],
            "licenseSeq": 4,
            "jwtTokenRes": token.map(|t| json!({ "accessToken": t })),
        }))
    }

    fn logout(&self) -> Result<ApiResponse, TransportError> {
        if self.state.lock().fail_logout {
            return Err(TransportError::ConnectionFailed("refused".to_string()));
        }
        self.accept_token(None);
        Ok(ApiResponse::json_body(200, &json!({ "success": true })))
    }
}

impl HttpTransport for FakeBackend {
    fn execute(
        &self,
        request: &ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + Send + '_>> {
        let request = request.clone();
        Box::pin(self.handle(request))
    }
}

fn ok(data: serde_json::Value) -> ApiResponse {
    ApiResponse::json_body(200, &json!({ "success": true, "data": data }))
}

fn failure(status: u16, code: i64, message: &str) -> ApiResponse {
    ApiResponse::json_body(
        status,
        &json!({ "success": false, "code": code, "message": message }),
    )
}

fn unauthorized() -> ApiResponse {
    failure(401, 40110, "unauthorized")
}

/// Clock advanced by hand.
pub(crate) struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Utc::now()),
        })
    }

    pub(crate) fn advance_ms(&self, millis: i64) {
        *self.now.lock() += TimeDelta::milliseconds(millis);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Session core wired around a fake backend.
pub(crate) struct Harness {
    pub backend: Arc<FakeBackend>,
    pub store: TokenStore,
    pub events: SessionEvents,
    pub coordinator: RefreshCoordinator,
    pub pipeline: RequestPipeline,
    pub clock: Arc<ManualClock>,
    ended: Arc<Mutex<Vec<crate::auth::SessionEndReason>>>,
    transitions: Arc<Mutex<HashMap<bool, usize>>>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_timeout(Duration::from_secs(2))
    }

    pub(crate) fn with_timeout(timeout: Duration) -> Self {
        let backend = FakeBackend::new();
        let store = TokenStore::new();
        let events = SessionEvents::new();
        let clock = ManualClock::new();
        let injector = CredentialInjector::new(AuthEndpointSet::default(), store.clone());
        let transport: Arc<dyn HttpTransport> = backend.clone();
        let coordinator = RefreshCoordinator::new(
            Arc::clone(&transport),
            injector.clone(),
            events.clone(),
            clock.clone(),
            timeout,
        );
        let pipeline = RequestPipeline::new(transport, injector, coordinator.clone());

        let ended = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&ended);
        events.on_session_ended(move |event| sink.lock().push(event.reason.clone()));

        let transitions = Arc::new(Mutex::new(HashMap::new()));
        let counter = Arc::clone(&transitions);
        store.subscribe(move |session| {
            *counter.lock().entry(session.is_authenticated()).or_insert(0) += 1;
        });

        Self {
            backend,
            store,
            events,
            coordinator,
            pipeline,
            clock,
            ended,
            transitions,
        }
    }

    /// Holds `token` in the store and makes the backend accept `accepted`.
    pub(crate) fn with_session(self, token: &str, accepted: Option<&str>) -> Self {
        self.store.set(Some(elim_domain::AccessToken::new(token)));
        self.backend.accept_token(accepted);
        self.transitions.lock().clear();
        self
    }

    pub(crate) fn ended(&self) -> Vec<crate::auth::SessionEndReason> {
        self.ended.lock().clone()
    }

    /// How many times the store transitioned to "no token".
    pub(crate) fn cleared_count(&self) -> usize {
        self.transitions.lock().get(&false).copied().unwrap_or(0)
    }
}
