//! Login, logout and "who am I" flows.

use std::sync::{Arc, Weak};

use elim_domain::{
    ApiRequest, AuthEndpoint, AuthEndpointSet, CurrentUser, LoginCredentials, LoginPayload,
    MePayload,
};
use parking_lot::RwLock;
use serde_json::json;
use tracing::{info, warn};

use super::events::SessionEndReason;
use super::listeners::SubscriptionId;
use super::pipeline::decode_envelope;
use super::{RefreshCoordinator, RequestPipeline};
use crate::error::{ClientError, ClientResult};

/// Explicit session flows on top of the request pipeline.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    pipeline: RequestPipeline,
    current_user: RwLock<Option<CurrentUser>>,
    subscription: SubscriptionId,
}

impl AuthService {
    /// Creates the service. The current user is forgotten whenever the
    /// session ends.
    #[must_use]
    pub fn new(pipeline: RequestPipeline) -> Self {
        let inner = Arc::new_cyclic(|weak: &Weak<ServiceInner>| {
            let weak = weak.clone();
            let subscription = pipeline.coordinator().events().on_session_ended(move |_| {
                if let Some(service) = weak.upgrade() {
                    *service.current_user.write() = None;
                }
            });
            ServiceInner {
                pipeline,
                current_user: RwLock::new(None),
                subscription,
            }
        });
        Self { inner }
    }

    /// Logs in and installs the returned access token.
    ///
    /// # Errors
    /// - `AuthEndpoint` when the credentials are refused;
    /// - `MissingToken` when the response carried no token;
    /// - `InvalidResponse` when the body could not be decoded;
    /// - `Network` when the server could not be reached.
    pub async fn login(&self, credentials: &LoginCredentials) -> ClientResult<CurrentUser> {
        let request = ApiRequest::post(self.endpoints().login_path.clone()).with_json(json!({
            "email": credentials.email,
            "password": credentials.password,
        }));
        let response = self.inner.pipeline.send(request).await?;

        let envelope = decode_envelope::<LoginPayload>(&response)?;
        if !envelope.success {
            return Err(ClientError::AuthEndpoint {
                endpoint: AuthEndpoint::Login,
                status: response.status,
                code: envelope.code(),
                message: envelope.message(),
            });
        }
        let payload = envelope
            .into_data()
            .ok_or_else(|| ClientError::InvalidResponse("login response carried no data".to_string()))?;
        let token = payload.access_token().ok_or(ClientError::MissingToken)?;

        let user = payload.current_user();
        self.coordinator().begin_session(token);
        *self.inner.current_user.write() = Some(user.clone());
        info!(user_id = user.user_id, role = ?user.role, "logged in");
        Ok(user)
    }

    /// Logs out. Always ends the local session, even when the server call
    /// fails.
    pub async fn logout(&self) {
        let request = ApiRequest::post(self.endpoints().logout_path.clone());
        if let Err(error) = self.inner.pipeline.send(request).await {
            warn!(error = %error, code = error.code(), "logout request failed");
        }
        *self.inner.current_user.write() = None;
        self.coordinator().end_session(SessionEndReason::LoggedOut);
    }

    /// Resumes a session from the refresh-token cookie and loads the user.
    ///
    /// # Errors
    /// Returns `SessionExpired` when no session could be resumed.
    pub async fn resume(&self) -> ClientResult<Option<CurrentUser>> {
        self.coordinator()
            .refresh()
            .await
            .map_err(|failure| ClientError::SessionExpired {
                reason: SessionEndReason::RefreshFailed(failure),
            })?;

        if self.current_user().is_none() {
            if let Err(error) = self.load_current_user().await {
                warn!(error = %error, "could not load current user");
            }
        }
        Ok(self.current_user())
    }

    /// Fetches the logged-in user from the server and remembers it.
    ///
    /// # Errors
    /// Returns the pipeline error, or `InvalidResponse` for an unexpected body.
    pub async fn load_current_user(&self) -> ClientResult<CurrentUser> {
        let request = ApiRequest::get(self.endpoints().me_path.clone());
        let me: MePayload = self.inner.pipeline.send_json(request).await?;
        let user = CurrentUser::from(me);
        *self.inner.current_user.write() = Some(user.clone());
        Ok(user)
    }

    /// The user recorded by the last login or `load_current_user`.
    #[must_use]
    pub fn current_user(&self) -> Option<CurrentUser> {
        self.inner.current_user.read().clone()
    }

    fn coordinator(&self) -> &RefreshCoordinator {
        self.inner.pipeline.coordinator()
    }

    fn endpoints(&self) -> &AuthEndpointSet {
        self.inner.pipeline.endpoints()
    }
}

impl Drop for ServiceInner {
    fn drop(&mut self) {
        self.pipeline.coordinator().events().remove(self.subscription);
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("current_user", &self.current_user())
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
    use pretty_assertions::assert_eq;

    fn service(h: &Harness) -> AuthService {
        AuthService::new(h.pipeline.clone())
    }

    fn kim() -> CurrentUser {
        CurrentUser {
            user_id: 1,
            name: "Kim".to_string(),
            role: Some("ADMIN".to_string()),
            license_seq: Some(4),
        }
    }

    #[tokio::test]
    async fn test_login_installs_token_and_user() {
        let h = Harness::new();
        let auth = service(&h);

        let user = auth
            .login(&LoginCredentials::new("kim@example.com", "secret"))
            .await
            .unwrap();

        assert_eq!(user, kim());
        assert_eq!(auth.current_user(), Some(kim()));
        assert_eq!(h.store.access_token(), Some(AccessToken::new("T-login")));

        let data: serde_json::Value = h.pipeline.send_json(ApiRequest::get("/projects")).await.unwrap();
        assert_eq!(data["path"], "/projects");
    }

    #[tokio::test]
    async fn test_login_with_wrong_password() {
        let h = Harness::new();
        let auth = service(&h);

        let error = auth
            .login(&LoginCredentials::new("kim@example.com", "wrong"))
            .await
            .unwrap_err();

        assert!(matches!(
            error,
            ClientError::AuthEndpoint {
                endpoint: AuthEndpoint::Login,
                code: Some(codes::INVALID_PASSWORD),
                ..
            }
        ));
        assert_eq!(h.store.access_token(), None);
        assert_eq!(h.backend.refresh_calls(), 0);
    }

    #[tokio::test]
    async fn test_login_without_token() {
        let h = Harness::new();
        h.backend.login_issues(None);
        let auth = service(&h);

        let error = auth
            .login(&LoginCredentials::new("kim@example.com", "secret"))
            .await
            .unwrap_err();

        assert_eq!(error, ClientError::MissingToken);
        assert_eq!(auth.current_user(), None);
    }

    #[tokio::test]
    async fn test_logout_clears_session_even_when_server_fails() {
        let h = Harness::new();
        let auth = service(&h);
        auth.login(&LoginCredentials::new("kim@example.com", "secret"))
            .await
            .unwrap();
        h.backend.fail_logout();

        auth.logout().await;

        assert_eq!(h.store.access_token(), None);
        assert_eq!(auth.current_user(), None);
        assert_eq!(h.ended(), vec![SessionEndReason::LoggedOut]);
    }

    #[tokio::test]
    async fn test_logout_sends_bearer_token() {
        let h = Harness::new().with_session("T1", Some("T1"));
        let auth = service(&h);

        auth.logout().await;

        let logout = h
            .backend
            .requests()
            .into_iter()
            .find(|r| r.path == "/auth/logout")
            .unwrap();
        assert_eq!(logout.authorization.as_deref(), Some("Bearer T1"));
    }

    #[tokio::test]
    async fn test_resume_refreshes_and_loads_user() {
        let h = Harness::new();
        let auth = service(&h);

        let user = auth.resume().await.unwrap();

        assert_eq!(user, Some(kim()));
        assert_eq!(h.store.access_token(), Some(AccessToken::new("T2")));
        assert_eq!(h.backend.count("/auth/me"), 1);
    }

    #[tokio::test]
    async fn test_resume_without_cookie() {
        let h = Harness::new();
        h.backend.script_refresh(RefreshScript::Reject {
            status: 401,
            code: codes::NO_REFRESH_TOKEN,
        });
        let auth = service(&h);

        let error = auth.resume().await.unwrap_err();

        assert!(error.is_session_expired());
        assert_eq!(error.code(), codes::NO_REFRESH_TOKEN);
        assert_eq!(h.backend.count("/auth/me"), 0);
    }

    #[tokio::test]
    async fn test_session_end_forgets_user() {
        let h = Harness::new();
        let auth = service(&h);
        auth.login(&LoginCredentials::new("kim@example.com", "secret"))
            .await
            .unwrap();

        h.coordinator.end_session(SessionEndReason::ForcedRelogin);

        assert_eq!(auth.current_user(), None);
    }
}
