//! Attaches the bearer token to outgoing requests.

use elim_domain::request::AUTHORIZATION;
use elim_domain::{AccessToken, ApiRequest, AuthEndpointSet};

use super::TokenStore;

/// Decorates requests with the current access token.
///
/// Rules:
/// - the refresh endpoint never carries `Authorization`, even when a token is held;
/// - every other request carries `Authorization: Bearer <token>` when a token is held;
/// - without a token the header is removed entirely.
#[derive(Debug, Clone)]
pub struct CredentialInjector {
    endpoints: AuthEndpointSet,
    store: TokenStore,
}

impl CredentialInjector {
    /// Creates an injector reading from `store`.
    #[must_use]
    pub const fn new(endpoints: AuthEndpointSet, store: TokenStore) -> Self {
        Self { endpoints, store }
    }

    /// Returns the auth endpoint set.
    #[must_use]
    pub const fn endpoints(&self) -> &AuthEndpointSet {
        &self.endpoints
    }

    /// Returns the store tokens are read from.
    #[must_use]
    pub const fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Decorates `request` with whatever token the store holds right now.
    #[must_use]
    pub fn decorate(&self, request: ApiRequest) -> ApiRequest {
        let token = self.store.access_token();
        self.decorate_with(request, token.as_ref())
    }

    /// Decorates `request` with an explicit token snapshot.
    #[must_use]
    pub fn decorate_with(&self, mut request: ApiRequest, token: Option<&AccessToken>) -> ApiRequest {
        if self.endpoints.is_refresh(&request.path) {
            request.headers.remove(AUTHORIZATION);
            return request;
        }

        match token {
            Some(token) => request.headers.set(AUTHORIZATION, token.bearer()),
            None => {
                request.headers.remove(AUTHORIZATION);
            }
        }
        request
    }
}
