//! Authenticated request pipeline.
//!
//! Sends a request with the current token and, when a protected call comes
//! back 401, obtains a replacement token through the refresh coordinator and
//! replays the request exactly once.

use std::fmt;
use std::sync::Arc;

use elim_domain::{
    AccessToken, ApiEnvelope, ApiRequest, ApiResponse, AuthEndpoint, AuthEndpointSet,
};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::events::SessionEndReason;
use super::{CredentialInjector, RefreshCoordinator};
use crate::error::{ClientError, ClientResult};
use crate::ports::HttpTransport;

/// A request travelling through the pipeline.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    original: ApiRequest,
    retry_count: u8,
}

impl PendingRequest {
    /// Replays allowed after a 401.
    pub const MAX_RETRIES: u8 = 1;

    /// Wraps a request that has not been sent yet.
    #[must_use]
    pub const fn new(original: ApiRequest) -> Self {
        Self {
            original,
            retry_count: 0,
        }
    }

    /// The request as the caller built it, without credentials.
    #[must_use]
    pub const fn original(&self) -> &ApiRequest {
        &self.original
    }

    /// How many times the request has been replayed.
    #[must_use]
    pub const fn retry_count(&self) -> u8 {
        self.retry_count
    }

    /// Returns true while a replay is still allowed.
    #[must_use]
    pub const fn can_retry(&self) -> bool {
        self.retry_count < Self::MAX_RETRIES
    }

    /// Records a replay. Never exceeds `MAX_RETRIES`.
    pub fn mark_retried(&mut self) {
        self.retry_count = self.retry_count.saturating_add(1).min(Self::MAX_RETRIES);
    }
}

/// Sends requests with credentials and recovers from expired tokens.
#[derive(Clone)]
pub struct RequestPipeline {
    transport: Arc<dyn HttpTransport>,
    injector: CredentialInjector,
    coordinator: RefreshCoordinator,
}

impl RequestPipeline {
    /// Creates a pipeline.
    #[must_use]
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        injector: CredentialInjector,
        coordinator: RefreshCoordinator,
    ) -> Self {
        Self {
            transport,
            injector,
            coordinator,
        }
    }

    /// Sends `request` and returns the 2xx response.
    ///
    /// # Errors
    /// - `Network` when no response arrived;
    /// - `AuthEndpoint` for any failing auth endpoint call, 401 included;
    /// - `SessionExpired` when a 401 could not be recovered;
    /// - `Request` for every other non-2xx response.
    pub async fn send(&self, request: ApiRequest) -> ClientResult<ApiResponse> {
        let endpoint = self.injector.endpoints().classify(&request.path);
        let mut pending = PendingRequest::new(request);
        let mut token = self.injector.store().access_token();

        loop {
            let response = self.dispatch(&pending, token.as_ref()).await?;
            if response.is_success() {
                return Ok(response);
            }
            if let Some(endpoint) = endpoint {
                return Err(auth_endpoint_error(endpoint, &response));
            }
            if !response.status.is_unauthorized() {
                return Err(request_error(&response));
            }

            if !pending.can_retry() {
                warn!(
                    request_id = %pending.original().id,
                    path = %pending.original().path,
                    "replayed request rejected again"
                );
                if let Some(rejected) = &token {
                    self.coordinator.expire_rejected(rejected);
                }
                return Err(ClientError::SessionExpired {
                    reason: SessionEndReason::TokenRejected,
                });
            }

            match self.coordinator.refresh_after_rejection(token.as_ref()).await {
                Ok(fresh) => {
                    pending.mark_retried();
                    token = Some(fresh);
                }
                Err(failure) => {
                    return Err(ClientError::SessionExpired {
                        reason: SessionEndReason::RefreshFailed(failure),
                    });
                }
            }
        }
    }

    /// Sends `request` and decodes the `data` of the response envelope.
    ///
    /// # Errors
    /// Everything `send` returns, plus `Request` for a `success: false`
    /// envelope and `InvalidResponse` for a body that does not decode.
    pub async fn send_json<T: DeserializeOwned>(&self, request: ApiRequest) -> ClientResult<T> {
        let response = self.send(request).await?;
        let envelope = decode_envelope::<T>(&response)?;
        if !envelope.success {
            return Err(ClientError::Request {
                status: response.status,
                code: envelope.code(),
                message: envelope.message(),
            });
        }
        envelope
            .into_data()
            .ok_or_else(|| ClientError::InvalidResponse("response carried no data".to_string()))
    }

    /// The refresh coordinator used on 401.
    #[must_use]
    pub const fn coordinator(&self) -> &RefreshCoordinator {
        &self.coordinator
    }

    /// The auth endpoint set requests are classified against.
    #[must_use]
    pub const fn endpoints(&self) -> &AuthEndpointSet {
        self.injector.endpoints()
    }

    async fn dispatch(
        &self,
        pending: &PendingRequest,
        token: Option<&AccessToken>,
    ) -> ClientResult<ApiResponse> {
        let outgoing = self
            .injector
            .decorate_with(pending.original().clone(), token);
        debug!(
            request_id = %outgoing.id,
            method = %outgoing.method,
            path = %outgoing.path,
            retry = pending.retry_count(),
            "sending request"
        );
        let response = self.transport.execute(&outgoing).await?;
        debug!(
            request_id = %outgoing.id,
            status = %response.status,
            elapsed_ms = response.duration.as_millis(),
            "response received"
        );
        Ok(response)
    }
}

impl fmt::Debug for RequestPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestPipeline")
            .field("endpoints", self.injector.endpoints())
            .finish_non_exhaustive()
    }
}

/// Decodes the backend envelope of a 2xx response.
pub(crate) fn decode_envelope<T: DeserializeOwned>(
    response: &ApiResponse,
) -> ClientResult<ApiEnvelope<T>> {
    response
        .envelope::<T>()
        .map_err(|e| ClientError::InvalidResponse(e.to_string()))
}

fn auth_endpoint_error(endpoint: AuthEndpoint, response: &ApiResponse) -> ClientError {
    let (code, message) = response.error_details();
    ClientError::AuthEndpoint {
        endpoint,
        status: response.status,
        code,
        message,
    }
}

fn request_error(response: &ApiResponse) -> ClientError {
    let (code, message) = response.error_details();
    ClientError::Request {
        status: response.status,
        code,
        message,
    }
}
