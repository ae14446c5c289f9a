//! HTTP transport port
//!
//! The session core never talks to the network directly; it hands fully
//! decorated requests to an `HttpTransport` and interprets the response.

use std::future::Future;
use std::pin::Pin;

use elim_domain::{ApiRequest, ApiResponse};
use thiserror::Error;

/// Errors raised when no HTTP response was received.
///
/// Cloneable so a single refresh outcome can be handed to every waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The request did not complete within its timeout.
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// The connection could not be established.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The remote host refused the connection.
    #[error("connection refused by {host}:{port}")]
    ConnectionRefused {
        /// Host that refused.
        host: String,
        /// Port that refused.
        port: u16,
    },

    /// Host name resolution failed.
    #[error("DNS resolution failed for {host}: {message}")]
    DnsError {
        /// Host that failed to resolve.
        host: String,
        /// Resolver message.
        message: String,
    },

    /// The target URL is malformed.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The request body could not be encoded.
    #[error("invalid body: {0}")]
    InvalidBody(String),

    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Port for executing HTTP requests.
///
/// Implementations must not hold on to `request` past the synchronous part
/// of `execute`; the returned future may only borrow `self`.
pub trait HttpTransport: Send + Sync {
    /// Sends `request` and returns the response, whatever its status.
    ///
    /// Non-2xx statuses are responses, not errors. Only failures where no
    /// response was received are reported as `TransportError`.
    fn execute(
        &self,
        request: &ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + Send + '_>>;
}
