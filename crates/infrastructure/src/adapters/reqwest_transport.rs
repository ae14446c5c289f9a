//! HTTP transport implemented with reqwest.
//!
//! The client keeps a cookie store so the refresh-token cookie set by the
//! login endpoint is sent back to the refresh endpoint automatically.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use elim_application::ports::{HttpTransport, TransportError};
use elim_domain::{ApiRequest, ApiResponse, HttpMethod, TransportSettings};
use reqwest::{Client, Method, Url};

/// Maximum redirects followed before giving up.
const MAX_REDIRECTS: usize = 10;

/// `HttpTransport` backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    base_url: Url,
    timeout_ms: u64,
}

impl ReqwestTransport {
    /// Creates a transport for the configured backend.
    ///
    /// # Errors
    ///
    /// Returns `InvalidUrl` for an unusable base URL and `Other` when the
    /// client cannot be built.
    pub fn new(settings: &TransportSettings) -> Result<Self, TransportError> {
        let base_url = settings
            .base_url()
            .map_err(|e| TransportError::InvalidUrl(e.to_string()))?;
        let client = Client::builder()
            .user_agent(settings.user_agent.as_str())
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .build()
            .map_err(|e| TransportError::Other(e.to_string()))?;

        Ok(Self::with_client(client, base_url, settings.timeout_ms))
    }

    /// Creates a transport around an existing client.
    #[must_use]
    pub const fn with_client(client: Client, base_url: Url, timeout_ms: u64) -> Self {
        Self {
            client,
            base_url,
            timeout_ms,
        }
    }

    /// The base URL request paths are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    const fn to_reqwest_method(method: HttpMethod) -> Method {
        match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Patch => Method::PATCH,
            HttpMethod::Delete => Method::DELETE,
        }
    }

    /// Appends the request path to the base URL, which may carry a path
    /// prefix such as `/api`. Absolute URLs are used as they are.
    fn resolve(&self, request: &ApiRequest) -> Result<Url, TransportError> {
        let target = if request.path.starts_with("http://") || request.path.starts_with("https://")
        {
            request.path.clone()
        } else {
            let base = self.base_url.as_str().trim_end_matches('/');
            let path = request.path.trim_start_matches('/');
            format!("{base}/{path}")
        };

        let mut url =
            Url::parse(&target).map_err(|e| TransportError::InvalidUrl(format!("{e}: {target}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }
        Ok(url)
    }

    fn map_error(error: &reqwest::Error, timeout_ms: u64) -> TransportError {
        if error.is_timeout() {
            return TransportError::Timeout { timeout_ms };
        }

        let host = || {
            error
                .url()
                .and_then(Url::host_str)
                .unwrap_or("unknown")
                .to_string()
        };

        if error.is_connect() {
            let message = error.to_string();
            let lower = message.to_lowercase();
            if lower.contains("dns") || lower.contains("resolve") {
                return TransportError::DnsError {
                    host: host(),
                    message,
                };
            }
            if lower.contains("refused") {
                return TransportError::ConnectionRefused {
                    host: host(),
                    port: error
                        .url()
                        .and_then(Url::port_or_known_default)
                        .unwrap_or(80),
                };
            }
            return TransportError::ConnectionFailed(message);
        }

        if error.is_redirect() {
            return TransportError::Other(format!("more than {MAX_REDIRECTS} redirects"));
        }

        TransportError::Other(error.to_string())
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(
        &self,
        request: &ApiRequest,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse, TransportError>> + Send + '_>> {
        let url = self.resolve(request);
        let method = request.method;
        let headers: Vec<_> = request
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();
        let body = request.body.clone();
        let timeout_ms = request.timeout_ms.unwrap_or(self.timeout_ms);

        Box::pin(async move {
            let url = url?;
            let start = Instant::now();

            let mut builder = self
                .client
                .request(Self::to_reqwest_method(method), url)
                .timeout(Duration::from_millis(timeout_ms));
            for (name, value) in &headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(|e| Self::map_error(&e, timeout_ms))?;

            let status = response.status().as_u16();
            let response_headers: HashMap<String, String> = response
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("<binary>").to_string()))
                .collect();
            let body_bytes = response
                .bytes()
                .await
                .map_err(|e| TransportError::Other(format!("failed to read body: {e}")))?
                .to_vec();

            Ok(ApiResponse::new(
                status,
                response_headers,
                body_bytes,
                start.elapsed(),
            ))
        })
    }
}
