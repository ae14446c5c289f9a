//! Response received from the transport.

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;

use super::{ApiEnvelope, StatusCode};
use crate::error::{DomainError, DomainResult};

/// HTTP response as seen by the session core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers, names lower-cased.
    pub headers: HashMap<String, String>,
    /// Raw body.
    pub body: Vec<u8>,
    /// Round-trip time.
    pub duration: Duration,
}

impl ApiResponse {
    /// Creates a response from raw parts.
    #[must_use]
    pub fn new(
        status: impl Into<StatusCode>,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        duration: Duration,
    ) -> Self {
        Self {
            status: status.into(),
            headers: headers
                .into_iter()
                .map(|(k, v)| (k.to_ascii_lowercase(), v))
                .collect(),
            body,
            duration,
        }
    }

    /// Creates a response with a JSON body and no headers.
    #[must_use]
    pub fn json_body(status: impl Into<StatusCode>, body: &serde_json::Value) -> Self {
        let mut headers = HashMap::new();
        headers.insert("content-type".to_string(), "application/json".to_string());
        Self::new(status, headers, body.to_string().into_bytes(), Duration::ZERO)
    }

    /// Returns true for a 2xx status.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns a header value by (case-insensitive) name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// Returns the body as lossy UTF-8.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decodes the body as JSON.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidBody` when the body is not valid JSON for `T`.
    pub fn json<T: DeserializeOwned>(&self) -> DomainResult<T> {
        serde_json::from_slice(&self.body).map_err(|e| DomainError::InvalidBody(e.to_string()))
    }

    /// Decodes the body as a backend envelope.
    ///
    /// # Errors
    /// Returns `DomainError::InvalidBody` when the body is not an envelope.
    pub fn envelope<T: DeserializeOwned>(&self) -> DomainResult<ApiEnvelope<T>> {
        self.json()
    }

    /// Best-effort extraction of `(code, message)` from an error body.
    #[must_use]
    pub fn error_details(&self) -> (Option<i64>, Option<String>) {
        match self.envelope::<serde_json::Value>() {
            Ok(envelope) => (envelope.code(), envelope.message()),
            Err(_) => (None, None),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_headers_are_case_insensitive() {
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        let response = ApiResponse::new(200, headers, Vec::new(), Duration::ZERO);

        assert_eq!(response.header("content-type"), Some("application/json"));
        assert_eq!(response.header("CONTENT-TYPE"), Some("application/json"));
    }

    #[test]
    fn test_envelope_decoding() {
        let response = ApiResponse::json_body(
            200,
            &json!({"success": true, "data": {"accessToken": "abc"}}),
        );
        let envelope = response.envelope::<serde_json::Value>().unwrap();

        assert!(envelope.success);
        assert_eq!(envelope.data, Some(json!({"accessToken": "abc"})));
    }

    #[test]
    fn test_error_details() {
        let response = ApiResponse::json_body(
            401,
            &json!({"success": false, "message": "expired", "code": 40119}),
        );
        assert_eq!(
            response.error_details(),
            (Some(40119), Some("expired".to_string()))
        );

        let null_message = ApiResponse::json_body(
            401,
            &json!({"success": false, "message": null, "code": 40116}),
        );
        assert_eq!(null_message.error_details(), (Some(40116), None));

        let html = ApiResponse::new(502, HashMap::new(), b"<html>".to_vec(), Duration::ZERO);
        assert_eq!(html.error_details(), (None, None));
    }

    #[test]
    fn test_invalid_json_body() {
        let response = ApiResponse::new(200, HashMap::new(), b"not json".to_vec(), Duration::ZERO);
        assert!(matches!(
            response.json::<serde_json::Value>(),
            Err(DomainError::InvalidBody(_))
        ));
    }
}
