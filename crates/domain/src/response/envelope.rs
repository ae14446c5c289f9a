//! The `{ success, message, code, data }` wrapper every backend response uses.

use serde::{Deserialize, Serialize};

/// Common backend response wrapper.
///
/// `message` and `code` may be missing or `null`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    /// Whether the backend considers the call successful.
    #[serde(default)]
    pub success: bool,
    /// Human-readable message.
    #[serde(default)]
    pub message: Option<String>,
    /// Backend error code; 0 means none.
    #[serde(default)]
    pub code: Option<i64>,
    /// Payload.
    pub data: Option<T>,
}

impl<T> ApiEnvelope<T> {
    /// Returns the backend code if a non-zero one was sent.
    #[must_use]
    pub fn code(&self) -> Option<i64> {
        self.code.filter(|code| *code != 0)
    }

    /// Returns the message if a non-empty one was sent.
    #[must_use]
    pub fn message(&self) -> Option<String> {
        self.message.clone().filter(|message| !message.is_empty())
    }

    /// Returns the payload of a successful envelope.
    #[must_use]
    pub fn into_data(self) -> Option<T> {
        if self.success { self.data } else { None }
    }
}
