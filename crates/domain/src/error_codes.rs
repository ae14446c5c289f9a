//! Backend error codes and the messages shown for them.

/// Backend error codes, plus a few client-side codes (negative).
pub mod codes {
    /// 400: request validation failed.
    pub const VALIDATION_FAILED: i64 = 40001;
    /// 401: authentication required.
    pub const UNAUTHORIZED: i64 = 40110;
    /// 401: unknown user.
    pub const USER_NOT_FOUND: i64 = 40111;
    /// 401: wrong password.
    pub const INVALID_PASSWORD: i64 = 40112;
    /// 401: refresh cookie missing.
    pub const NO_REFRESH_TOKEN: i64 = 40114;
    /// 401: refresh token malformed.
    pub const INVALID_REFRESH_TOKEN: i64 = 40115;
    /// 401: refresh token has no server-side row.
    pub const REFRESH_ROW_NOT_FOUND: i64 = 40116;
    /// 401: refresh token belongs to someone else.
    pub const TOKEN_OWNER_MISMATCH: i64 = 40117;
    /// 401: an already-rotated refresh token was presented again.
    pub const REFRESH_TOKEN_REPLAY: i64 = 40118;
    /// 401: refresh token expired.
    pub const REFRESH_TOKEN_EXPIRED: i64 = 40119;
    /// 401: refresh token hash mismatch.
    pub const REFRESH_HASH_MISMATCH: i64 = 40120;
    /// 401: refresh token row id malformed.
    pub const INVALID_TOKEN_ROW_ID: i64 = 40121;
    /// 401: refresh rejected.
    pub const REFRESH_UNAUTHORIZED: i64 = 40122;
    /// 403: CSRF check failed.
    pub const CSRF_FAILED: i64 = 40301;
    /// 403: request origin not allowed.
    pub const CSRF_FORBIDDEN_ORIGIN: i64 = 40302;
    /// 403: account inactive.
    pub const USER_NOT_ACTIVE: i64 = 40311;
    /// 403: account blocked.
    pub const USER_BLOCKED: i64 = 40312;
    /// 403: account has no roles.
    pub const USER_NO_ROLES: i64 = 40313;
    /// 500: server error.
    pub const INTERNAL_ERROR: i64 = 50000;
    /// No response received.
    pub const NETWORK_ERROR: i64 = -1;
    /// Response body could not be decoded.
    pub const INVALID_RESPONSE: i64 = -2;
    /// Login succeeded without an access token.
    pub const MISSING_TOKEN: i64 = -3;
}

/// Returns the user-facing message for a known code.
#[must_use]
pub const fn message_for_code(code: i64) -> Option<&'static str> {
    use codes::*;

    let message = match code {
        VALIDATION_FAILED => "Please check the information you entered.",
        UNAUTHORIZED => "Authentication required. Please log in again.",
        USER_NOT_FOUND => "This user does not exist.",
        INVALID_PASSWORD => "The password does not match.",
        NO_REFRESH_TOKEN | REFRESH_TOKEN_EXPIRED => "Your session has expired. Please log in again.",
        INVALID_REFRESH_TOKEN => "Invalid token. Please log in again.",
        REFRESH_ROW_NOT_FOUND => "Session information not found. Please log in again.",
        TOKEN_OWNER_MISMATCH => "Token information does not match. Please log in again.",
        REFRESH_TOKEN_REPLAY => "Please log in again for security reasons.",
        REFRESH_HASH_MISMATCH => "Token verification failed. Please log in again.",
        INVALID_TOKEN_ROW_ID => "Token information is invalid. Please log in again.",
        REFRESH_UNAUTHORIZED => "Authentication failed. Please log in again.",
        CSRF_FAILED => "Security check failed. Please reload the page.",
        CSRF_FORBIDDEN_ORIGIN => "This request is not allowed.",
        USER_NOT_ACTIVE => "This account is deactivated. Please contact an administrator.",
        USER_BLOCKED => "This account is blocked. Please contact an administrator.",
        USER_NO_ROLES => "You do not have access. Please contact an administrator.",
        INTERNAL_ERROR => "A server error occurred. Please try again later.",
        NETWORK_ERROR => "A network error occurred. Please check your connection.",
        INVALID_RESPONSE => "The server response was malformed.",
        MISSING_TOKEN => "No authentication token was received. Please log in again.",
        _ => return None,
    };
    Some(message)
}

/// Returns a generic message for an HTTP status.
#[must_use]
pub const fn default_message_for_status(status: u16) -> &'static str {
    match status {
        200..=299 => "The request completed successfully.",
        400 => "Bad request.",
        401 => "Authentication required.",
        403 => "You do not have permission to access this.",
        404 => "The requested resource was not found.",
        500.. => "A server error occurred. Please try again later.",
        _ => "An error occurred.",
    }
}

/// Returns true for codes that mean the refresh token itself is unusable.
#[must_use]
pub const fn is_refresh_token_code(code: i64) -> bool {
    matches!(code, codes::NO_REFRESH_TOKEN..=codes::REFRESH_UNAUTHORIZED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_known_code_messages() {
        assert_eq!(
            message_for_code(codes::REFRESH_ROW_NOT_FOUND),
            Some("Session information not found. Please log in again.")
        );
        assert_eq!(message_for_code(12345), None);
    }

    #[test]
    fn test_status_messages() {
        assert_eq!(default_message_for_status(204), "The request completed successfully.");
        assert_eq!(default_message_for_status(503), "A server error occurred. Please try again later.");
        assert_eq!(default_message_for_status(418), "An error occurred.");
    }

    #[test]
    fn test_refresh_token_codes() {
        assert!(is_refresh_token_code(codes::REFRESH_ROW_NOT_FOUND));
        assert!(!is_refresh_token_code(codes::INVALID_PASSWORD));
    }
}
