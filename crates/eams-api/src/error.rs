//! Client error types.

use thiserror::Error;

/// Result type alias for client operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors returned by the course-selection client.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, TLS, or timeout failure before a response arrived.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-200 response that is not an authentication failure.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The envelope carried a non-zero result code.
    #[error("remote rejected request (code {code}): {message}")]
    RemoteRejected { code: i64, message: String },

    /// Session cookies are missing or no longer accepted.
    #[error("session expired (HTTP {status})")]
    AuthExpired { status: u16 },

    /// The body was not the expected envelope or payload shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("invalid header {name}: {reason}")]
    InvalidHeader { name: String, reason: String },
}

impl ApiError {
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, ApiError::AuthExpired { .. })
    }

    /// Classify a non-200 status. Login redirects count as expiry since
    /// the portal bounces stale sessions to its SSO page.
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
            || status.is_redirection()
        {
            ApiError::AuthExpired {
                status: status.as_u16(),
            }
        } else {
            ApiError::Status {
                status: status.as_u16(),
                body,
            }
        }
    }
}
