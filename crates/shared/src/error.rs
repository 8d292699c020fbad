//! Error types for the remote API clients.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection failed, timed out, or the body could not be read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx response other than the ones below
    #[error("API returned {status}: {message}")]
    Status { status: u16, message: String },

    /// 429 Too Many Requests
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// 404 for a single entity
    #[error("not found: {0}")]
    NotFound(String),

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Parse(String),
}

impl ApiError {
    /// Whether another attempt could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::RateLimited(_) => true,
            ApiError::NotFound(_) | ApiError::Parse(_) => false,
        }
    }

    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ApiError::RateLimited(_))
    }

    /// Map a non-success status and its body onto the error taxonomy.
    pub fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        match status.as_u16() {
            404 => ApiError::NotFound(body),
            429 => ApiError::RateLimited(body),
            code => ApiError::Status {
                status: code,
                message: body,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_server_errors_are_transient() {
        let err = ApiError::from_status(StatusCode::BAD_GATEWAY, "upstream".into());
        assert!(err.is_transient());
        assert!(!err.is_rate_limit());
    }

    #[test]
    fn test_rate_limit_is_transient() {
        let err = ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, "slow down".into());
        assert!(err.is_transient());
        assert!(err.is_rate_limit());
    }

    #[test]
    fn test_not_found_is_permanent() {
        let err = ApiError::from_status(StatusCode::NOT_FOUND, "gone".into());
        assert!(matches!(err, ApiError::NotFound(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_bad_request_is_permanent() {
        let err = ApiError::from_status(StatusCode::BAD_REQUEST, "bad offset".into());
        assert!(matches!(err, ApiError::Status { status: 400, .. }));
        assert!(!err.is_transient());
    }
}
