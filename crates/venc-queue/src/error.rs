//! Queue client error types.

use thiserror::Error;

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Longest response body kept in an error message.
const MAX_BODY_CHARS: usize = 500;

/// Errors that can occur while talking to the queue backend.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{endpoint} returned HTTP {status}: {body}")]
    Status {
        status: u16,
        endpoint: String,
        body: String,
    },

    #[error("Invalid response from {endpoint}: {message}")]
    InvalidResponse { endpoint: String, message: String },
}

impl QueueError {
    pub fn status(status: u16, endpoint: impl Into<String>, body: impl Into<String>) -> Self {
        let body: String = body.into();
        Self::Status {
            status,
            endpoint: endpoint.into(),
            body: body.chars().take(MAX_BODY_CHARS).collect(),
        }
    }

    pub fn invalid_response(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// HTTP status of a rejected request.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            QueueError::Status { status, .. } => Some(*status),
            QueueError::Network(e) => e.status().map(|s| s.as_u16()),
            QueueError::InvalidResponse { .. } => None,
        }
    }

    /// Check if the request is worth repeating.
    ///
    /// Transport failures, 408, 429 and 5xx are transient. Malformed
    /// responses and other statuses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            QueueError::Network(e) => !(e.is_decode() || e.is_builder() || e.is_redirect()),
            QueueError::Status { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            QueueError::InvalidResponse { .. } => false,
        }
    }

    /// Connection could not be established or timed out.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, QueueError::Network(e) if e.is_connect() || e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_statuses() {
        for status in [500, 502, 503, 504, 408, 429] {
            assert!(QueueError::status(status, "x", "").is_transient(), "{}", status);
        }
        for status in [400, 401, 403, 404, 409, 422, 302] {
            assert!(!QueueError::status(status, "x", "").is_transient(), "{}", status);
        }
    }

    #[test]
    fn test_body_truncated() {
        let err = QueueError::status(500, "stats", "x".repeat(2000));
        match err {
            QueueError::Status { body, .. } => assert_eq!(body.len(), MAX_BODY_CHARS),
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_invalid_response_not_transient() {
        let err = QueueError::invalid_response("next-pending", "missing video_code");
        assert!(!err.is_transient());
        assert_eq!(err.http_status(), None);
    }
}
