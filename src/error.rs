use std::time::Duration;

use thiserror::Error;

/// Failure of a single backend request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    Http,
    Decode,
    NotFound,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Timeout(_) => ErrorKind::Timeout,
            ApiError::Http { .. } => ErrorKind::Http,
            ApiError::Decode(_) => ErrorKind::Decode,
            ApiError::NotFound(_) => ErrorKind::NotFound,
        }
    }

    /// Network failures, timeouts and 5xx/429 responses may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) => true,
            ApiError::Http { status, .. } => *status >= 500 || *status == 429,
            ApiError::Decode(_) | ApiError::NotFound(_) => false,
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
