//! Error types for the chat-api crate.

/// Errors returned by chat service requests.
///
/// `Clone` so a single failure can be reported to an error callback and
/// logged without re-creating it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// The request could not be sent or the connection failed
    #[error("Network error: {0}")]
    Network(String),

    /// The request did not complete in time
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// The server rejected the credential
    #[error("Unauthorized: the current token was rejected")]
    Unauthorized,

    /// The server answered with a non-success status
    #[error("HTTP {status}: {message}")]
    Http {
        /// HTTP status code
        status: u16,
        /// Message reported by the service, or the raw body
        message: String,
    },

    /// The response body did not match the expected schema
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The client configuration is unusable
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Whether retrying the same request later may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) | ApiError::Timeout(_) | ApiError::Unauthorized => true,
            ApiError::Http { status, .. } => *status >= 500 || *status == 429,
            ApiError::Decode(_) | ApiError::InvalidConfig(_) => false,
        }
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Timeout(e.to_string())
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else {
            ApiError::Network(e.to_string())
        }
    }
}

/// Convenience type alias for Results using ApiError.
pub type Result<T> = std::result::Result<T, ApiError>;
