//! Error types for the chat-auth crate.

/// Errors produced while refreshing a credential.
///
/// The type is `Clone` because a single refresh outcome is handed to every
/// caller that joined the same in-flight attempt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    /// The auth server refused to issue a new token
    #[error("Token refresh rejected: {0}")]
    Rejected(String),

    /// A network error occurred while refreshing
    #[error("Network error during token refresh: {0}")]
    Network(String),

    /// No refresh mechanism is available
    #[error("Token refresh unavailable: {0}")]
    Unavailable(String),

    /// The refresh task ended without producing an outcome
    #[error("Token refresh interrupted: {0}")]
    Interrupted(String),

    /// A periodic refresh was configured with a zero period
    #[error("Refresh period must be non-zero")]
    InvalidPeriod,

    /// A background refresh task was started outside a tokio runtime
    #[error("No tokio runtime available to run the refresh task")]
    NoRuntime,

    /// A background refresh task did not shut down cleanly
    #[error("Shutdown error: {0}")]
    Shutdown(String),
}

/// Convenience type alias for Results using AuthError.
pub type Result<T> = std::result::Result<T, AuthError>;
