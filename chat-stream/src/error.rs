//! Error types for the chat-stream crate.

/// Errors that can occur while managing room poll loops.
///
/// Fetch failures are not errors at this level: they are logged, reported to
/// the room's error callback and retried on the next tick.
#[derive(Debug, thiserror::Error)]
pub enum PollerError {
    /// A poll interval of zero was requested
    #[error("Poll interval must be greater than zero")]
    InvalidInterval,

    /// The configured room limit has been reached
    #[error("Too many rooms polled concurrently (max {max_rooms})")]
    TooManyRooms {
        /// The configured maximum
        max_rooms: usize,
    },

    /// A poll loop was started outside a tokio runtime
    #[error("No tokio runtime available to run the poll loop")]
    NoRuntime,

    /// A poll loop did not shut down cleanly
    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}

/// Convenience type alias for Results using PollerError.
pub type Result<T> = std::result::Result<T, PollerError>;
