use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("API error: {0}")]
    Api(#[from] chat_api::ApiError),

    #[error("Poller error: {0}")]
    Poller(#[from] chat_stream::PollerError),

    #[error("Token refresh failed: {0}")]
    Auth(#[from] chat_auth::AuthError),

    #[error("Logging error: {0}")]
    Logging(#[from] crate::logging::LoggingError),

    #[error("No token refresher configured for this session")]
    RefreshUnavailable,

    #[error("Proactive refresh period must be greater than zero")]
    InvalidRefreshPeriod,

    #[error("No tokio runtime available for background tasks")]
    NoRuntime,
}

pub type Result<T> = std::result::Result<T, SessionError>;
