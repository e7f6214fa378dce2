//! Logging setup for applications using the chat SDK
//!
//! The SDK crates only emit `tracing` events. Nothing is printed until the
//! application installs a subscriber, either its own or one from
//! [`init_logging`].

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber is installed
    Silent,
    /// Compact stderr output at `info`
    Development,
    /// Verbose output with targets and source locations at `debug`
    Debug,
    /// One JSON object per line, for log collectors
    Json,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

const LEVEL_VAR: &str = "CHAT_LOG_LEVEL";
const TARGET_VAR: &str = "CHAT_LOG_TARGET";
const MODE_VAR: &str = "CHAT_LOG_MODE";

/// Initialize logging with the specified mode
///
/// Call this once, early, before starting any room updates.
///
/// ```rust,ignore
/// chat_sdk::logging::init_logging(LoggingMode::Development)?;
/// ```
///
/// # Environment Variables
///
/// - `CHAT_LOG_LEVEL`: override the level or directives (e.g. `debug`,
///   `chat_stream=trace,info`); falls back to `RUST_LOG`
/// - `CHAT_LOG_TARGET`: only enable the given target (e.g. `chat_stream`) at
///   the selected level
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let default_level = match mode {
        LoggingMode::Silent => return Ok(()),
        LoggingMode::Development | LoggingMode::Json => "info",
        LoggingMode::Debug => "debug",
    };
    let filter = create_env_filter(default_level)?;

    let result = match mode {
        LoggingMode::Development => Registry::default()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .with(filter)
            .try_init(),
        LoggingMode::Debug => Registry::default()
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .with(filter)
            .try_init(),
        LoggingMode::Json => Registry::default()
            .with(fmt::layer().json().with_current_span(true))
            .with(filter)
            .try_init(),
        LoggingMode::Silent => Ok(()),
    };

    result.map_err(|e| LoggingError::TracingInit(e.to_string()))
}

/// Initialize logging from `CHAT_LOG_MODE`
///
/// Accepts `silent`, `development`, `debug` and `json`; anything else,
/// including an unset variable, means silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var(MODE_VAR)
        .ok()
        .and_then(|raw| parse_mode(&raw))
        .unwrap_or(LoggingMode::Silent);

    init_logging(mode)
}

fn parse_mode(raw: &str) -> Option<LoggingMode> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "silent" => Some(LoggingMode::Silent),
        "development" | "dev" => Some(LoggingMode::Development),
        "debug" => Some(LoggingMode::Debug),
        "json" => Some(LoggingMode::Json),
        _ => None,
    }
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let level = std::env::var(LEVEL_VAR)
        .or_else(|_| std::env::var("RUST_LOG"))
        .ok();
    let target = std::env::var(TARGET_VAR).ok();

    build_filter(level.as_deref(), target.as_deref(), default_level)
}

fn build_filter(
    level: Option<&str>,
    target: Option<&str>,
    default_level: &str,
) -> Result<EnvFilter, LoggingError> {
    let level = level.map(str::trim).filter(|l| !l.is_empty()).unwrap_or(default_level);

    let directives = match target.map(str::trim).filter(|t| !t.is_empty()) {
        Some(target) => format!("off,{target}={level}"),
        None => level.to_string(),
    };

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{directives:?}: {e}")))
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
