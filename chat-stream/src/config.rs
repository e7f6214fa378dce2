//! Configuration for the event poller.

use std::time::Duration;

/// Configuration for [`EventPoller`](crate::EventPoller).
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Interval used when no explicit interval is given
    pub default_interval: Duration,
    /// Maximum number of room loops alive at once
    pub max_rooms: usize,
    /// How long shutdown waits for a loop to finish its current tick
    pub shutdown_timeout: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            default_interval: Duration::from_millis(500),
            max_rooms: 256,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

impl PollerConfig {
    pub fn with_default_interval(mut self, interval: Duration) -> Self {
        self.default_interval = interval;
        self
    }

    pub fn with_max_rooms(mut self, max_rooms: usize) -> Self {
        self.max_rooms = max_rooms;
        self
    }

    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PollerConfig::default();
        assert_eq!(config.default_interval, Duration::from_millis(500));
        assert_eq!(config.max_rooms, 256);
        assert_eq!(config.shutdown_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_builder_overrides() {
        let config = PollerConfig::default()
            .with_default_interval(Duration::from_secs(2))
            .with_max_rooms(3);
        assert_eq!(config.default_interval, Duration::from_secs(2));
        assert_eq!(config.max_rooms, 3);
    }
}
