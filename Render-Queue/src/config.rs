use std::time::Duration;

use crate::types::Destination;

/// Configuration for the render queue.
///
/// Use [`QueueConfig::builder()`] for ergonomic construction, or
/// [`QueueConfig::default()`] for the stock timings.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    /// Wall-clock ceiling for one render, measured from when it starts.
    pub process_timeout: Duration,

    /// How often the backend is asked for progress.
    pub check_interval: Duration,

    /// Status message refresh interval for one-to-one conversations.
    pub private_refresh_interval: Duration,

    /// Status message refresh interval for group conversations, which
    /// have stricter edit rate limits.
    pub shared_refresh_interval: Duration,

    /// Number of segments in the textual progress bar.
    pub progress_bar_length: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            process_timeout: Duration::from_secs(3 * 60),
            check_interval: Duration::from_millis(100),
            private_refresh_interval: Duration::from_millis(500),
            shared_refresh_interval: Duration::from_secs(3),
            progress_bar_length: 20,
        }
    }
}

impl QueueConfig {
    /// Start building a config with the builder pattern.
    pub fn builder() -> QueueConfigBuilder {
        QueueConfigBuilder::default()
    }

    /// Status refresh interval for a destination.
    pub fn refresh_interval(&self, destination: Destination) -> Duration {
        match destination {
            Destination::Private => self.private_refresh_interval,
            Destination::Shared => self.shared_refresh_interval,
        }
    }
}

/// Builder for [`QueueConfig`].
#[derive(Default)]
pub struct QueueConfigBuilder {
    config: QueueConfig,
}

impl QueueConfigBuilder {
    /// Set the maximum duration of one render.
    pub fn with_process_timeout(mut self, timeout: Duration) -> Self {
        self.config.process_timeout = timeout;
        self
    }

    /// Set the backend progress polling interval.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.config.check_interval = interval;
        self
    }

    /// Set the status refresh interval for private conversations.
    pub fn with_private_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.private_refresh_interval = interval;
        self
    }

    /// Set the status refresh interval for group conversations.
    pub fn with_shared_refresh_interval(mut self, interval: Duration) -> Self {
        self.config.shared_refresh_interval = interval;
        self
    }

    pub fn with_progress_bar_length(mut self, length: usize) -> Self {
        self.config.progress_bar_length = length;
        self
    }

    /// Build the final [`QueueConfig`].
    pub fn build(self) -> QueueConfig {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueueConfig::default();
        assert_eq!(config.process_timeout, Duration::from_secs(180));
        assert_eq!(config.check_interval, Duration::from_millis(100));
        assert_eq!(config.progress_bar_length, 20);
    }

    #[test]
    fn test_refresh_interval_by_destination() {
        let config = QueueConfig::builder()
            .with_private_refresh_interval(Duration::from_millis(250))
            .with_shared_refresh_interval(Duration::from_secs(5))
            .build();
        assert_eq!(
            config.refresh_interval(Destination::Private),
            Duration::from_millis(250)
        );
        assert_eq!(
            config.refresh_interval(Destination::Shared),
            Duration::from_secs(5)
        );
    }
}
