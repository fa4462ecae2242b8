//! Streaming core configuration

use std::time::Duration;

/// Configuration for the streaming core
///
/// Use the builder pattern to override defaults:
///
/// ```ignore
/// let config = StreamingConfig::new()
///     .with_max_concurrent_streams(4)
///     .with_acquire_timeout(Duration::from_secs(5))
///     .with_max_retries(2);
/// ```
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Maximum number of concurrently running streams
    pub max_concurrent_streams: usize,

    /// How long an admission attempt waits for a slot before failing
    pub acquire_timeout: Duration,

    /// Interval between hot-cache saves of the raw accumulated text
    pub hot_save_interval: Duration,

    /// Interval between durable saves of the full structured result
    pub durable_save_interval: Duration,

    /// Retry budget for transient upstream errors within one session-resume cycle
    pub max_retries: u32,

    /// How long a cancel waits for the upstream interrupt acknowledgment
    /// before proceeding anyway
    pub cancel_grace: Duration,
}

impl StreamingConfig {
    /// Create a configuration with defaults
    pub fn new() -> Self {
        Self {
            max_concurrent_streams: 8,
            acquire_timeout: Duration::from_secs(10),
            hot_save_interval: Duration::from_secs(2),
            durable_save_interval: Duration::from_secs(30),
            max_retries: 3,
            cancel_grace: Duration::from_secs(5),
        }
    }

    /// Set the maximum number of concurrent streams
    pub fn with_max_concurrent_streams(mut self, max: usize) -> Self {
        self.max_concurrent_streams = max;
        self
    }

    /// Set the admission timeout
    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Set the hot-cache save interval
    pub fn with_hot_save_interval(mut self, interval: Duration) -> Self {
        self.hot_save_interval = interval;
        self
    }

    /// Set the durable save interval
    pub fn with_durable_save_interval(mut self, interval: Duration) -> Self {
        self.durable_save_interval = interval;
        self
    }

    /// Set the transient-error retry budget
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the cancellation grace window
    pub fn with_cancel_grace(mut self, grace: Duration) -> Self {
        self.cancel_grace = grace;
        self
    }
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self::new()
    }
}
