//! Session configuration

use std::time::Duration;

use vsp_transport::TransportConfig;

/// Shortest accepted status poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// Session configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Interval between status polls while free-running
    pub poll_interval: Duration,
    /// Settings for the underlying connection
    pub transport: TransportConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            poll_interval: Duration::from_millis(100),
            transport: TransportConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Clamped to [`MIN_POLL_INTERVAL`]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval.max(MIN_POLL_INTERVAL);
        self
    }

    pub fn with_transport(mut self, transport: TransportConfig) -> Self {
        self.transport = transport;
        self
    }
}
