//! Transport configuration

use std::time::Duration;

use vsp_wire::MAX_PAYLOAD_SIZE;

/// Transport configuration
#[derive(Clone, Debug)]
pub struct TransportConfig {
    /// Attempts per send, and corrupt frames tolerated per receive
    pub retries: usize,
    /// Largest response payload accepted
    pub max_payload: usize,
    /// Per-candidate connect timeout
    pub connect_timeout: Duration,
    /// Timeout for every single read from the peer
    pub read_timeout: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            retries: 5,
            max_payload: MAX_PAYLOAD_SIZE,
            connect_timeout: Duration::from_secs(5),
            read_timeout: Duration::from_secs(5),
        }
    }
}

impl TransportConfig {
    pub fn with_retries(mut self, retries: usize) -> Self {
        self.retries = retries.max(1);
        self
    }

    pub fn with_max_payload(mut self, max_payload: usize) -> Self {
        self.max_payload = max_payload;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }
}
