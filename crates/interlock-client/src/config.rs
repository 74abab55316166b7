use std::time::Duration;

/// Timeouts applied by the client transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Upper bound on establishing a QUIC connection.
    pub connect_timeout: Duration,
    /// Upper bound on one request/response exchange.
    pub request_timeout: Duration,
    /// QUIC idle timeout.
    pub idle_timeout: Duration,
}

impl TransportConfig {
    /// Defaults for local test servers.
    #[must_use]
    pub fn development() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(30),
        }
    }

    /// Same config with a different request timeout.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::development()
    }
}
