//! Wait bounds for radio operations.

use std::time::Duration;

/// Default bound for establishing a connection.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Default bound for attribute discovery after connecting.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound for characteristic reads.
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound for handing a write to the send path.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(10);

/// Default scan duration.
const DEFAULT_SCAN_DURATION: Duration = Duration::from_secs(5);

/// Configurable wait bounds for radio operations.
///
/// Every blocking radio round trip the gateway performs is wrapped in one
/// of these bounds; exceeding a bound surfaces as
/// [`Error::Timeout`](crate::Error::Timeout) instead of hanging the
/// request.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use gattway_core::LinkConfig;
///
/// let config = LinkConfig::default()
///     .connect_timeout(Duration::from_secs(20))
///     .read_timeout(Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Bound for establishing a connection.
    pub connect_timeout: Duration,
    /// Bound for attribute discovery.
    pub discovery_timeout: Duration,
    /// Bound for characteristic reads.
    pub read_timeout: Duration,
    /// Bound for handing writes to the send path.
    pub write_timeout: Duration,
    /// How long scans run.
    pub scan_duration: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            scan_duration: DEFAULT_SCAN_DURATION,
        }
    }
}

impl LinkConfig {
    /// Create a config with default bounds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection bound.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the discovery bound.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the read bound.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the write bound.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }

    /// Set the scan duration.
    #[must_use]
    pub fn scan_duration(mut self, duration: Duration) -> Self {
        self.scan_duration = duration;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = LinkConfig::default();
        assert_eq!(config.connect_timeout, Duration::from_secs(15));
        assert_eq!(config.discovery_timeout, Duration::from_secs(10));
        assert_eq!(config.scan_duration, Duration::from_secs(5));
    }

    #[test]
    fn builder_overrides() {
        let config = LinkConfig::new()
            .connect_timeout(Duration::from_secs(1))
            .read_timeout(Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_secs(1));
        assert_eq!(config.read_timeout, Duration::from_millis(250));
        // untouched fields keep defaults
        assert_eq!(config.write_timeout, Duration::from_secs(10));
    }
}
