//! Configuration for the background discovery worker.

use std::time::Duration;

use crate::error::{DiscoveryError, Result};

/// Search target used for M-SEARCH and for filtering NOTIFY announcements.
pub const MEDIA_SERVER_TARGET: &str = "urn:schemas-upnp-org:device:MediaServer:1";

/// Settings for [`DiscoveryWorker`](crate::DiscoveryWorker).
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// SSDP search target
    /// Default: `urn:schemas-upnp-org:device:MediaServer:1`
    pub search_target: String,

    /// HTTP timeout for device description fetches
    /// Default: 3 seconds
    pub search_timeout: Duration,

    /// Interval between unsolicited M-SEARCH rounds
    /// Default: 120 seconds
    pub search_interval: Duration,

    /// Lifetime assumed when an announcement carries no CACHE-CONTROL
    /// Default: 1800 seconds
    pub default_max_age: Duration,

    /// Join the SSDP multicast group to hear alive/byebye announcements
    /// Default: true
    pub listen_for_notify: bool,

    /// Socket read timeout used by the worker poll loop
    /// Default: 100 milliseconds
    pub poll_interval: Duration,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            search_target: MEDIA_SERVER_TARGET.to_string(),
            search_timeout: Duration::from_secs(3),
            search_interval: Duration::from_secs(120),
            default_max_age: Duration::from_secs(1800),
            listen_for_notify: true,
            poll_interval: Duration::from_millis(100),
        }
    }
}

impl DiscoveryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Search-only discovery; no multicast listener on port 1900.
    pub fn search_only() -> Self {
        Self {
            listen_for_notify: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.search_target.trim().is_empty() {
            return Err(DiscoveryError::InvalidConfig(
                "Search target must not be empty".to_string(),
            ));
        }

        if self.search_timeout == Duration::ZERO {
            return Err(DiscoveryError::InvalidConfig(
                "Search timeout must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval == Duration::ZERO {
            return Err(DiscoveryError::InvalidConfig(
                "Poll interval must be greater than 0".to_string(),
            ));
        }

        if self.search_interval <= self.poll_interval {
            return Err(DiscoveryError::InvalidConfig(
                "Search interval must be longer than the poll interval".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_search_target(mut self, target: impl Into<String>) -> Self {
        self.search_target = target.into();
        self
    }

    pub fn with_search_timeout(mut self, timeout: Duration) -> Self {
        self.search_timeout = timeout;
        self
    }

    pub fn with_search_interval(mut self, interval: Duration) -> Self {
        self.search_interval = interval;
        self
    }

    pub fn with_notify_listener(mut self, enabled: bool) -> Self {
        self.listen_for_notify = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.search_target, MEDIA_SERVER_TARGET);
        assert_eq!(config.search_interval, Duration::from_secs(120));
        assert!(config.listen_for_notify);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let empty_target = DiscoveryConfig::new().with_search_target("  ");
        assert!(empty_target.validate().is_err());

        let zero_timeout = DiscoveryConfig::new().with_search_timeout(Duration::ZERO);
        assert!(zero_timeout.validate().is_err());

        let tight_interval = DiscoveryConfig::new().with_search_interval(Duration::from_millis(50));
        assert!(tight_interval.validate().is_err());
    }

    #[test]
    fn test_search_only_preset() {
        let config = DiscoveryConfig::search_only();
        assert!(!config.listen_for_notify);
        assert!(config.validate().is_ok());
    }
}
