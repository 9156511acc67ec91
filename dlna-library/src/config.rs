//! Library configuration

use std::time::Duration;

use dlna_discovery::DiscoveryConfig;

use crate::debouncer::DEFAULT_RESCAN_DELAY;
use crate::error::{LibraryError, Result};

/// Largest page a ContentDirectory Search is asked for.
pub const PAGE_SIZE: u32 = 64;

/// Configuration for a [`MediaLibrary`](crate::MediaLibrary).
#[derive(Debug, Clone)]
pub struct LibraryConfig {
    /// `RequestedCount` for each Search page
    /// Default: 64
    pub page_size: u32,

    /// Quiet period after the last change notification before a rescan
    /// Default: 5 seconds
    pub rescan_delay: Duration,

    /// Subscribe to ContentDirectory change events on connect
    /// Default: true
    pub change_tracking: bool,

    /// Ports tried, in order, for the GENA callback server
    /// Default: 3400-3500
    pub callback_port_range: (u16, u16),

    /// Subscription lifetime requested from servers
    /// Default: 300 seconds
    pub subscription_timeout: Duration,

    /// Default: 5 seconds
    pub soap_connect_timeout: Duration,

    /// Large result pages can be slow to serialize on small NAS boxes
    /// Default: 30 seconds
    pub soap_read_timeout: Duration,

    pub discovery: DiscoveryConfig,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            page_size: PAGE_SIZE,
            rescan_delay: DEFAULT_RESCAN_DELAY,
            change_tracking: true,
            callback_port_range: (3400, 3500),
            subscription_timeout: Duration::from_secs(300),
            soap_connect_timeout: Duration::from_secs(5),
            soap_read_timeout: Duration::from_secs(30),
            discovery: DiscoveryConfig::default(),
        }
    }
}

impl LibraryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Short debounce window, for servers that batch their own updates.
    pub fn fast_rescan() -> Self {
        Self {
            rescan_delay: Duration::from_millis(500),
            ..Default::default()
        }
    }

    /// No GENA subscriptions and no callback server; catalogs refresh only
    /// on connect and on explicit rescans.
    pub fn no_change_tracking() -> Self {
        Self {
            change_tracking: false,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > PAGE_SIZE {
            return Err(LibraryError::InvalidConfig(format!(
                "Page size must be between 1 and {}",
                PAGE_SIZE
            )));
        }

        if self.rescan_delay == Duration::ZERO {
            return Err(LibraryError::InvalidConfig(
                "Rescan delay must be greater than 0".to_string(),
            ));
        }

        let (start, end) = self.callback_port_range;
        if start > end {
            return Err(LibraryError::InvalidConfig(format!(
                "Callback port range {}-{} is empty",
                start, end
            )));
        }

        if self.subscription_timeout < Duration::from_secs(2) {
            return Err(LibraryError::InvalidConfig(
                "Subscription timeout must be at least 2 seconds".to_string(),
            ));
        }

        if self.soap_connect_timeout == Duration::ZERO || self.soap_read_timeout == Duration::ZERO {
            return Err(LibraryError::InvalidConfig(
                "SOAP timeouts must be greater than 0".to_string(),
            ));
        }

        self.discovery.validate()?;
        Ok(())
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_rescan_delay(mut self, delay: Duration) -> Self {
        self.rescan_delay = delay;
        self
    }

    pub fn with_change_tracking(mut self, enabled: bool) -> Self {
        self.change_tracking = enabled;
        self
    }

    pub fn with_callback_port_range(mut self, start: u16, end: u16) -> Self {
        self.callback_port_range = (start, end);
        self
    }

    pub fn with_subscription_timeout(mut self, timeout: Duration) -> Self {
        self.subscription_timeout = timeout;
        self
    }

    pub fn with_soap_timeouts(mut self, connect: Duration, read: Duration) -> Self {
        self.soap_connect_timeout = connect;
        self.soap_read_timeout = read;
        self
    }

    pub fn with_discovery(mut self, discovery: DiscoveryConfig) -> Self {
        self.discovery = discovery;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LibraryConfig::default();
        assert_eq!(config.page_size, 64);
        assert_eq!(config.rescan_delay, Duration::from_secs(5));
        assert!(config.change_tracking);
        assert_eq!(config.callback_port_range, (3400, 3500));
        assert_eq!(config.subscription_timeout, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let fast = LibraryConfig::fast_rescan();
        assert_eq!(fast.rescan_delay, Duration::from_millis(500));
        assert!(fast.validate().is_ok());

        let quiet = LibraryConfig::no_change_tracking();
        assert!(!quiet.change_tracking);
        assert!(quiet.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(LibraryConfig::new().with_page_size(0).validate().is_err());
        assert!(LibraryConfig::new().with_page_size(65).validate().is_err());
        assert!(LibraryConfig::new().with_page_size(1).validate().is_ok());
        assert!(LibraryConfig::new()
            .with_rescan_delay(Duration::ZERO)
            .validate()
            .is_err());
        assert!(LibraryConfig::new()
            .with_callback_port_range(3500, 3400)
            .validate()
            .is_err());
        assert!(LibraryConfig::new()
            .with_subscription_timeout(Duration::from_secs(1))
            .validate()
            .is_err());
        assert!(LibraryConfig::new()
            .with_soap_timeouts(Duration::ZERO, Duration::from_secs(1))
            .validate()
            .is_err());
    }

    #[test]
    fn test_invalid_discovery_config_is_reported() {
        let discovery = DiscoveryConfig::default().with_search_target("");
        let result = LibraryConfig::new().with_discovery(discovery).validate();
        assert!(matches!(result, Err(LibraryError::Discovery(_))));
    }
}
