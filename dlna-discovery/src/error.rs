//! Error types for the discovery system.

use std::fmt;

/// Error type for discovery operations.
///
/// Discovery failures are never fatal: the background worker logs them and
/// keeps listening.
#[derive(Debug)]
pub enum DiscoveryError {
    /// Network-related errors (socket creation, HTTP requests, etc.)
    NetworkError(String),
    /// Parsing errors (XML, SSDP message, etc.)
    ParseError(String),
    /// Operation timed out waiting for responses
    Timeout,
    /// The description does not advertise a usable ContentDirectory
    InvalidDevice(String),
    /// Rejected configuration value
    InvalidConfig(String),
}

impl fmt::Display for DiscoveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DiscoveryError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DiscoveryError::Timeout => write!(f, "Operation timed out"),
            DiscoveryError::InvalidDevice(msg) => write!(f, "Invalid device: {}", msg),
            DiscoveryError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for DiscoveryError {}

/// Convenience Result type alias for discovery operations.
pub type Result<T> = std::result::Result<T, DiscoveryError>;
