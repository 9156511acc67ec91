use soap_client::SoapError;
use thiserror::Error;

/// A full catalog scan failed. The previous catalog is kept.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScanError {
    /// The server could not be reached or the connection broke mid-scan
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with something that is not a valid Search response
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl ScanError {
    pub fn is_transport(&self) -> bool {
        matches!(self, ScanError::Transport(_))
    }
}

impl From<SoapError> for ScanError {
    fn from(error: SoapError) -> Self {
        if error.is_network() {
            ScanError::Transport(error.to_string())
        } else {
            ScanError::Protocol(error.to_string())
        }
    }
}

/// Errors returned by the [`MediaLibrary`](crate::MediaLibrary) facade.
#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("device {0} not found")]
    DeviceNotFound(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start library worker: {0}")]
    WorkerStart(String),

    #[error("library worker has stopped")]
    WorkerStopped,

    #[error("discovery failed: {0}")]
    Discovery(#[from] dlna_discovery::DiscoveryError),
}

pub type Result<T> = std::result::Result<T, LibraryError>;
