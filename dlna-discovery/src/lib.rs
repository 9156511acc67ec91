//! UPnP MediaServer discovery library
//!
//! This crate finds DLNA/UPnP media servers on the local network using SSDP
//! (Simple Service Discovery Protocol) and their device descriptions, and
//! reports the ContentDirectory endpoint needed to browse them.
//!
//! # Quick Start
//!
//! ```no_run
//! use dlna_discovery::get;
//!
//! for device in get() {
//!     println!("Found {} ({})", device.friendly_name, device.udn);
//! }
//! ```
//!
//! # Continuous discovery
//!
//! [`DiscoveryWorker`] keeps searching in the background and reports servers
//! as they appear and disappear:
//!
//! ```no_run
//! use dlna_discovery::{DeviceEvent, DiscoveryConfig, DiscoveryWorker};
//!
//! let handle = DiscoveryWorker::spawn(DiscoveryConfig::default(), |event| match event {
//!     DeviceEvent::Found(device) => println!("+ {}", device.friendly_name),
//!     DeviceEvent::Lost { udn } => println!("- {}", udn),
//! })?;
//! handle.rescan();
//! # Ok::<(), dlna_discovery::DiscoveryError>(())
//! ```

mod config;
pub mod device;
mod discovery;
mod error;
mod ssdp;
mod tracker;
mod worker;

pub use config::{DiscoveryConfig, MEDIA_SERVER_TARGET};
pub use discovery::DiscoveryIterator;
pub use error::{DiscoveryError, Result};
pub use tracker::Tracker;
pub use worker::{DiscoveryHandle, DiscoveryWorker};

use std::time::Duration;

/// Endpoint of a UPnP service, with absolute URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceEndpoint {
    /// Full service type, e.g. `urn:schemas-upnp-org:service:ContentDirectory:1`
    pub service_type: String,
    /// SOAP control URL
    pub control_url: String,
    /// GENA subscription URL, absent when the server publishes no events
    pub event_sub_url: Option<String>,
}

/// A discovered media server.
///
/// Identity is the UDN; all other fields come from the device description
/// fetched when the server was first seen and never change afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Device {
    /// Unique device name, e.g. "uuid:4d696e69-444c-164e-9d41-b827eb96c6c2"
    pub udn: String,
    /// Human-readable name
    pub friendly_name: String,
    /// URL of the device description
    pub location: String,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    /// The server's ContentDirectory service
    pub content_directory: ServiceEndpoint,
}

/// Events emitted during device discovery.
#[derive(Debug, Clone)]
pub enum DeviceEvent {
    /// A media server was found on the network
    Found(Device),
    /// A media server said byebye or stopped re-advertising
    Lost { udn: String },
}

/// Discover media servers with a default 3-second timeout.
///
/// # Examples
///
/// ```no_run
/// let devices = dlna_discovery::get();
/// println!("{} media server(s)", devices.len());
/// ```
pub fn get() -> Vec<Device> {
    get_with_timeout(Duration::from_secs(3))
}

/// Discover media servers with a custom timeout.
///
/// The timeout bounds both the wait for SSDP responses and each description fetch.
pub fn get_with_timeout(timeout: Duration) -> Vec<Device> {
    get_iter_with_timeout(timeout)
        .filter_map(|event| match event {
            DeviceEvent::Found(device) => Some(device),
            DeviceEvent::Lost { .. } => None,
        })
        .collect()
}

/// Iterator over discovered media servers with a default 3-second timeout.
pub fn get_iter() -> DiscoveryIterator {
    get_iter_with_timeout(Duration::from_secs(3))
}

/// Iterator over discovered media servers with a custom timeout.
///
/// Returns an empty iterator if the UDP socket cannot be created.
pub fn get_iter_with_timeout(timeout: Duration) -> DiscoveryIterator {
    DiscoveryIterator::new(timeout).unwrap_or_else(|e| {
        tracing::warn!("discovery unavailable: {}", e);
        DiscoveryIterator::empty()
    })
}
