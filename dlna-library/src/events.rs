//! Events published by the library to its observers

use std::sync::Arc;

use dlna_discovery::Device;
use dlna_parser::Track;

use crate::error::ScanError;

/// Something observable happened to a device or its catalog.
#[derive(Debug, Clone)]
pub enum LibraryEvent {
    /// A media server appeared on the network. Emitted once per UDN.
    DeviceAvailable(Device),

    /// A media server went away; its catalog, if connected, is gone too.
    DeviceUnavailable { udn: String },

    /// A scan completed and the device's visible track set was replaced.
    CatalogChanged { udn: String, tracks: Arc<[Track]> },

    /// A scan failed; the previous track set is still in place.
    ScanFailed { udn: String, error: ScanError },
}

impl LibraryEvent {
    /// UDN of the device the event is about.
    pub fn udn(&self) -> &str {
        match self {
            LibraryEvent::DeviceAvailable(device) => &device.udn,
            LibraryEvent::DeviceUnavailable { udn }
            | LibraryEvent::CatalogChanged { udn, .. }
            | LibraryEvent::ScanFailed { udn, .. } => udn,
        }
    }
}
