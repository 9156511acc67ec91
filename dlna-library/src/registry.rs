//! Set of known media servers, keyed by UDN
//!
//! The registry is owned by the event loop. Discovery runs on its own thread
//! and only reports [`DeviceEvent`]s; they are applied here, one at a time.

use std::collections::HashMap;

use dlna_discovery::{Device, DeviceEvent, DiscoveryConfig, DiscoveryHandle, DiscoveryWorker};
use tracing::{debug, info};

use crate::error::Result;

/// Effect of applying a discovery event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryChange {
    Added(Device),
    Removed(Device),
}

#[derive(Debug)]
pub struct DeviceRegistry {
    devices: HashMap<String, Device>,
    config: DiscoveryConfig,
    discovery: Option<DiscoveryHandle>,
}

impl DeviceRegistry {
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            devices: HashMap::new(),
            config,
            discovery: None,
        }
    }

    /// Start network discovery. Events are passed to `sink` from the
    /// discovery thread. Returns `false` if discovery was already running.
    pub fn start<F>(&mut self, sink: F) -> Result<bool>
    where
        F: FnMut(DeviceEvent) + Send + 'static,
    {
        if self.discovery.is_some() {
            return Ok(false);
        }

        let handle = DiscoveryWorker::spawn(self.config.clone(), sink)?;
        info!(search_target = %self.config.search_target, "device discovery started");
        self.discovery = Some(handle);
        Ok(true)
    }

    pub fn is_started(&self) -> bool {
        self.discovery.is_some()
    }

    /// Ask discovery to probe the network again. Results arrive later
    /// through the sink; the device set is not touched here.
    pub fn rescan(&self) {
        match &self.discovery {
            Some(handle) => handle.rescan(),
            None => debug!("rescan ignored, discovery not started"),
        }
    }

    /// Apply a discovery event. A repeated `Found` for a known UDN and a
    /// `Lost` for an unknown one change nothing.
    pub fn handle_event(&mut self, event: DeviceEvent) -> Option<RegistryChange> {
        match event {
            DeviceEvent::Found(device) => self.insert(device),
            DeviceEvent::Lost { udn } => self.remove(&udn),
        }
    }

    /// Add a device that was not found through discovery, e.g. one
    /// configured by address.
    pub fn insert(&mut self, device: Device) -> Option<RegistryChange> {
        if self.devices.contains_key(&device.udn) {
            debug!(udn = %device.udn, "device already known");
            return None;
        }

        info!(udn = %device.udn, name = %device.friendly_name, "media server available");
        self.devices.insert(device.udn.clone(), device.clone());
        Some(RegistryChange::Added(device))
    }

    pub fn remove(&mut self, udn: &str) -> Option<RegistryChange> {
        let device = self.devices.remove(udn)?;
        info!(udn = %device.udn, name = %device.friendly_name, "media server unavailable");
        Some(RegistryChange::Removed(device))
    }

    pub fn get(&self, udn: &str) -> Option<&Device> {
        self.devices.get(udn)
    }

    pub fn contains(&self, udn: &str) -> bool {
        self.devices.contains_key(udn)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Stop discovery and wait for its thread. Known devices are kept.
    pub fn stop(&mut self) {
        if let Some(handle) = self.discovery.take() {
            handle.shutdown();
            info!("device discovery stopped");
        }
    }
}
