//! One-shot discovery iterator.
//!
//! Sends a single M-SEARCH for MediaServer devices, collects responses until
//! the socket times out, then fetches and validates each unique device's
//! description lazily as the iterator is advanced.

use std::collections::HashSet;
use std::time::Duration;

use tracing::debug;

use crate::config::MEDIA_SERVER_TARGET;
use crate::device::Description;
use crate::error::{DiscoveryError, Result};
use crate::ssdp::{udn_from_usn, SsdpClient, SsdpResponse};
use crate::{Device, DeviceEvent};

/// Iterator that discovers MediaServer devices on the local network.
///
/// Yields `DeviceEvent::Found` once per UDN. Responses whose description
/// cannot be fetched or lacks a ContentDirectory are skipped.
///
/// # Examples
///
/// ```no_run
/// use dlna_discovery::{get_iter, DeviceEvent};
///
/// for event in get_iter() {
///     if let DeviceEvent::Found(device) = event {
///         println!("Found: {}", device.friendly_name);
///     }
/// }
/// ```
pub struct DiscoveryIterator {
    ssdp_client: Option<SsdpClient>,
    search_target: String,
    ssdp_buffer: Vec<SsdpResponse>,
    buffer_index: usize,
    seen: HashSet<String>,
    http_client: reqwest::blocking::Client,
}

impl DiscoveryIterator {
    /// Create a new discovery iterator with the specified timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        Self::with_target(timeout, MEDIA_SERVER_TARGET)
    }

    /// Create an iterator searching for a custom target (e.g. `ssdp:all`)
    pub fn with_target(timeout: Duration, search_target: &str) -> Result<Self> {
        let ssdp_client = SsdpClient::new(timeout)?;
        let http_client = description_client(timeout)?;

        Ok(Self {
            ssdp_client: Some(ssdp_client),
            search_target: search_target.to_string(),
            ssdp_buffer: Vec::new(),
            buffer_index: 0,
            seen: HashSet::new(),
            http_client,
        })
    }

    /// An iterator that yields nothing, used when socket setup fails
    pub(crate) fn empty() -> Self {
        Self {
            ssdp_client: None,
            search_target: MEDIA_SERVER_TARGET.to_string(),
            ssdp_buffer: Vec::new(),
            buffer_index: 0,
            seen: HashSet::new(),
            http_client: reqwest::blocking::Client::new(),
        }
    }

    fn fill_buffer(&mut self) {
        if let Some(client) = self.ssdp_client.take() {
            match client.search(&self.search_target) {
                Ok(iter) => self.ssdp_buffer.extend(iter.filter_map(|r| r.ok())),
                Err(e) => debug!("M-SEARCH failed: {}", e),
            }
        }
    }
}

impl Iterator for DiscoveryIterator {
    type Item = DeviceEvent;

    fn next(&mut self) -> Option<Self::Item> {
        if self.ssdp_client.is_some() {
            self.fill_buffer();
        }

        while self.buffer_index < self.ssdp_buffer.len() {
            let response = &self.ssdp_buffer[self.buffer_index];
            self.buffer_index += 1;

            // Servers answer once per advertised target; key on the UDN
            let key = udn_from_usn(&response.usn)
                .unwrap_or(&response.location)
                .to_string();
            if !self.seen.insert(key) {
                continue;
            }

            match fetch_device(&self.http_client, &response.location) {
                Ok(device) => return Some(DeviceEvent::Found(device)),
                Err(e) => debug!(location = %response.location, "skipping device: {}", e),
            }
        }

        None
    }
}

/// HTTP client used for description fetches.
pub(crate) fn description_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to create HTTP client: {}", e)))
}

/// Fetch the description at `location` and turn it into a [`Device`].
pub(crate) fn fetch_device(http_client: &reqwest::blocking::Client, location: &str) -> Result<Device> {
    let response = http_client
        .get(location)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to fetch device description: {}", e)))?;

    let xml = response
        .text()
        .map_err(|e| DiscoveryError::NetworkError(format!("Failed to read response body: {}", e)))?;

    Description::from_xml(&xml)?.to_device(location)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_iterator_yields_nothing() {
        let mut iter = DiscoveryIterator::empty();
        assert!(iter.next().is_none());
    }

    #[test]
    fn test_fetch_device_from_mock_server() {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/rootDesc.xml")
            .with_status(200)
            .with_body(
                r#"<root><device>
                    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
                    <friendlyName>Mock</friendlyName>
                    <UDN>uuid:mock</UDN>
                    <serviceList><service>
                        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
                        <controlURL>/cds</controlURL>
                    </service></serviceList>
                </device></root>"#,
            )
            .create();

        let client = description_client(Duration::from_secs(2)).unwrap();
        let location = format!("{}/rootDesc.xml", server.url());
        let device = fetch_device(&client, &location).unwrap();

        assert_eq!(device.udn, "uuid:mock");
        assert_eq!(device.content_directory.control_url, format!("{}/cds", server.url()));
    }

    #[test]
    fn test_fetch_device_http_error() {
        let mut server = mockito::Server::new();
        let _mock = server.mock("GET", "/gone.xml").with_status(404).create();

        let client = description_client(Duration::from_secs(2)).unwrap();
        let location = format!("{}/gone.xml", server.url());
        assert!(matches!(
            fetch_device(&client, &location),
            Err(DiscoveryError::NetworkError(_))
        ));
    }
}
