//! Test helpers for fixture-based integration tests

use std::fs;
use std::path::PathBuf;

/// A device description fixture served from a given location
#[derive(Debug, Clone)]
pub struct DeviceFixture {
    pub name: String,
    pub host: String,
    pub xml_content: String,
}

impl DeviceFixture {
    /// Load a fixture from the fixtures directory
    pub fn load(filename: &str, host: &str) -> Self {
        let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
        path.push("tests/fixtures");
        path.push(filename);

        let xml_content = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("Failed to load fixture {}: {}", filename, e));

        Self {
            name: filename.to_string(),
            host: host.to_string(),
            xml_content,
        }
    }

    /// The SSDP LOCATION this description would be served from
    pub fn location_url(&self) -> String {
        format!("http://{}/rootDesc.xml", self.host)
    }

    /// A search response advertising this device
    pub fn ssdp_response(&self, udn: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\n\
             CACHE-CONTROL: max-age=1800\r\n\
             EXT:\r\n\
             LOCATION: {}\r\n\
             SERVER: Linux DLNADOC/1.50 UPnP/1.0 MiniDLNA/1.3.0\r\n\
             ST: urn:schemas-upnp-org:device:MediaServer:1\r\n\
             USN: {}::urn:schemas-upnp-org:device:MediaServer:1\r\n\r\n",
            self.location_url(),
            udn
        )
    }
}

/// Collection of device fixtures for testing scenarios
pub struct FixtureSet {
    pub devices: Vec<DeviceFixture>,
}

impl FixtureSet {
    pub fn new(devices: Vec<DeviceFixture>) -> Self {
        Self { devices }
    }

    /// Every media server fixture
    pub fn all_media_servers() -> Self {
        Self::new(vec![
            DeviceFixture::load("minidlna_device.xml", "192.168.1.20:8200"),
            DeviceFixture::load("gerbera_device.xml", "192.168.1.21:49494"),
            DeviceFixture::load("url_base_device.xml", "192.168.1.40:2869"),
            DeviceFixture::load("minimal_media_server.xml", "192.168.1.50:8000"),
        ])
    }

    /// Media servers plus a gateway that must be filtered out
    pub fn mixed_devices() -> Self {
        Self::new(vec![
            DeviceFixture::load("minidlna_device.xml", "192.168.1.20:8200"),
            DeviceFixture::load("router_device.xml", "192.168.1.1:5000"),
            DeviceFixture::load("gerbera_device.xml", "192.168.1.21:49494"),
        ])
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_fixture() {
        let fixture = DeviceFixture::load("minidlna_device.xml", "192.168.1.20:8200");
        assert!(fixture.xml_content.contains("<?xml"));
        assert!(fixture.xml_content.contains("MediaServer"));
    }

    #[test]
    fn test_ssdp_response() {
        let fixture = DeviceFixture::load("minidlna_device.xml", "192.168.1.20:8200");
        let response = fixture.ssdp_response("uuid:abc");
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("LOCATION: http://192.168.1.20:8200/rootDesc.xml"));
        assert!(response.contains("USN: uuid:abc::"));
    }
}
