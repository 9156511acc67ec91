//! Device description parsing and validation.
//!
//! Parses UPnP device description XML, locates the ContentDirectory service
//! of a MediaServer (possibly on an embedded device) and resolves its
//! control and event URLs to absolute form.

use serde::Deserialize;
use url::Url;

use crate::error::{DiscoveryError, Result};
use crate::{Device, ServiceEndpoint};

/// UPnP device description root element.
#[derive(Debug, Deserialize)]
pub struct Root {
    /// Base for relative URLs; UPnP 1.0 only, usually absent
    #[serde(rename = "URLBase", default)]
    pub url_base: Option<String>,
    pub device: DeviceDescription,
}

/// Device description as published at the SSDP LOCATION URL.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescription {
    pub device_type: String,
    pub friendly_name: String,
    pub manufacturer: Option<String>,
    pub model_name: Option<String>,
    pub model_number: Option<String>,
    #[serde(rename = "UDN")]
    pub udn: String,
    #[serde(default)]
    pub service_list: Option<ServiceList>,
    #[serde(default)]
    pub device_list: Option<DeviceList>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServiceList {
    #[serde(rename = "service", default)]
    pub services: Vec<ServiceDescription>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DeviceList {
    #[serde(rename = "device", default)]
    pub devices: Vec<DeviceDescription>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceDescription {
    #[serde(rename = "serviceType")]
    pub service_type: String,
    #[serde(rename = "serviceId", default)]
    pub service_id: Option<String>,
    #[serde(rename = "controlURL")]
    pub control_url: String,
    #[serde(rename = "eventSubURL", default)]
    pub event_sub_url: Option<String>,
}

/// A parsed description together with the URL base it must be resolved against.
#[derive(Debug)]
pub struct Description {
    pub url_base: Option<String>,
    pub root: DeviceDescription,
}

impl Description {
    /// Parse device description from XML.
    ///
    /// # Errors
    ///
    /// Returns `DiscoveryError::ParseError` if the XML is malformed or missing required fields.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let root: Root = quick_xml::de::from_str(xml)
            .map_err(|e| DiscoveryError::ParseError(format!("Failed to parse device XML: {}", e)))?;

        Ok(Self {
            url_base: root.url_base,
            root: root.device,
        })
    }

    /// Find the first MediaServer in the device tree.
    pub fn media_server(&self) -> Option<&DeviceDescription> {
        self.root.find(&|d| d.is_media_server())
    }

    /// Convert into the public [`Device`], resolving service URLs against
    /// `URLBase` or, failing that, the LOCATION it was fetched from.
    ///
    /// # Errors
    ///
    /// `InvalidDevice` when there is no MediaServer with a ContentDirectory,
    /// `ParseError` when a URL cannot be resolved.
    pub fn to_device(&self, location: &str) -> Result<Device> {
        let server = self.media_server().ok_or_else(|| {
            DiscoveryError::InvalidDevice(format!(
                "{} is not a MediaServer ({})",
                self.root.udn, self.root.device_type
            ))
        })?;

        let service = server.content_directory().ok_or_else(|| {
            DiscoveryError::InvalidDevice(format!(
                "{} has no ContentDirectory service",
                server.udn
            ))
        })?;

        let base_str = self
            .url_base
            .as_deref()
            .map(str::trim)
            .filter(|b| !b.is_empty())
            .unwrap_or(location);
        let base = Url::parse(base_str)
            .map_err(|e| DiscoveryError::ParseError(format!("Invalid base URL {}: {}", base_str, e)))?;

        let control_url = resolve(&base, &service.control_url)?;
        let event_sub_url = service
            .event_sub_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .map(|u| resolve(&base, u))
            .transpose()?;

        Ok(Device {
            udn: server.udn.trim().to_string(),
            friendly_name: server.friendly_name.trim().to_string(),
            location: location.to_string(),
            manufacturer: server.manufacturer.clone(),
            model_name: server.model_name.clone(),
            content_directory: ServiceEndpoint {
                service_type: service.service_type.trim().to_string(),
                control_url,
                event_sub_url,
            },
        })
    }
}

impl DeviceDescription {
    /// Parse a bare device description, ignoring `URLBase`.
    pub fn from_xml(xml: &str) -> Result<Self> {
        Description::from_xml(xml).map(|d| d.root)
    }

    /// Check whether this device advertises the MediaServer device type.
    pub fn is_media_server(&self) -> bool {
        self.device_type.contains(":device:MediaServer:")
    }

    /// The ContentDirectory service entry, if declared.
    pub fn content_directory(&self) -> Option<&ServiceDescription> {
        self.service_list
            .as_ref()?
            .services
            .iter()
            .find(|s| s.service_type.contains(":service:ContentDirectory:"))
    }

    fn find(&self, predicate: &dyn Fn(&DeviceDescription) -> bool) -> Option<&DeviceDescription> {
        if predicate(self) {
            return Some(self);
        }
        self.device_list
            .as_ref()?
            .devices
            .iter()
            .find_map(|d| d.find(predicate))
    }
}

fn resolve(base: &Url, reference: &str) -> Result<String> {
    base.join(reference.trim())
        .map(String::from)
        .map_err(|e| DiscoveryError::ParseError(format!("Cannot resolve {}: {}", reference, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIDLNA: &str = r#"<?xml version="1.0"?>
<root xmlns="urn:schemas-upnp-org:device-1-0">
  <specVersion><major>1</major><minor>0</minor></specVersion>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>Server1</friendlyName>
    <manufacturer>Justin Maggard</manufacturer>
    <modelName>Windows Media Connect compatible (MiniDLNA)</modelName>
    <modelNumber>1</modelNumber>
    <UDN>uuid:123</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ContentDirectory</serviceId>
        <controlURL>/ctl/ContentDir</controlURL>
        <eventSubURL>/evt/ContentDir</eventSubURL>
        <SCPDURL>/ContentDir.xml</SCPDURL>
      </service>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ConnectionManager:1</serviceType>
        <serviceId>urn:upnp-org:serviceId:ConnectionManager</serviceId>
        <controlURL>/ctl/ConnectionMgr</controlURL>
        <eventSubURL>/evt/ConnectionMgr</eventSubURL>
        <SCPDURL>/ConnectionMgr.xml</SCPDURL>
      </service>
    </serviceList>
  </device>
</root>"#;

    #[test]
    fn test_media_server_to_device() {
        let description = Description::from_xml(MINIDLNA).unwrap();
        let device = description
            .to_device("http://192.168.1.20:8200/rootDesc.xml")
            .unwrap();

        assert_eq!(device.udn, "uuid:123");
        assert_eq!(device.friendly_name, "Server1");
        assert_eq!(device.manufacturer.as_deref(), Some("Justin Maggard"));
        assert_eq!(
            device.content_directory.control_url,
            "http://192.168.1.20:8200/ctl/ContentDir"
        );
        assert_eq!(
            device.content_directory.event_sub_url.as_deref(),
            Some("http://192.168.1.20:8200/evt/ContentDir")
        );
        assert_eq!(
            device.content_directory.service_type,
            "urn:schemas-upnp-org:service:ContentDirectory:1"
        );
    }

    #[test]
    fn test_url_base_takes_precedence() {
        let xml = r#"<root>
  <URLBase>http://10.0.0.5:49152/</URLBase>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>NAS</friendlyName>
    <UDN>uuid:nas</UDN>
    <serviceList>
      <service>
        <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
        <controlURL>upnp/control/cds</controlURL>
        <eventSubURL>upnp/event/cds</eventSubURL>
      </service>
    </serviceList>
  </device>
</root>"#;

        let device = Description::from_xml(xml)
            .unwrap()
            .to_device("http://10.0.0.5:8080/description.xml")
            .unwrap();
        assert_eq!(
            device.content_directory.control_url,
            "http://10.0.0.5:49152/upnp/control/cds"
        );
    }

    #[test]
    fn test_embedded_media_server() {
        let xml = r#"<root>
  <device>
    <deviceType>urn:schemas-upnp-org:device:Basic:1</deviceType>
    <friendlyName>Router</friendlyName>
    <UDN>uuid:router</UDN>
    <deviceList>
      <device>
        <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
        <friendlyName>Router Media</friendlyName>
        <UDN>uuid:router-media</UDN>
        <serviceList>
          <service>
            <serviceType>urn:schemas-upnp-org:service:ContentDirectory:1</serviceType>
            <controlURL>http://192.168.1.1:5000/cds</controlURL>
          </service>
        </serviceList>
      </device>
    </deviceList>
  </device>
</root>"#;

        let device = Description::from_xml(xml)
            .unwrap()
            .to_device("http://192.168.1.1:5000/desc.xml")
            .unwrap();
        assert_eq!(device.udn, "uuid:router-media");
        assert_eq!(device.content_directory.control_url, "http://192.168.1.1:5000/cds");
        assert_eq!(device.content_directory.event_sub_url, None);
    }

    #[test]
    fn test_not_media_server() {
        let xml = r#"<root>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaRenderer:1</deviceType>
    <friendlyName>Speaker</friendlyName>
    <UDN>uuid:speaker</UDN>
  </device>
</root>"#;

        let description = Description::from_xml(xml).unwrap();
        assert!(!description.root.is_media_server());
        assert!(matches!(
            description.to_device("http://192.168.1.30/desc.xml"),
            Err(DiscoveryError::InvalidDevice(_))
        ));
    }

    #[test]
    fn test_media_server_without_content_directory() {
        let xml = r#"<root>
  <device>
    <deviceType>urn:schemas-upnp-org:device:MediaServer:1</deviceType>
    <friendlyName>Broken</friendlyName>
    <UDN>uuid:broken</UDN>
  </device>
</root>"#;

        let description = Description::from_xml(xml).unwrap();
        assert!(description.root.content_directory().is_none());
        assert!(matches!(
            description.to_device("http://192.168.1.31/desc.xml"),
            Err(DiscoveryError::InvalidDevice(_))
        ));
    }

    #[test]
    fn test_malformed_description() {
        assert!(matches!(
            DeviceDescription::from_xml("<root><device>"),
            Err(DiscoveryError::ParseError(_))
        ));
    }
}
