//! ContentDirectory event parser implementation

use serde::Deserialize;

use crate::common::xml_decode;
use crate::error::ParseResult;

/// Root of a ContentDirectory GENA notification.
///
/// Servers send one `property` per changed state variable:
/// ```xml
/// <e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0">
///   <e:property><SystemUpdateID>42</SystemUpdateID></e:property>
///   <e:property><ContainerUpdateIDs>64$0,7</ContainerUpdateIDs></e:property>
/// </e:propertyset>
/// ```
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename = "propertyset")]
pub struct ContentDirectoryEvent {
    #[serde(rename = "property", default)]
    pub properties: Vec<Property>,
}

/// One evented state variable.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Property {
    #[serde(rename = "SystemUpdateID", default)]
    pub system_update_id: Option<String>,

    /// Comma-separated `containerID,updateID` pairs
    #[serde(rename = "ContainerUpdateIDs", default)]
    pub container_update_ids: Option<String>,

    #[serde(rename = "TransferIDs", default)]
    pub transfer_ids: Option<String>,
}

impl ContentDirectoryEvent {
    /// Parse a GENA NOTIFY body.
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        xml_decode::parse(xml)
    }

    /// The system update token, if this notification carries one.
    ///
    /// When a server repeats the variable the last non-empty value wins.
    pub fn system_update_id(&self) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .filter_map(|p| p.system_update_id.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }

    /// Changed containers as `(container_id, update_id)` pairs.
    ///
    /// A trailing unpaired id is ignored.
    pub fn container_update_ids(&self) -> Vec<(String, String)> {
        self.properties
            .iter()
            .filter_map(|p| p.container_update_ids.as_deref())
            .flat_map(|raw| {
                let values: Vec<&str> = raw.split(',').map(str::trim).collect();
                values
                    .chunks_exact(2)
                    .map(|pair| (pair[0].to_string(), pair[1].to_string()))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_parse_system_update_id() {
        let xml = r#"<?xml version="1.0"?><e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><SystemUpdateID>42</SystemUpdateID></e:property></e:propertyset>"#;
        let event = ContentDirectoryEvent::from_xml(xml).unwrap();
        assert_eq!(event.system_update_id(), Some("42"));
        assert!(event.container_update_ids().is_empty());
    }

    #[test]
    fn test_parse_multiple_properties() {
        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><TransferIDs></TransferIDs></e:property><e:property><ContainerUpdateIDs>64$0,7,1$4,12</ContainerUpdateIDs></e:property><e:property><SystemUpdateID> 9 </SystemUpdateID></e:property></e:propertyset>"#;
        let event = ContentDirectoryEvent::from_xml(xml).unwrap();

        assert_eq!(event.properties.len(), 3);
        assert_eq!(event.system_update_id(), Some("9"));
        assert_eq!(
            event.container_update_ids(),
            vec![
                ("64$0".to_string(), "7".to_string()),
                ("1$4".to_string(), "12".to_string())
            ]
        );
    }

    #[rstest]
    #[case(r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><TransferIDs>3</TransferIDs></e:property></e:propertyset>"#)]
    #[case(r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><SystemUpdateID></SystemUpdateID></e:property></e:propertyset>"#)]
    #[case(r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"></e:propertyset>"#)]
    fn test_no_system_update_id(#[case] xml: &str) {
        let event = ContentDirectoryEvent::from_xml(xml).unwrap();
        assert_eq!(event.system_update_id(), None);
    }

    #[test]
    fn test_repeated_system_update_id_last_wins() {
        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><SystemUpdateID>5</SystemUpdateID></e:property><e:property><SystemUpdateID>6</SystemUpdateID></e:property></e:propertyset>"#;
        let event = ContentDirectoryEvent::from_xml(xml).unwrap();
        assert_eq!(event.system_update_id(), Some("6"));
    }

    #[test]
    fn test_parse_invalid_xml() {
        let result = ContentDirectoryEvent::from_xml("<propertyset><property>");
        assert!(matches!(
            result,
            Err(crate::error::ParseError::XmlDeserializationFailed(_))
        ));
    }
}
