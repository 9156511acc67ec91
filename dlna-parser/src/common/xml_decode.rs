//! XML decoding utilities.
//!
//! DIDL-Lite and GENA documents mix several namespaces (`dc:`, `upnp:`,
//! `dlna:`, `e:`). Prefixes are stripped before handing the text to serde
//! so the structs can use plain local names.

use serde::de::DeserializeOwned;

use crate::error::{ParseError, ParseResult};

/// Parse XML string into a deserializable type with namespace stripping.
pub fn parse<T: DeserializeOwned>(xml: &str) -> ParseResult<T> {
    let stripped = strip_namespaces(xml);
    quick_xml::de::from_str(&stripped)
        .map_err(|e| ParseError::XmlDeserializationFailed(e.to_string()))
}

/// Strip namespace prefixes from element and attribute names and drop
/// `xmlns` declarations. Text and attribute values are copied untouched.
///
/// # Example
///
/// Input: `<e:propertyset xmlns:e="urn:x"><dc:title>Song</dc:title></e:propertyset>`
/// Output: `<propertyset><title>Song</title></propertyset>`
pub fn strip_namespaces(xml: &str) -> String {
    let mut result = String::with_capacity(xml.len());
    let mut chars = xml.chars().peekable();

    while let Some(c) = chars.next() {
        result.push(c);
        if c != '<' {
            continue;
        }

        if let Some(slash) = chars.next_if_eq(&'/') {
            result.push(slash);
        }

        // Declarations, comments, CDATA and processing instructions pass through
        if matches!(chars.peek(), Some('?') | Some('!')) {
            for ch in chars.by_ref() {
                result.push(ch);
                if ch == '>' {
                    break;
                }
            }
            continue;
        }

        let mut name = String::new();
        while let Some(ch) = chars.next_if(|ch| !ch.is_whitespace() && *ch != '>' && *ch != '/') {
            name.push(ch);
        }
        result.push_str(local_name(&name));

        // Attributes up to the end of the tag
        while let Some(&ch) = chars.peek() {
            if ch == '>' {
                result.push(ch);
                chars.next();
                break;
            }
            if ch == '/' || ch.is_whitespace() {
                result.push(ch);
                chars.next();
                continue;
            }

            let mut attr_name = String::new();
            while let Some(ach) =
                chars.next_if(|a| *a != '=' && !a.is_whitespace() && *a != '>' && *a != '/')
            {
                attr_name.push(ach);
            }

            let keep = !(attr_name == "xmlns" || attr_name.starts_with("xmlns:"));
            if keep {
                result.push_str(local_name(&attr_name));
            }

            // `=` and the quoted value, tolerating whitespace around `=`
            let mut value = String::new();
            while let Some(vch) = chars.next_if(|v| v.is_whitespace() || *v == '=') {
                value.push(vch);
            }
            if let Some(quote) = chars.next_if(|q| *q == '"' || *q == '\'') {
                value.push(quote);
                for vch in chars.by_ref() {
                    value.push(vch);
                    if vch == quote {
                        break;
                    }
                }
            }
            if keep {
                result.push_str(&value);
            }
        }
    }

    result
}

fn local_name(name: &str) -> &str {
    name.split_once(':').map_or(name, |(_, local)| local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[test]
    fn test_strip_namespaces_basic() {
        let input = r#"<e:propertyset><e:property>test</e:property></e:propertyset>"#;
        let expected = r#"<propertyset><property>test</property></propertyset>"#;
        assert_eq!(strip_namespaces(input), expected);
    }

    #[test]
    fn test_strip_namespaces_with_attributes() {
        let input = r#"<upnp:albumArtURI dlna:profileID="JPEG_TN">http://x/a.jpg</upnp:albumArtURI>"#;
        let expected = r#"<albumArtURI profileID="JPEG_TN">http://x/a.jpg</albumArtURI>"#;
        assert_eq!(strip_namespaces(input), expected);
    }

    #[test]
    fn test_strip_namespaces_drops_declarations() {
        let input = r#"<DIDL-Lite xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/" xmlns:dc="http://purl.org/dc/elements/1.1/"><item id="1"/></DIDL-Lite>"#;
        let expected = r#"<DIDL-Lite  ><item id="1"/></DIDL-Lite>"#;
        assert_eq!(strip_namespaces(input), expected);
    }

    #[test]
    fn test_strip_namespaces_leaves_text_and_values() {
        let input = r#"<res protocolInfo="http-get:*:audio/mpeg:*">http://10.0.0.2:8200/MediaItems/22.mp3</res>"#;
        assert_eq!(strip_namespaces(input), input);
    }

    #[test]
    fn test_strip_namespaces_passes_through_declarations_and_comments() {
        let input = r#"<?xml version="1.0"?><!-- x:y --><a:b>c</a:b>"#;
        let expected = r#"<?xml version="1.0"?><!-- x:y --><b>c</b>"#;
        assert_eq!(strip_namespaces(input), expected);
    }

    #[test]
    fn test_parse_with_namespaces() {
        #[derive(Debug, Deserialize)]
        struct PropertySet {
            property: Property,
        }

        #[derive(Debug, Deserialize)]
        struct Property {
            #[serde(rename = "SystemUpdateID")]
            system_update_id: String,
        }

        let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><SystemUpdateID>42</SystemUpdateID></e:property></e:propertyset>"#;
        let result: PropertySet = parse(xml).unwrap();
        assert_eq!(result.property.system_update_id, "42");
    }
}
