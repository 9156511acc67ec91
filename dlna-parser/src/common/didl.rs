//! DIDL-Lite structures for ContentDirectory items

use serde::Deserialize;

use crate::common::xml_decode;
use crate::error::ParseResult;

/// One `<item>` element of a DIDL-Lite document, after namespace stripping.
///
/// ```xml
/// <item id="64$0$1" parentID="64$0" restricted="1">
///   <dc:title>Song Title</dc:title>
///   <upnp:artist>Artist Name</upnp:artist>
///   <upnp:album>Album Name</upnp:album>
///   <upnp:class>object.item.audioItem.musicTrack</upnp:class>
///   <res duration="0:03:58.000" protocolInfo="http-get:*:audio/mpeg:*">http://…/22.mp3</res>
/// </item>
/// ```
///
/// Every field is optional so that a sparse item still decodes; deciding
/// what is required for a track happens in [`Track::from_item`](crate::Track::from_item).
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DidlItem {
    #[serde(rename = "@id", default)]
    pub id: Option<String>,

    #[serde(rename = "@parentID", default)]
    pub parent_id: Option<String>,

    /// Item class (e.g., object.item.audioItem.musicTrack)
    #[serde(rename = "class", default)]
    pub class: Option<String>,

    #[serde(rename = "title", default)]
    pub title: Option<String>,

    #[serde(rename = "creator", default)]
    pub creator: Option<String>,

    #[serde(rename = "artist", default)]
    pub artists: Vec<DidlArtist>,

    #[serde(rename = "album", default)]
    pub album: Option<String>,

    #[serde(rename = "genre", default)]
    pub genres: Vec<DidlText>,

    /// ISO 8601 date, usually `YYYY-MM-DD`
    #[serde(rename = "date", default)]
    pub date: Option<String>,

    #[serde(rename = "originalTrackNumber", default)]
    pub original_track_number: Option<String>,

    #[serde(rename = "albumArtURI", default)]
    pub album_art_uris: Vec<DidlText>,

    /// Resources in declaration order; the first one is the playable URI
    #[serde(rename = "res", default)]
    pub resources: Vec<DidlResource>,
}

impl DidlItem {
    /// Decode a single `<item>…</item>` fragment.
    pub fn from_xml(xml: &str) -> ParseResult<Self> {
        xml_decode::parse(xml)
    }

    /// True for `object.item.audioItem` and its subclasses.
    pub fn is_audio(&self) -> bool {
        self.class
            .as_deref()
            .is_some_and(|c| c.trim().starts_with("object.item.audioItem"))
    }
}

/// `upnp:artist`, optionally qualified by a role such as `AlbumArtist`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DidlArtist {
    #[serde(rename = "@role", default)]
    pub role: Option<String>,

    #[serde(rename = "$text", default)]
    pub name: String,
}

/// Text content of an element whose attributes are not needed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct DidlText {
    #[serde(rename = "$text", default)]
    pub value: String,
}

/// Resource element in DIDL-Lite containing media resource information.
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DidlResource {
    /// Duration in `H+:MM:SS[.F+]` format
    #[serde(rename = "@duration", default)]
    pub duration: Option<String>,

    #[serde(rename = "@protocolInfo", default)]
    pub protocol_info: Option<String>,

    #[serde(rename = "@size", default)]
    pub size: Option<String>,

    /// The resource URI
    #[serde(rename = "$text", default)]
    pub uri: Option<String>,
}
