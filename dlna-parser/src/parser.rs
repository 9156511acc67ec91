//! Streaming DIDL-Lite parser
//!
//! A `Search` or `Browse` result is a single DIDL-Lite document holding up to
//! a page of `<item>` and `<container>` elements. The document is walked with
//! a pull reader; each `<item>` fragment is sliced out and decoded on its
//! own, so a malformed item never takes its siblings down with it.

use quick_xml::events::Event;
use quick_xml::Reader;
use tracing::{trace, warn};

use crate::common::DidlItem;
use crate::error::{ItemError, ParseError, ParseResult};
use crate::track::Track;

/// Parser over one DIDL-Lite document.
///
/// ```
/// use dlna_parser::DidlParser;
///
/// let xml = r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/">
///   <item id="1" parentID="0"><dc:title>One</dc:title><upnp:class>object.item.audioItem.musicTrack</upnp:class><res>http://h/1.mp3</res></item>
///   <container id="2" parentID="0"><upnp:class>object.container</upnp:class></container>
/// </DIDL-Lite>"#;
///
/// let parser = DidlParser::new(xml);
/// let tracks: Vec<_> = parser.tracks().collect::<Result<_, _>>().unwrap();
/// assert_eq!(tracks.len(), 1);
/// assert_eq!(tracks[0].title.as_deref(), Some("One"));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DidlParser<'a> {
    xml: &'a str,
}

/// Outcome for one element of the document.
#[derive(Debug, Clone, PartialEq)]
pub enum DidlEntry {
    /// An audio item that produced a track
    Track(Track),
    /// A container, or an item of a non-audio class
    Skipped { id: Option<String>, class: Option<String> },
    /// An audio item that could not be turned into a track
    Invalid(ItemError),
}

impl<'a> DidlParser<'a> {
    pub fn new(xml: &'a str) -> Self {
        Self { xml }
    }

    /// Every `item` and `container` in document order.
    ///
    /// Yields at most one `Err`, for a document that is not well-formed,
    /// and then stops.
    pub fn entries(&self) -> Entries<'a> {
        Entries {
            xml: self.xml,
            reader: Reader::from_str(self.xml),
            done: false,
        }
    }

    /// Audio tracks in document order.
    ///
    /// Each call starts again from the beginning of the document. Items that
    /// fail to decode are logged and skipped.
    pub fn tracks(&self) -> Tracks<'a> {
        Tracks {
            entries: self.entries(),
        }
    }
}

/// Iterator returned by [`DidlParser::entries`].
pub struct Entries<'a> {
    xml: &'a str,
    reader: Reader<&'a [u8]>,
    done: bool,
}

impl<'a> Entries<'a> {
    fn next_entry(&mut self) -> ParseResult<Option<DidlEntry>> {
        loop {
            let start = self.reader.buffer_position();
            match self.reader.read_event() {
                Ok(Event::Start(e)) => match e.local_name().as_ref() {
                    b"item" => {
                        let id = attribute(&e, b"id");
                        self.reader
                            .read_to_end(e.name())
                            .map_err(|err| invalid_xml(&self.reader, err))?;
                        let end = self.reader.buffer_position();
                        return Ok(Some(self.decode_item(id, start, end)));
                    }
                    b"container" => {
                        let id = attribute(&e, b"id");
                        self.reader
                            .read_to_end(e.name())
                            .map_err(|err| invalid_xml(&self.reader, err))?;
                        return Ok(Some(DidlEntry::Skipped {
                            id,
                            class: Some("object.container".to_string()),
                        }));
                    }
                    _ => {}
                },
                Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                    b"item" => {
                        let end = self.reader.buffer_position();
                        return Ok(Some(self.decode_item(attribute(&e, b"id"), start, end)));
                    }
                    b"container" => {
                        return Ok(Some(DidlEntry::Skipped {
                            id: attribute(&e, b"id"),
                            class: Some("object.container".to_string()),
                        }));
                    }
                    _ => {}
                },
                Ok(Event::Eof) => return Ok(None),
                Ok(_) => {}
                Err(err) => return Err(invalid_xml(&self.reader, err)),
            }
        }
    }

    fn decode_item(&self, id: Option<String>, start: usize, end: usize) -> DidlEntry {
        let fragment = self.xml.get(start..end).unwrap_or_default();
        let item = match DidlItem::from_xml(fragment) {
            Ok(item) => item,
            Err(err) => {
                return DidlEntry::Invalid(ItemError::Undecodable {
                    id,
                    reason: err.to_string(),
                })
            }
        };

        if !item.is_audio() {
            return DidlEntry::Skipped {
                id: item.id,
                class: item.class,
            };
        }

        match Track::from_item(&item) {
            Ok(track) => DidlEntry::Track(track),
            Err(err) => DidlEntry::Invalid(err),
        }
    }
}

impl<'a> Iterator for Entries<'a> {
    type Item = ParseResult<DidlEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_entry() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

/// Iterator returned by [`DidlParser::tracks`].
pub struct Tracks<'a> {
    entries: Entries<'a>,
}

impl<'a> Iterator for Tracks<'a> {
    type Item = ParseResult<Track>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.entries.next()? {
                Ok(DidlEntry::Track(track)) => return Some(Ok(track)),
                Ok(DidlEntry::Skipped { id, class }) => {
                    trace!(?id, ?class, "skipping non-audio entry");
                }
                Ok(DidlEntry::Invalid(err)) => {
                    warn!(error = %err, "skipping unparseable DIDL-Lite item");
                }
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

fn attribute(e: &quick_xml::events::BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()))
}

fn invalid_xml(reader: &Reader<&[u8]>, err: quick_xml::Error) -> ParseError {
    ParseError::InvalidXmlStructure(format!(
        "{} at position {}",
        err,
        reader.buffer_position()
    ))
}
