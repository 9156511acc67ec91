//! # dlna-parser
//!
//! XML parsing for the dlna-sdk workspace: DIDL-Lite result documents from a
//! ContentDirectory `Search`/`Browse`, and ContentDirectory GENA events.
//!
//! ## Usage
//!
//! ### Tracks from a Search result
//! ```rust
//! use dlna_parser::DidlParser;
//!
//! let didl = r#"<DIDL-Lite><item id="1"><upnp:class>object.item.audioItem.musicTrack</upnp:class><res duration="0:03:58">http://h/1.mp3</res></item></DIDL-Lite>"#;
//! for track in DidlParser::new(didl).tracks() {
//!     let track = track?;
//!     println!("{} ({:?})", track.uri, track.length);
//! }
//! # Ok::<(), dlna_parser::ParseError>(())
//! ```
//!
//! ### Change notifications
//! ```rust
//! use dlna_parser::ContentDirectoryEvent;
//!
//! let event = ContentDirectoryEvent::from_xml(
//!     r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><SystemUpdateID>3</SystemUpdateID></e:property></e:propertyset>"#,
//! )?;
//! assert_eq!(event.system_update_id(), Some("3"));
//! # Ok::<(), dlna_parser::ParseError>(())
//! ```

pub mod common;
pub mod error;
mod parser;
pub mod services;
mod track;

pub use error::{ItemError, ParseError, ParseResult};

pub use common::{DidlItem, DidlResource};
pub use parser::{DidlEntry, DidlParser, Entries, Tracks};
pub use track::{parse_duration, Track};

pub use services::content_directory::ContentDirectoryEvent;
