//! ContentDirectory service event parser module
//!
//! A media server announces library changes by eventing `SystemUpdateID`,
//! and optionally `ContainerUpdateIDs`, to every GENA subscriber.
//!
//! ## Usage
//!
//! ```rust
//! use dlna_parser::services::content_directory::ContentDirectoryEvent;
//!
//! let xml = r#"<e:propertyset xmlns:e="urn:schemas-upnp-org:event-1-0"><e:property><SystemUpdateID>17</SystemUpdateID></e:property></e:propertyset>"#;
//! let event = ContentDirectoryEvent::from_xml(xml).unwrap();
//! assert_eq!(event.system_update_id(), Some("17"));
//! ```

pub mod parser;

pub use parser::{ContentDirectoryEvent, Property};
