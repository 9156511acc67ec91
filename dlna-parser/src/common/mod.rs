//! Common utilities and data structures shared across UPnP services
//!
//! - [`xml_decode`]: namespace stripping and serde decoding
//! - [`didl`]: DIDL-Lite item structures

pub mod didl;
pub mod xml_decode;

pub use didl::{DidlArtist, DidlItem, DidlResource, DidlText};
