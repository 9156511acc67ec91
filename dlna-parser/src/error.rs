//! Error types for XML parsing operations

use thiserror::Error;

/// Errors that invalidate a whole document
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    /// XML deserialization failed
    #[error("XML deserialization failed: {0}")]
    XmlDeserializationFailed(String),

    /// The document is not well-formed
    #[error("Invalid XML structure: {0}")]
    InvalidXmlStructure(String),
}

/// A single DIDL-Lite item that could not be turned into a track.
///
/// Item errors never abort a document; siblings are still parsed.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ItemError {
    #[error("item {id:?} could not be decoded: {reason}")]
    Undecodable { id: Option<String>, reason: String },

    #[error("item {id:?} has no playable resource")]
    MissingResource { id: Option<String> },
}

/// Result type alias for parsing operations
pub type ParseResult<T> = Result<T, ParseError>;
