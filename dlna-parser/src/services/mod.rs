//! Service-specific parsers organized by UPnP service type
//!
//! ## Available Services
//!
//! - [`content_directory`]: ContentDirectory change notifications
//!
//! ## Usage
//!
//! ```rust
//! use dlna_parser::services::content_directory::ContentDirectoryEvent;
//! ```

pub mod content_directory;
