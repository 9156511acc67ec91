//! # dlna-library
//!
//! Audio catalog of the DLNA/UPnP media servers on the local network.
//!
//! The library discovers MediaServers, scans the audio items of the ones you
//! connect to through their ContentDirectory `Search` action, and keeps each
//! catalog current: servers announce content changes through GENA events,
//! and a change is followed by one full rescan once the server has been
//! quiet for a few seconds.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dlna_library::{LibraryEvent, MediaLibrary};
//!
//! let library = MediaLibrary::new()?;
//! library.on_catalog_changed(|udn, tracks| {
//!     println!("{udn}: {} tracks", tracks.len());
//! });
//!
//! let events = library.iter();
//! library.start()?;
//!
//! for event in events {
//!     if let LibraryEvent::DeviceAvailable(device) = event {
//!         library.connect(&device.udn)?;
//!     }
//! }
//! # Ok::<(), dlna_library::LibraryError>(())
//! ```
//!
//! ## Threading
//!
//! `MediaLibrary` is synchronous. A worker thread runs a single-threaded
//! tokio runtime that serializes every state change; scans run on its
//! blocking pool, and discovery has a thread of its own. Observer callbacks
//! run on the worker thread.
//!
//! ## Logging
//!
//! The library logs through `tracing`. See [`logging`] for ready-made
//! subscriber setups.

pub mod config;
pub mod content_directory;
pub mod debouncer;
pub mod error;
pub mod events;
pub mod iter;
pub mod logging;
pub mod registry;
pub mod subscription;
pub mod sync;

mod catalog;
mod library;
mod observer;
mod worker;

pub use config::LibraryConfig;
pub use content_directory::{
    ContentDirectoryClient, SearchPage, SearchTransport, SoapSearchTransport, SoapTransportFactory,
    TransportFactory,
};
pub use debouncer::{ChangeDebouncer, DebounceState};
pub use error::{LibraryError, Result, ScanError};
pub use events::LibraryEvent;
pub use iter::LibraryEventIterator;
pub use library::{MediaLibrary, MediaLibraryBuilder};
pub use observer::ObserverHandle;
pub use registry::{DeviceRegistry, RegistryChange};
pub use sync::{CatalogSync, ChangeSubscriber, RescanOutcome, SyncMessage};

pub use dlna_discovery::{Device, DeviceEvent, DiscoveryConfig, ServiceEndpoint};
pub use dlna_parser::Track;
