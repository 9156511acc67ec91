//! Sync-first media library facade
//!
//! Provides a fully synchronous API over the library's event loop. All async
//! work (discovery, scans, change subscriptions) happens on the background
//! worker thread.

use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};

use dlna_discovery::Device;
use dlna_parser::Track;
use parking_lot::{Mutex, RwLock};
use soap_client::SoapClient;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::config::LibraryConfig;
use crate::content_directory::{SoapTransportFactory, TransportFactory};
use crate::error::{LibraryError, Result, ScanError};
use crate::events::LibraryEvent;
use crate::iter::LibraryEventIterator;
use crate::observer::{ObserverHandle, ObserverRegistry};
use crate::worker::{spawn_library_worker, Command, LibraryState, SharedState, WorkerContext};

/// Audio catalog of the media servers on the local network
///
/// Devices appear through discovery (after [`start`](Self::start)) or
/// [`add_device`](Self::add_device). Connecting a device scans its
/// ContentDirectory and, with change tracking on, rescans it a few seconds
/// after the server reports new content.
///
/// Commands are queued to the worker in call order. [`connect`](Self::connect)
/// and [`rescan_now`](Self::rescan_now) wait for the worker to accept them;
/// the rest return immediately. Outcomes are reported through observers and
/// [`iter`](Self::iter). Queries read a snapshot that the worker updates
/// before notifying observers.
///
/// # Example
///
/// ```rust,no_run
/// use dlna_library::{LibraryEvent, MediaLibrary};
///
/// let library = MediaLibrary::new()?;
/// let events = library.iter();
/// library.start()?;
///
/// for event in events {
///     match event {
///         LibraryEvent::DeviceAvailable(device) => library.connect(&device.udn)?,
///         LibraryEvent::CatalogChanged { udn, tracks } => {
///             println!("{udn}: {} tracks", tracks.len());
///         }
///         _ => {}
///     }
/// }
/// # Ok::<(), dlna_library::LibraryError>(())
/// ```
pub struct MediaLibrary {
    command_tx: mpsc::UnboundedSender<Command>,
    state: SharedState,
    observers: Arc<ObserverRegistry>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl MediaLibrary {
    /// Create a library with default configuration. Discovery is not started.
    pub fn new() -> Result<Self> {
        Self::builder().build()
    }

    pub fn with_config(config: LibraryConfig) -> Result<Self> {
        Self::builder().config(config).build()
    }

    pub fn builder() -> MediaLibraryBuilder {
        MediaLibraryBuilder::default()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.command_tx
            .send(command)
            .map_err(|_| LibraryError::WorkerStopped)
    }

    /// Send a command the worker validates, and wait for its verdict.
    ///
    /// From an observer callback the verdict cannot be awaited, since the
    /// worker is busy running the callback; the command is queued unchecked.
    fn request<F>(&self, command: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<Result<()>>) -> Command,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(command(reply_tx))?;
        if self.on_worker_thread() {
            return Ok(());
        }
        reply_rx
            .blocking_recv()
            .map_err(|_| LibraryError::WorkerStopped)?
    }

    fn on_worker_thread(&self) -> bool {
        self.worker
            .lock()
            .as_ref()
            .is_some_and(|worker| worker.thread().id() == thread::current().id())
    }

    /// Start network discovery. Returns `false` if it was already running.
    ///
    /// Blocks until the discovery worker is up.
    pub fn start(&self) -> Result<bool> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Start(reply_tx))?;
        reply_rx
            .blocking_recv()
            .map_err(|_| LibraryError::WorkerStopped)?
    }

    /// Ask discovery to probe the network again.
    pub fn rescan(&self) -> Result<()> {
        self.send(Command::Rescan)
    }

    /// Register a server that discovery cannot see. Ignored if its UDN is
    /// already known.
    pub fn add_device(&self, device: Device) -> Result<()> {
        self.send(Command::AddDevice(device))
    }

    /// Start tracking a known device's catalog. Connecting a connected
    /// device does nothing.
    ///
    /// Fails with [`LibraryError::DeviceNotFound`] unless the device was
    /// discovered or added before this call.
    pub fn connect(&self, udn: &str) -> Result<()> {
        self.request(|reply| Command::Connect(udn.to_string(), reply))
    }

    pub fn disconnect(&self, udn: &str) -> Result<()> {
        self.send(Command::Disconnect(udn.to_string()))
    }

    /// Rescan a connected device now. Dropped if a scan is already running.
    pub fn rescan_now(&self, udn: &str) -> Result<()> {
        self.request(|reply| Command::RescanNow(udn.to_string(), reply))
    }

    pub fn devices(&self) -> Vec<Device> {
        self.state.read().devices.values().cloned().collect()
    }

    pub fn device(&self, udn: &str) -> Option<Device> {
        self.state.read().devices.get(udn).cloned()
    }

    /// Visible tracks of a connected device, empty until its first scan
    /// completes. `None` if the device is not connected.
    pub fn tracks(&self, udn: &str) -> Option<Arc<[Track]>> {
        self.state
            .read()
            .catalogs
            .get(udn)
            .map(|catalog| Arc::clone(&catalog.tracks))
    }

    pub fn is_connected(&self, udn: &str) -> bool {
        self.state.read().catalogs.contains_key(udn)
    }

    pub fn is_scanning(&self, udn: &str) -> bool {
        self.state
            .read()
            .catalogs
            .get(udn)
            .is_some_and(|catalog| catalog.scanning)
    }

    /// Observe every event.
    pub fn observe<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&LibraryEvent) + Send + Sync + 'static,
    {
        self.observers.register(callback)
    }

    pub fn on_device_available<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&Device) + Send + Sync + 'static,
    {
        self.observe(move |event| {
            if let LibraryEvent::DeviceAvailable(device) = event {
                callback(device);
            }
        })
    }

    pub fn on_device_unavailable<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.observe(move |event| {
            if let LibraryEvent::DeviceUnavailable { udn } = event {
                callback(udn);
            }
        })
    }

    pub fn on_catalog_changed<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&str, &Arc<[Track]>) + Send + Sync + 'static,
    {
        self.observe(move |event| {
            if let LibraryEvent::CatalogChanged { udn, tracks } = event {
                callback(udn, tracks);
            }
        })
    }

    pub fn on_scan_failed<F>(&self, callback: F) -> ObserverHandle
    where
        F: Fn(&str, &ScanError) + Send + Sync + 'static,
    {
        self.observe(move |event| {
            if let LibraryEvent::ScanFailed { udn, error } = event {
                callback(udn, error);
            }
        })
    }

    /// Blocking iterator over events emitted from now on. Ends at shutdown.
    pub fn iter(&self) -> LibraryEventIterator {
        let (tx, rx) = std_mpsc::channel();
        self.observers.add_sink(tx);
        LibraryEventIterator::new(rx)
    }

    /// Stop discovery, cancel subscriptions and join the worker. Idempotent.
    pub fn shutdown(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };

        let _ = self.command_tx.send(Command::Shutdown);

        // Called from an observer callback: the loop exits on its own
        if worker.thread().id() == thread::current().id() {
            debug!("shutdown requested from worker thread");
            return;
        }

        if worker.join().is_err() {
            warn!("library worker panicked");
        }
    }
}

impl Drop for MediaLibrary {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for MediaLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("MediaLibrary")
            .field("devices", &state.devices.len())
            .field("connected", &state.catalogs.len())
            .finish()
    }
}

/// Builder for [`MediaLibrary`].
#[derive(Default)]
pub struct MediaLibraryBuilder {
    config: LibraryConfig,
    transports: Option<Arc<dyn TransportFactory>>,
}

impl MediaLibraryBuilder {
    pub fn config(mut self, config: LibraryConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace how scans reach servers. Defaults to SOAP `Search`.
    pub fn transports(mut self, transports: Arc<dyn TransportFactory>) -> Self {
        self.transports = Some(transports);
        self
    }

    pub fn build(self) -> Result<MediaLibrary> {
        self.config.validate()?;

        let transports = match self.transports {
            Some(transports) => transports,
            None => Arc::new(SoapTransportFactory::new(SoapClient::with_timeouts(
                self.config.soap_connect_timeout,
                self.config.soap_read_timeout,
            ))),
        };

        let state: SharedState = Arc::new(RwLock::new(LibraryState::default()));
        let observers = ObserverRegistry::new();
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let worker = spawn_library_worker(
            WorkerContext {
                config: self.config,
                transports,
                state: Arc::clone(&state),
                observers: Arc::clone(&observers),
            },
            command_rx,
        )?;

        Ok(MediaLibrary {
            command_tx,
            state,
            observers,
            worker: Mutex::new(Some(worker)),
        })
    }
}
