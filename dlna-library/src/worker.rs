//! Background worker thread for the library
//!
//! Spawns a thread with its own current-thread tokio runtime. Everything
//! that mutates library state (discovery events, facade commands, scan
//! results, debounce timers, change notifications) arrives on a channel and
//! is handled by one `select!` loop, so no lock guards the device set or the
//! catalogs. The loop publishes a read-only snapshot for the sync facade.

use std::collections::HashMap;
use std::sync::{mpsc as std_mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use callback_server::{CallbackServer, NotificationPayload};
use dlna_discovery::{Device, DeviceEvent};
use dlna_parser::Track;
use parking_lot::RwLock;
use soap_client::SoapClient;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::LibraryConfig;
use crate::content_directory::TransportFactory;
use crate::error::{LibraryError, Result};
use crate::events::LibraryEvent;
use crate::observer::ObserverRegistry;
use crate::registry::{DeviceRegistry, RegistryChange};
use crate::subscription::{ChangeNotification, GenaSubscriber};
use crate::sync::{CatalogSync, RescanOutcome, SyncMessage};

/// Commands sent from the sync [`MediaLibrary`](crate::MediaLibrary) to the worker
#[derive(Debug)]
pub(crate) enum Command {
    /// Start discovery; replies `Ok(false)` if it was already running
    Start(oneshot::Sender<Result<bool>>),
    /// Re-probe the network
    Rescan,
    /// Add a device without discovering it
    AddDevice(Device),
    /// Connect a known device; replies `DeviceNotFound` for unknown UDNs
    Connect(String, oneshot::Sender<Result<()>>),
    Disconnect(String),
    /// Scan a connected device now; replies `DeviceNotFound` if not connected
    RescanNow(String, oneshot::Sender<Result<()>>),
    Shutdown,
}

#[derive(Debug, Clone)]
pub(crate) struct CatalogSnapshot {
    pub(crate) tracks: Arc<[Track]>,
    pub(crate) scanning: bool,
}

/// What the facade can read without a round trip to the worker.
#[derive(Debug, Default)]
pub(crate) struct LibraryState {
    pub(crate) devices: HashMap<String, Device>,
    pub(crate) catalogs: HashMap<String, CatalogSnapshot>,
}

/// How long a stopping runtime waits for scans still in flight.
const RUNTIME_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(1);

pub(crate) type SharedState = Arc<RwLock<LibraryState>>;

pub(crate) struct WorkerContext {
    pub(crate) config: LibraryConfig,
    pub(crate) transports: Arc<dyn TransportFactory>,
    pub(crate) state: SharedState,
    pub(crate) observers: Arc<ObserverRegistry>,
}

/// Spawn the worker thread. Returns once its runtime is up.
pub(crate) fn spawn_library_worker(
    context: WorkerContext,
    commands: mpsc::UnboundedReceiver<Command>,
) -> Result<JoinHandle<()>> {
    let (ready_tx, ready_rx) = std_mpsc::sync_channel(1);

    let thread = thread::Builder::new()
        .name("dlna-library".to_string())
        .spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(e.to_string()));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            let mut registry = rt.block_on(run_event_loop(context, commands));
            // Scans still blocked on a slow server are abandoned
            rt.shutdown_timeout(RUNTIME_SHUTDOWN_TIMEOUT);
            registry.stop();
            info!("library worker shut down");
        })
        .map_err(|e| LibraryError::WorkerStart(e.to_string()))?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(thread),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(LibraryError::WorkerStart(e))
        }
        Err(_) => Err(LibraryError::WorkerStart(
            "worker thread exited during startup".to_string(),
        )),
    }
}

struct EventLoop {
    registry: DeviceRegistry,
    sync: CatalogSync<Option<GenaSubscriber>>,
    state: SharedState,
    observers: Arc<ObserverRegistry>,
    device_tx: mpsc::UnboundedSender<DeviceEvent>,
}

/// Runs until shutdown and hands back the registry, whose discovery thread
/// is joined outside the runtime.
async fn run_event_loop(
    context: WorkerContext,
    mut commands: mpsc::UnboundedReceiver<Command>,
) -> DeviceRegistry {
    let WorkerContext {
        config,
        transports,
        state,
        observers,
    } = context;

    let (device_tx, mut device_rx) = mpsc::unbounded_channel::<DeviceEvent>();
    let (sync_tx, mut sync_rx) = mpsc::unbounded_channel::<SyncMessage>();
    let (change_tx, mut change_rx) = mpsc::unbounded_channel::<ChangeNotification>();
    let (notify_tx, mut notify_rx) = mpsc::unbounded_channel::<NotificationPayload>();

    let subscriber = if config.change_tracking {
        start_subscriber(&config, notify_tx, change_tx).await
    } else {
        debug!("change tracking disabled");
        None
    };

    let sync = CatalogSync::new(
        transports,
        subscriber,
        config.page_size,
        config.rescan_delay,
        sync_tx,
    );

    let mut event_loop = EventLoop {
        registry: DeviceRegistry::new(config.discovery.clone()),
        sync,
        state,
        observers,
        device_tx,
    };

    info!("library worker started");

    loop {
        tokio::select! {
            command = commands.recv() => {
                let Some(command) = command else {
                    debug!("library handle dropped, shutting down worker");
                    break;
                };
                if !event_loop.handle_command(command) {
                    break;
                }
            }
            Some(event) = device_rx.recv() => event_loop.handle_device_event(event),
            Some(message) = sync_rx.recv() => event_loop.handle_sync_message(message),
            Some(change) = change_rx.recv() => {
                event_loop.sync.handle_change(&change.udn, &change.token);
            }
            Some(payload) = notify_rx.recv() => {
                if let Some(subscriber) = event_loop.sync.subscriber() {
                    subscriber.dispatch(payload);
                }
            }
        }
    }

    event_loop.shutdown().await
}

async fn start_subscriber(
    config: &LibraryConfig,
    notify_tx: mpsc::UnboundedSender<NotificationPayload>,
    change_tx: mpsc::UnboundedSender<ChangeNotification>,
) -> Option<GenaSubscriber> {
    match CallbackServer::new(config.callback_port_range, notify_tx).await {
        Ok(server) => {
            info!(url = %server.base_url(), "callback server listening");
            let client =
                SoapClient::with_timeouts(config.soap_connect_timeout, config.soap_read_timeout);
            Some(GenaSubscriber::new(
                server,
                client,
                config.subscription_timeout,
                change_tx,
            ))
        }
        Err(e) => {
            warn!("callback server unavailable, running without change notifications: {}", e);
            None
        }
    }
}

impl EventLoop {
    /// Returns `false` when the loop should stop.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Start(reply) => {
                let device_tx = self.device_tx.clone();
                let result = self.registry.start(move |event| {
                    let _ = device_tx.send(event);
                });
                if let Err(e) = &result {
                    warn!("failed to start discovery: {}", e);
                }
                let _ = reply.send(result);
            }
            Command::Rescan => self.registry.rescan(),
            Command::AddDevice(device) => {
                if let Some(change) = self.registry.insert(device) {
                    self.apply_registry_change(change);
                }
            }
            Command::Connect(udn, reply) => {
                let result = match self.registry.get(&udn).cloned() {
                    Some(device) => {
                        self.sync.connect(&device);
                        self.refresh_catalog(&udn);
                        Ok(())
                    }
                    None => {
                        warn!(%udn, "connect for unknown device");
                        Err(LibraryError::DeviceNotFound(udn))
                    }
                };
                let _ = reply.send(result);
            }
            Command::Disconnect(udn) => {
                self.sync.disconnect(&udn);
                self.refresh_catalog(&udn);
            }
            Command::RescanNow(udn, reply) => {
                let outcome = self.sync.request_rescan(&udn);
                debug!(%udn, ?outcome, "manual rescan");
                let result = match outcome {
                    RescanOutcome::NotConnected => Err(LibraryError::DeviceNotFound(udn)),
                    RescanOutcome::Started | RescanOutcome::Dropped => {
                        self.refresh_catalog(&udn);
                        Ok(())
                    }
                };
                let _ = reply.send(result);
            }
            Command::Shutdown => {
                info!("worker received shutdown command");
                return false;
            }
        }
        true
    }

    fn handle_device_event(&mut self, event: DeviceEvent) {
        if let Some(change) = self.registry.handle_event(event) {
            self.apply_registry_change(change);
        }
    }

    fn apply_registry_change(&mut self, change: RegistryChange) {
        match change {
            RegistryChange::Added(device) => {
                self.state
                    .write()
                    .devices
                    .insert(device.udn.clone(), device.clone());
                self.publish(LibraryEvent::DeviceAvailable(device));
            }
            RegistryChange::Removed(device) => {
                // Losing the device takes its catalog and timer with it
                self.sync.disconnect(&device.udn);
                {
                    let mut state = self.state.write();
                    state.devices.remove(&device.udn);
                    state.catalogs.remove(&device.udn);
                }
                self.publish(LibraryEvent::DeviceUnavailable { udn: device.udn });
            }
        }
    }

    fn handle_sync_message(&mut self, message: SyncMessage) {
        let udn = match &message {
            SyncMessage::ScanFinished { udn, .. } | SyncMessage::RescanDue { udn, .. } => {
                udn.clone()
            }
        };

        let event = self.sync.handle_message(message);
        self.refresh_catalog(&udn);
        if let Some(event) = event {
            self.publish(event);
        }
    }

    /// Copy one catalog's current state into the shared snapshot.
    fn refresh_catalog(&self, udn: &str) {
        let mut state = self.state.write();
        match self.sync.tracks(udn) {
            Some(tracks) => {
                state.catalogs.insert(
                    udn.to_string(),
                    CatalogSnapshot {
                        tracks,
                        scanning: self.sync.is_scanning(udn),
                    },
                );
            }
            None => {
                state.catalogs.remove(udn);
            }
        }
    }

    fn publish(&self, event: LibraryEvent) {
        self.observers.emit(&event);
    }

    async fn shutdown(self) -> DeviceRegistry {
        if let Some(subscriber) = self.sync.shutdown() {
            subscriber.close().await;
        }

        self.state.write().catalogs.clear();
        self.observers.close_sinks();
        self.registry
    }
}
