//! Background discovery worker
//!
//! Runs SSDP on its own OS thread: periodic and on-demand M-SEARCH rounds,
//! an optional multicast NOTIFY listener, description fetches and presence
//! expiry. Every change is reported to the caller-supplied sink as a
//! [`DeviceEvent`]; the worker never shares its device set.

use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::DiscoveryConfig;
use crate::discovery::{description_client, fetch_device};
use crate::error::{DiscoveryError, Result};
use crate::ssdp::{udn_from_usn, NotifyListener, SsdpClient, SsdpMessage, SsdpResponse};
use crate::tracker::Tracker;
use crate::DeviceEvent;

/// Commands sent from the [`DiscoveryHandle`] to the worker thread
#[derive(Debug)]
enum Command {
    /// Send an M-SEARCH right away
    Rescan,
    /// Stop the worker
    Shutdown,
}

/// Entry point for starting background discovery.
pub struct DiscoveryWorker;

impl DiscoveryWorker {
    /// Spawn the worker thread. Events are delivered to `sink` from that thread.
    ///
    /// Fails only when the search socket or HTTP client cannot be created;
    /// a NOTIFY listener that cannot bind is logged and skipped.
    pub fn spawn<F>(config: DiscoveryConfig, sink: F) -> Result<DiscoveryHandle>
    where
        F: FnMut(DeviceEvent) + Send + 'static,
    {
        config.validate()?;

        let (command_tx, command_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::sync_channel(1);

        // Sockets and the blocking HTTP client are created on the worker
        // thread so none of them is ever built or dropped inside an async runtime.
        let thread = thread::Builder::new()
            .name("dlna-discovery".to_string())
            .spawn(move || {
                let setup = setup(&config);
                let (search, listener, state) = match setup {
                    Ok(parts) => {
                        let _ = ready_tx.send(Ok(()));
                        parts
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run(config, search, listener, state, command_rx, sink);
            })
            .map_err(|e| DiscoveryError::NetworkError(format!("Failed to spawn discovery thread: {}", e)))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(DiscoveryHandle {
                command_tx,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => Err(DiscoveryError::NetworkError(
                "Discovery thread exited during startup".to_string(),
            )),
        }
    }
}

fn setup(config: &DiscoveryConfig) -> Result<(SsdpClient, Option<NotifyListener>, DiscoveryState)> {
    let search = SsdpClient::new(config.poll_interval)?;
    let listener = if config.listen_for_notify {
        match NotifyListener::bind(config.poll_interval) {
            Ok(listener) => Some(listener),
            Err(e) => {
                warn!("NOTIFY listener unavailable, relying on M-SEARCH only: {}", e);
                None
            }
        }
    } else {
        None
    };
    let state = DiscoveryState::new(config)?;
    Ok((search, listener, state))
}

/// Control handle for a running discovery worker. Dropping it stops the worker.
#[derive(Debug)]
pub struct DiscoveryHandle {
    command_tx: mpsc::Sender<Command>,
    thread: Option<JoinHandle<()>>,
}

impl DiscoveryHandle {
    /// Ask the worker to re-probe the network. Never blocks.
    pub fn rescan(&self) {
        if self.command_tx.send(Command::Rescan).is_err() {
            debug!("discovery worker already stopped");
        }
    }

    /// Stop the worker and wait for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let _ = self.command_tx.send(Command::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("discovery worker panicked");
            }
        }
    }
}

impl Drop for DiscoveryHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run<F>(
    config: DiscoveryConfig,
    search: SsdpClient,
    listener: Option<NotifyListener>,
    mut state: DiscoveryState,
    command_rx: mpsc::Receiver<Command>,
    mut sink: F,
) where
    F: FnMut(DeviceEvent),
{
    info!(search_target = %config.search_target, "discovery worker started");
    let mut next_search = Instant::now();

    loop {
        loop {
            match command_rx.try_recv() {
                Ok(Command::Rescan) => {
                    info!("manual rescan requested");
                    next_search = Instant::now();
                }
                Ok(Command::Shutdown) | Err(mpsc::TryRecvError::Disconnected) => {
                    info!("discovery worker stopped");
                    return;
                }
                Err(mpsc::TryRecvError::Empty) => break,
            }
        }

        let now = Instant::now();
        if now >= next_search {
            if let Err(e) = search.send_search(&config.search_target) {
                warn!("M-SEARCH failed: {}", e);
            }
            next_search = now + config.search_interval;
        }

        match search.recv() {
            Ok(Some(message)) => state.handle(message, Instant::now(), &mut sink),
            Ok(None) => {}
            Err(e) => warn!("SSDP search socket error: {}", e),
        }

        if let Some(listener) = &listener {
            match listener.recv() {
                Ok(Some(message)) => state.handle(message, Instant::now(), &mut sink),
                Ok(None) => {}
                Err(e) => warn!("SSDP listener error: {}", e),
            }
        }

        state.expire(Instant::now(), &mut sink);
    }
}

/// Turns SSDP messages into device events.
pub(crate) struct DiscoveryState {
    tracker: Tracker,
    http_client: reqwest::blocking::Client,
    search_target: String,
    default_max_age: Duration,
}

impl DiscoveryState {
    pub fn new(config: &DiscoveryConfig) -> Result<Self> {
        Ok(Self {
            tracker: Tracker::new(),
            http_client: description_client(config.search_timeout)?,
            search_target: config.search_target.clone(),
            default_max_age: config.default_max_age,
        })
    }

    pub fn handle(&mut self, message: SsdpMessage, now: Instant, sink: &mut dyn FnMut(DeviceEvent)) {
        let Some(udn) = udn_from_usn(message.usn()).map(str::to_string) else {
            debug!(usn = message.usn(), "ignoring announcement without UDN");
            return;
        };

        match message {
            SsdpMessage::SearchResponse(advert) | SsdpMessage::Alive(advert) => {
                self.handle_advert(&udn, &advert, now, sink);
            }
            SsdpMessage::ByeBye { .. } => {
                if self.tracker.remove(&udn) {
                    info!(%udn, "media server said byebye");
                    sink(DeviceEvent::Lost { udn });
                }
            }
        }
    }

    fn handle_advert(
        &mut self,
        udn: &str,
        advert: &SsdpResponse,
        now: Instant,
        sink: &mut dyn FnMut(DeviceEvent),
    ) {
        let max_age = advert
            .max_age
            .map(Duration::from_secs)
            .unwrap_or(self.default_max_age);

        // Any announcement from a known device keeps it alive
        if self.tracker.refresh(udn, max_age, now) {
            return;
        }

        if advert.urn != self.search_target {
            return;
        }

        match fetch_device(&self.http_client, &advert.location) {
            Ok(device) => {
                if device.udn != udn {
                    debug!(announced = udn, described = %device.udn, "UDN mismatch, using description");
                }
                if self.tracker.refresh(&device.udn, max_age, now) {
                    return;
                }
                self.tracker.insert(&device.udn, max_age, now);
                info!(udn = %device.udn, name = %device.friendly_name, "media server available");
                sink(DeviceEvent::Found(device));
            }
            Err(e) => warn!(location = %advert.location, "failed to describe media server: {}", e),
        }
    }

    pub fn expire(&mut self, now: Instant, sink: &mut dyn FnMut(DeviceEvent)) {
        for udn in self.tracker.expire(now) {
            info!(%udn, "media server advertisement expired");
            sink(DeviceEvent::Lost { udn });
        }
    }
}
