//! Catalog synchronization
//!
//! `CatalogSync` owns every connected device's [`Catalog`] and runs on the
//! event loop. Scans execute on tokio's blocking pool and report back as
//! [`SyncMessage::ScanFinished`]; debounce timers report as
//! [`SyncMessage::RescanDue`]. Both carry the session id of the catalog
//! they were started for, so results for a disconnected (or reconnected)
//! device are discarded instead of applied.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dlna_discovery::Device;
use dlna_parser::Track;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::catalog::Catalog;
use crate::content_directory::{ContentDirectoryClient, TransportFactory};
use crate::debouncer::ChangeDebouncer;
use crate::error::ScanError;
use crate::events::LibraryEvent;

/// Messages posted back to the loop by scans and timers.
#[derive(Debug)]
pub enum SyncMessage {
    ScanFinished {
        udn: String,
        session: u64,
        result: Result<Vec<Track>, ScanError>,
    },
    RescanDue {
        udn: String,
        session: u64,
        generation: u64,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RescanOutcome {
    Started,
    /// A scan for the device was already running; the request was dropped
    Dropped,
    NotConnected,
}

/// Source of change notifications for connected devices.
///
/// Notifications themselves reach the sync through
/// [`CatalogSync::handle_change`].
pub trait ChangeSubscriber {
    fn subscribe(&mut self, device: &Device);
    fn unsubscribe(&mut self, udn: &str);
}

impl<S: ChangeSubscriber> ChangeSubscriber for Option<S> {
    fn subscribe(&mut self, device: &Device) {
        if let Some(subscriber) = self {
            subscriber.subscribe(device);
        }
    }

    fn unsubscribe(&mut self, udn: &str) {
        if let Some(subscriber) = self {
            subscriber.unsubscribe(udn);
        }
    }
}

pub struct CatalogSync<S> {
    catalogs: HashMap<String, Catalog>,
    transports: Arc<dyn TransportFactory>,
    subscriber: S,
    page_size: u32,
    rescan_delay: Duration,
    next_session: u64,
    messages: mpsc::UnboundedSender<SyncMessage>,
}

impl<S: ChangeSubscriber> CatalogSync<S> {
    /// `messages` is the loop's inbox; every [`SyncMessage`] read from it must
    /// be passed to [`handle_message`](Self::handle_message).
    pub fn new(
        transports: Arc<dyn TransportFactory>,
        subscriber: S,
        page_size: u32,
        rescan_delay: Duration,
        messages: mpsc::UnboundedSender<SyncMessage>,
    ) -> Self {
        Self {
            catalogs: HashMap::new(),
            transports,
            subscriber,
            page_size,
            rescan_delay,
            next_session: 1,
            messages,
        }
    }

    /// Start tracking `device`: initial scan, then change notifications.
    /// Returns `false` if it was already connected.
    pub fn connect(&mut self, device: &Device) -> bool {
        if self.catalogs.contains_key(&device.udn) {
            debug!(udn = %device.udn, "already connected");
            return false;
        }

        let session = self.next_session;
        self.next_session += 1;

        let client =
            ContentDirectoryClient::with_page_size(self.transports.transport(device), self.page_size);
        let debouncer = ChangeDebouncer::new(
            device.udn.clone(),
            session,
            self.rescan_delay,
            self.messages.clone(),
        );

        info!(udn = %device.udn, name = %device.friendly_name, "connecting catalog");
        self.catalogs
            .insert(device.udn.clone(), Catalog::new(session, client, debouncer));

        self.request_rescan(&device.udn);
        self.subscriber.subscribe(device);
        true
    }

    /// Stop tracking `udn` and discard its catalog. A scan in flight runs to
    /// completion but its result is ignored.
    pub fn disconnect(&mut self, udn: &str) -> bool {
        let Some(mut catalog) = self.catalogs.remove(udn) else {
            return false;
        };

        catalog.debouncer.cancel();
        self.subscriber.unsubscribe(udn);
        info!(udn, "catalog disconnected");
        true
    }

    /// Start a full scan of `udn` unless one is already running.
    pub fn request_rescan(&mut self, udn: &str) -> RescanOutcome {
        let Some(catalog) = self.catalogs.get_mut(udn) else {
            return RescanOutcome::NotConnected;
        };

        if !catalog.begin_scan() {
            info!(udn, "scan already in progress, rescan dropped");
            return RescanOutcome::Dropped;
        }

        let client = catalog.client().clone();
        let session = catalog.session();
        let messages = self.messages.clone();
        let udn = udn.to_string();

        debug!(%udn, session, "scan started");
        tokio::spawn(async move {
            let result = tokio::task::spawn_blocking(move || client.browse_audio_items())
                .await
                .unwrap_or_else(|e| {
                    error!(%udn, "scan task failed: {}", e);
                    Err(ScanError::Protocol(format!("scan aborted: {e}")))
                });
            let _ = messages.send(SyncMessage::ScanFinished {
                udn,
                session,
                result,
            });
        });

        RescanOutcome::Started
    }

    /// Feed a system update token received for `udn`.
    pub fn handle_change(&mut self, udn: &str, token: &str) {
        match self.catalogs.get_mut(udn) {
            Some(catalog) => {
                catalog.debouncer.notify(token);
            }
            None => debug!(udn, token, "change for unconnected device"),
        }
    }

    /// Apply a scan result or timer fire. Returns the event to publish, if any.
    pub fn handle_message(&mut self, message: SyncMessage) -> Option<LibraryEvent> {
        match message {
            SyncMessage::ScanFinished {
                udn,
                session,
                result,
            } => {
                let Some(catalog) = self.live_catalog(&udn, session) else {
                    debug!(%udn, session, "discarding result of stale scan");
                    return None;
                };

                catalog.finish_scan();
                match result {
                    Ok(tracks) => {
                        let tracks = catalog.replace(tracks);
                        info!(%udn, tracks = tracks.len(), "catalog updated");
                        Some(LibraryEvent::CatalogChanged { udn, tracks })
                    }
                    Err(error) => {
                        warn!(%udn, %error, "scan failed, keeping previous catalog");
                        Some(LibraryEvent::ScanFailed { udn, error })
                    }
                }
            }
            SyncMessage::RescanDue {
                udn,
                session,
                generation,
            } => {
                let token = self
                    .live_catalog(&udn, session)?
                    .debouncer
                    .on_timer(generation)?;

                debug!(%udn, %token, "content changed");
                self.request_rescan(&udn);
                None
            }
        }
    }

    fn live_catalog(&mut self, udn: &str, session: u64) -> Option<&mut Catalog> {
        self.catalogs
            .get_mut(udn)
            .filter(|catalog| catalog.session() == session)
    }

    /// Current track set, empty until the first scan completes.
    pub fn tracks(&self, udn: &str) -> Option<Arc<[Track]>> {
        self.catalogs.get(udn).map(Catalog::tracks)
    }

    pub fn is_scanning(&self, udn: &str) -> bool {
        self.catalogs.get(udn).is_some_and(Catalog::is_scanning)
    }

    pub fn is_connected(&self, udn: &str) -> bool {
        self.catalogs.contains_key(udn)
    }

    pub fn connected(&self) -> impl Iterator<Item = &str> {
        self.catalogs.keys().map(String::as_str)
    }

    pub fn subscriber(&self) -> &S {
        &self.subscriber
    }

    pub fn subscriber_mut(&mut self) -> &mut S {
        &mut self.subscriber
    }

    /// Disconnect everything and hand back the subscriber for teardown.
    pub fn shutdown(mut self) -> S {
        let udns: Vec<String> = self.catalogs.keys().cloned().collect();
        for udn in udns {
            self.disconnect(&udn);
        }
        self.subscriber
    }
}
