//! Shared fakes for the library integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{mpsc, Arc, Mutex};

use dlna_library::{
    ChangeSubscriber, Device, ScanError, SearchPage, SearchTransport, ServiceEndpoint,
    TransportFactory,
};

pub fn device(udn: &str, name: &str) -> Device {
    Device {
        udn: udn.to_string(),
        friendly_name: name.to_string(),
        location: "http://192.168.1.20:8200/rootDesc.xml".to_string(),
        manufacturer: Some("Justin Maggard".to_string()),
        model_name: Some("Windows Media Connect compatible (MiniDLNA)".to_string()),
        content_directory: ServiceEndpoint {
            service_type: "urn:schemas-upnp-org:service:ContentDirectory:1".to_string(),
            control_url: "http://192.168.1.20:8200/ctl/ContentDir".to_string(),
            event_sub_url: Some("http://192.168.1.20:8200/evt/ContentDir".to_string()),
        },
    }
}

/// DIDL-Lite document with one music track per id.
pub fn didl(ids: std::ops::Range<u32>) -> String {
    let items: String = ids
        .map(|id| {
            format!(
                r#"<item id="64$0${id}" parentID="64$0" restricted="1"><dc:title>Track {id}</dc:title><upnp:artist>Artist</upnp:artist><upnp:album>Album</upnp:album><upnp:class>object.item.audioItem.musicTrack</upnp:class><res duration="0:03:{:02}.000" protocolInfo="http-get:*:audio/mpeg:*">http://192.168.1.20:8200/MediaItems/{id}.mp3</res></item>"#,
                id % 60
            )
        })
        .collect();
    format!(
        r#"<DIDL-Lite xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:upnp="urn:schemas-upnp-org:metadata-1-0/upnp/" xmlns="urn:schemas-upnp-org:metadata-1-0/DIDL-Lite/">{items}</DIDL-Lite>"#
    )
}

/// In-memory ContentDirectory serving `total` tracks.
#[derive(Default)]
pub struct FakeServer {
    total: AtomicU32,
    failing: AtomicBool,
    panicking: AtomicBool,
    /// When set, every request waits for one permit
    gate: Mutex<Option<mpsc::Receiver<()>>>,
    requests: Mutex<Vec<(u32, u32)>>,
}

impl FakeServer {
    pub fn new(total: u32) -> Arc<Self> {
        let server = Self::default();
        server.total.store(total, Ordering::SeqCst);
        Arc::new(server)
    }

    /// Make requests block until a permit is sent on the returned channel.
    pub fn gated(total: u32) -> (Arc<Self>, mpsc::Sender<()>) {
        let server = Self::new(total);
        let (tx, rx) = mpsc::channel();
        *server.gate.lock().unwrap() = Some(rx);
        (server, tx)
    }

    pub fn set_total(&self, total: u32) {
        self.total.store(total, Ordering::SeqCst);
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make every request panic, as a buggy transport would.
    pub fn set_panicking(&self, panicking: bool) {
        self.panicking.store(panicking, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<(u32, u32)> {
        self.requests.lock().unwrap().clone()
    }
}

impl SearchTransport for FakeServer {
    fn search(&self, start: u32, count: u32) -> Result<SearchPage, ScanError> {
        if self.panicking.load(Ordering::SeqCst) {
            panic!("transport blew up at {start}");
        }

        if let Some(gate) = self.gate.lock().unwrap().as_ref() {
            let _ = gate.recv();
        }

        self.requests.lock().unwrap().push((start, count));
        if self.failing.load(Ordering::SeqCst) {
            return Err(ScanError::Transport("connection refused".to_string()));
        }

        let total = self.total.load(Ordering::SeqCst);
        let end = start.saturating_add(count).min(total);
        let begin = start.min(end);
        Ok(SearchPage {
            result: didl(begin..end),
            number_returned: end - begin,
            total_matches: total,
        })
    }
}

/// Every device is served by `server`.
pub fn factory(server: Arc<FakeServer>) -> Arc<dyn TransportFactory> {
    Arc::new(move |_: &Device| -> Arc<dyn SearchTransport> { server.clone() })
}

#[derive(Debug, Default)]
pub struct RecordingSubscriber {
    pub subscribed: Vec<String>,
    pub unsubscribed: Vec<String>,
}

impl ChangeSubscriber for RecordingSubscriber {
    fn subscribe(&mut self, device: &Device) {
        self.subscribed.push(device.udn.clone());
    }

    fn unsubscribe(&mut self, udn: &str) {
        self.unsubscribed.push(udn.to_string());
    }
}
