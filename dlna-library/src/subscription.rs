//! GENA change subscriptions for connected devices
//!
//! Each connected device gets one ContentDirectory subscription with its own
//! callback key. A per-device task owns the subscription: it subscribes,
//! renews at half the granted timeout, re-subscribes when a renewal fails,
//! and turns accepted notifications into [`ChangeNotification`]s for the
//! event loop. SOAP calls are blocking and run on the blocking pool.

use std::collections::HashMap;
use std::time::Duration;

use callback_server::{CallbackServer, EventRouter, NotificationPayload};
use dlna_discovery::Device;
use dlna_parser::ContentDirectoryEvent;
use soap_client::SoapClient;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, trace, warn};

use crate::sync::ChangeSubscriber;

/// Wait before retrying a SUBSCRIBE the server refused.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(30);

/// How long [`GenaSubscriber::close`] waits for each subscription to cancel.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// A new system update token was announced by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub udn: String,
    pub token: String,
}

#[derive(Debug)]
struct Subscription {
    key: String,
    task: JoinHandle<()>,
}

#[derive(Debug)]
pub struct GenaSubscriber {
    server: CallbackServer,
    client: SoapClient,
    timeout_secs: u32,
    changes: mpsc::UnboundedSender<ChangeNotification>,
    /// Callback key -> inbox of the owning task
    routes: HashMap<String, mpsc::UnboundedSender<NotificationPayload>>,
    by_udn: HashMap<String, Subscription>,
}

impl GenaSubscriber {
    pub fn new(
        server: CallbackServer,
        client: SoapClient,
        timeout: Duration,
        changes: mpsc::UnboundedSender<ChangeNotification>,
    ) -> Self {
        Self {
            server,
            client,
            timeout_secs: u32::try_from(timeout.as_secs()).unwrap_or(u32::MAX),
            changes,
            routes: HashMap::new(),
            by_udn: HashMap::new(),
        }
    }

    pub fn is_subscribed(&self, udn: &str) -> bool {
        self.by_udn.contains_key(udn)
    }

    /// URL the device was given in its SUBSCRIBE `CALLBACK` header.
    pub fn callback_url(&self, udn: &str) -> Option<String> {
        self.by_udn
            .get(udn)
            .map(|subscription| self.server.callback_url(&subscription.key))
    }

    /// Hand a notification from the callback server to its subscription.
    pub fn dispatch(&self, payload: NotificationPayload) {
        match self.routes.get(&payload.callback_key) {
            Some(inbox) => {
                let _ = inbox.send(payload);
            }
            None => trace!(key = %payload.callback_key, "notification for closed subscription"),
        }
    }

    /// Cancel every subscription and stop the callback server.
    pub async fn close(mut self) {
        self.routes.clear();
        for (udn, subscription) in self.by_udn.drain() {
            if tokio::time::timeout(CLOSE_TIMEOUT, subscription.task).await.is_err() {
                warn!(%udn, "timed out cancelling subscription");
            }
        }

        if let Err(e) = self.server.shutdown().await {
            warn!("callback server shutdown failed: {}", e);
        }
    }
}

impl ChangeSubscriber for GenaSubscriber {
    fn subscribe(&mut self, device: &Device) {
        if self.by_udn.contains_key(&device.udn) {
            return;
        }

        let Some(event_url) = device.content_directory.event_sub_url.clone() else {
            info!(udn = %device.udn, "server publishes no ContentDirectory events");
            return;
        };

        let key = EventRouter::generate_key();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();

        let task = SubscriptionTask {
            udn: device.udn.clone(),
            key: key.clone(),
            event_url,
            callback_url: self.server.callback_url(&key),
            client: self.client.clone(),
            timeout_secs: self.timeout_secs,
            router: EventRouter::clone(self.server.router()),
            changes: self.changes.clone(),
        };

        self.routes.insert(key.clone(), inbox_tx);
        self.by_udn.insert(
            device.udn.clone(),
            Subscription {
                key,
                task: tokio::spawn(task.run(inbox_rx)),
            },
        );
    }

    /// Closing the inbox makes the task unregister and UNSUBSCRIBE.
    fn unsubscribe(&mut self, udn: &str) {
        if let Some(subscription) = self.by_udn.remove(udn) {
            self.routes.remove(&subscription.key);
        }
    }
}

#[derive(Debug)]
struct Active {
    sid: String,
    renew_at: Instant,
}

struct SubscriptionTask {
    udn: String,
    key: String,
    event_url: String,
    callback_url: String,
    client: SoapClient,
    timeout_secs: u32,
    router: EventRouter,
    changes: mpsc::UnboundedSender<ChangeNotification>,
}

impl SubscriptionTask {
    async fn run(self, mut inbox: mpsc::UnboundedReceiver<NotificationPayload>) {
        // Registered before SUBSCRIBE so the initial event is not refused
        self.router.register(self.key.clone()).await;

        let mut active: Option<Active> = None;
        let mut next_attempt = Instant::now();

        loop {
            let deadline = active.as_ref().map_or(next_attempt, |a| a.renew_at);

            tokio::select! {
                payload = inbox.recv() => match payload {
                    Some(payload) => self.on_notification(active.as_ref(), payload),
                    None => break,
                },
                _ = sleep_until(deadline) => {
                    active = match active.take() {
                        None => self.subscribe().await,
                        Some(current) => self.renew(current).await,
                    };
                    if active.is_none() {
                        next_attempt = Instant::now() + RESUBSCRIBE_DELAY;
                    }
                }
            }
        }

        self.router.unregister(&self.key).await;

        if let Some(current) = active {
            let client = self.client.clone();
            let event_url = self.event_url.clone();
            let result =
                tokio::task::spawn_blocking(move || client.unsubscribe(&event_url, &current.sid))
                    .await;
            match result {
                Ok(Ok(())) => debug!(udn = %self.udn, "unsubscribed"),
                Ok(Err(e)) => debug!(udn = %self.udn, "unsubscribe failed: {}", e),
                Err(e) => debug!(udn = %self.udn, "unsubscribe task failed: {}", e),
            }
        }
    }

    async fn subscribe(&self) -> Option<Active> {
        let client = self.client.clone();
        let event_url = self.event_url.clone();
        let callback_url = self.callback_url.clone();
        let timeout = self.timeout_secs;

        let result = tokio::task::spawn_blocking(move || {
            client.subscribe(&event_url, &callback_url, timeout)
        })
        .await;

        match result {
            Ok(Ok(response)) => {
                info!(udn = %self.udn, sid = %response.sid, timeout = response.timeout_seconds, "subscribed to content changes");
                Some(Active {
                    sid: response.sid,
                    renew_at: renew_deadline(response.timeout_seconds),
                })
            }
            Ok(Err(e)) => {
                warn!(udn = %self.udn, "SUBSCRIBE failed: {}", e);
                None
            }
            Err(e) => {
                warn!(udn = %self.udn, "SUBSCRIBE task failed: {}", e);
                None
            }
        }
    }

    async fn renew(&self, current: Active) -> Option<Active> {
        let client = self.client.clone();
        let event_url = self.event_url.clone();
        let sid = current.sid.clone();
        let timeout = self.timeout_secs;

        let result = tokio::task::spawn_blocking(move || {
            client.renew_subscription(&event_url, &sid, timeout)
        })
        .await;

        match result {
            Ok(Ok(granted)) => {
                debug!(udn = %self.udn, granted, "subscription renewed");
                Some(Active {
                    sid: current.sid,
                    renew_at: renew_deadline(granted),
                })
            }
            Ok(Err(e)) => {
                warn!(udn = %self.udn, "renewal failed, subscribing again: {}", e);
                self.subscribe().await
            }
            Err(e) => {
                warn!(udn = %self.udn, "renewal task failed: {}", e);
                self.subscribe().await
            }
        }
    }

    fn on_notification(&self, active: Option<&Active>, payload: NotificationPayload) {
        match active {
            Some(active) if active.sid == payload.subscription_id => {}
            Some(active) => {
                debug!(udn = %self.udn, expected = %active.sid, got = %payload.subscription_id, "notification with foreign SID");
                return;
            }
            None => {
                debug!(udn = %self.udn, "notification without live subscription");
                return;
            }
        }

        let event = match ContentDirectoryEvent::from_xml(&payload.event_xml) {
            Ok(event) => event,
            Err(e) => {
                warn!(udn = %self.udn, "unparseable change notification: {}", e);
                return;
            }
        };

        match event.system_update_id() {
            Some(token) => {
                let _ = self.changes.send(ChangeNotification {
                    udn: self.udn.clone(),
                    token: token.to_string(),
                });
            }
            None => trace!(udn = %self.udn, "notification without SystemUpdateID"),
        }
    }
}

fn renew_deadline(granted_secs: u32) -> Instant {
    Instant::now() + Duration::from_secs(u64::from(granted_secs / 2).max(1))
}
