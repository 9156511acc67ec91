//! Event routing for HTTP callback notifications.
//!
//! Every GENA subscription gets its own callback path key. The `EventRouter`
//! maintains the set of live keys and forwards notifications that arrive on
//! one of them to a channel.

use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Generic notification payload for UPnP event notifications.
///
/// This is the unparsed body of a NOTIFY request together with the callback
/// key it arrived on and the subscription ID the publisher claims.
#[derive(Debug, Clone)]
pub struct NotificationPayload {
    /// Callback path key the notification was delivered to
    pub callback_key: String,
    /// The subscription ID from the UPnP SID header
    pub subscription_id: String,
    /// The raw XML event body
    pub event_xml: String,
}

/// Routes events from HTTP callbacks to a channel.
#[derive(Clone)]
pub struct EventRouter {
    /// Live callback keys
    keys: Arc<RwLock<HashSet<String>>>,
    event_sender: mpsc::UnboundedSender<NotificationPayload>,
}

impl EventRouter {
    /// Create a new event router.
    ///
    /// # Example
    ///
    /// ```
    /// use tokio::sync::mpsc;
    /// use callback_server::router::{EventRouter, NotificationPayload};
    ///
    /// let (tx, mut rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// let router = EventRouter::new(tx);
    /// ```
    pub fn new(event_sender: mpsc::UnboundedSender<NotificationPayload>) -> Self {
        Self {
            keys: Arc::new(RwLock::new(HashSet::new())),
            event_sender,
        }
    }

    /// Allocate and register a fresh callback key.
    ///
    /// # Example
    ///
    /// ```
    /// # use tokio::sync::mpsc;
    /// # use callback_server::router::{EventRouter, NotificationPayload};
    /// # #[tokio::main]
    /// # async fn main() {
    /// # let (tx, _rx) = mpsc::unbounded_channel::<NotificationPayload>();
    /// # let router = EventRouter::new(tx);
    /// let key = router.register_new().await;
    /// assert!(router.is_registered(&key).await);
    /// # }
    /// ```
    pub async fn register_new(&self) -> String {
        let key = Self::generate_key();
        self.register(key.clone()).await;
        key
    }

    /// A fresh callback key, not yet registered.
    pub fn generate_key() -> String {
        Uuid::new_v4().simple().to_string()
    }

    /// Register a callback key for event routing.
    pub async fn register(&self, callback_key: String) {
        let mut keys = self.keys.write().await;
        keys.insert(callback_key);
    }

    /// Unregister a callback key; later notifications on it are refused.
    pub async fn unregister(&self, callback_key: &str) {
        let mut keys = self.keys.write().await;
        keys.remove(callback_key);
    }

    pub async fn is_registered(&self, callback_key: &str) -> bool {
        self.keys.read().await.contains(callback_key)
    }

    /// Route an incoming event to the channel.
    ///
    /// Returns `false`, dropping the event, when the key is not registered.
    pub async fn route_event(
        &self,
        callback_key: String,
        subscription_id: String,
        event_xml: String,
    ) -> bool {
        let keys = self.keys.read().await;

        if keys.contains(&callback_key) {
            let payload = NotificationPayload {
                callback_key,
                subscription_id,
                event_xml,
            };

            // Receiver gone means the library is shutting down
            let _ = self.event_sender.send(payload);
            true
        } else {
            false
        }
    }
}
