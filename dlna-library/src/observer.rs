//! Observer registration
//!
//! Callbacks run on the library's event loop thread, in registration order,
//! after the library state they describe has been updated. They must not
//! block; hand heavy work to another thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Weak};

use parking_lot::{Mutex, RwLock};

use crate::events::LibraryEvent;

type Callback = Arc<dyn Fn(&LibraryEvent) + Send + Sync>;

/// Fan-out point for [`LibraryEvent`]s.
#[derive(Default)]
pub(crate) struct ObserverRegistry {
    next_id: AtomicU64,
    observers: RwLock<Vec<(u64, Callback)>>,
    /// Channels feeding [`LibraryEventIterator`](crate::LibraryEventIterator)s
    sinks: Mutex<Vec<mpsc::Sender<LibraryEvent>>>,
}

impl ObserverRegistry {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn register<F>(self: &Arc<Self>, callback: F) -> ObserverHandle
    where
        F: Fn(&LibraryEvent) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.observers.write().push((id, Arc::new(callback)));
        ObserverHandle {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub(crate) fn add_sink(&self, sink: mpsc::Sender<LibraryEvent>) {
        self.sinks.lock().push(sink);
    }

    /// Drop every iterator channel so blocked iterators end.
    pub(crate) fn close_sinks(&self) {
        self.sinks.lock().clear();
    }

    fn remove(&self, id: u64) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(observer_id, _)| *observer_id != id);
        observers.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// Deliver `event` to every observer and live iterator.
    pub(crate) fn emit(&self, event: &LibraryEvent) {
        // Snapshot so a callback may (un)register without deadlocking
        let observers: Vec<Callback> = self
            .observers
            .read()
            .iter()
            .map(|(_, callback)| Arc::clone(callback))
            .collect();

        for callback in observers {
            callback(event);
        }

        self.sinks
            .lock()
            .retain(|sink| sink.send(event.clone()).is_ok());
    }
}

/// Registration of one observer. Dropping the handle keeps the observer;
/// call [`unsubscribe`](Self::unsubscribe) to remove it.
#[derive(Debug)]
pub struct ObserverHandle {
    id: u64,
    registry: Weak<ObserverRegistry>,
}

impl ObserverHandle {
    /// Remove the observer. Returns `false` if it was already gone or the
    /// library has been dropped.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("observers", &self.len())
            .field("sinks", &self.sinks.lock().len())
            .finish()
    }
}
