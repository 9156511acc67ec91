//! Sync iterator over library events
//!
//! Provides a blocking iterator interface for processing events
//! without requiring async/await.

use std::sync::mpsc;
use std::time::Duration;

use crate::events::LibraryEvent;

/// Blocking iterator over [`LibraryEvent`]s
///
/// Each iterator sees every event emitted after it was created. It blocks on
/// `next()` until an event is available and ends once the library shuts down.
#[derive(Debug)]
pub struct LibraryEventIterator {
    rx: mpsc::Receiver<LibraryEvent>,
}

impl LibraryEventIterator {
    pub(crate) fn new(rx: mpsc::Receiver<LibraryEvent>) -> Self {
        Self { rx }
    }

    /// Block until an event is available
    ///
    /// Returns `None` if the library has shut down.
    pub fn recv(&self) -> Option<LibraryEvent> {
        self.rx.recv().ok()
    }

    /// Returns `None` if no event is currently available.
    pub fn try_recv(&self) -> Option<LibraryEvent> {
        self.rx.try_recv().ok()
    }

    /// Block until an event is available or timeout expires
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LibraryEvent> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Non-blocking iterator over currently queued events
    pub fn try_iter(&self) -> TryIterator<'_> {
        TryIterator { inner: self }
    }

    /// Blocking iterator that gives up after `timeout` without an event
    pub fn timeout_iter(&self, timeout: Duration) -> TimeoutIterator<'_> {
        TimeoutIterator {
            inner: self,
            timeout,
        }
    }
}

impl Iterator for LibraryEventIterator {
    type Item = LibraryEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Non-blocking iterator over currently available events
pub struct TryIterator<'a> {
    inner: &'a LibraryEventIterator,
}

impl<'a> Iterator for TryIterator<'a> {
    type Item = LibraryEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.try_recv()
    }
}

/// Blocking iterator with timeout
pub struct TimeoutIterator<'a> {
    inner: &'a LibraryEventIterator,
    timeout: Duration,
}

impl<'a> Iterator for TimeoutIterator<'a> {
    type Item = LibraryEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.recv_timeout(self.timeout)
    }
}
