//! Presence bookkeeping for advertised devices.
//!
//! Pure state: the worker feeds it announcements and the current time, and
//! acts on what it returns. Nothing here touches the network.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Tracks which UDNs are currently present and when they lapse.
#[derive(Debug, Default)]
pub struct Tracker {
    expiries: HashMap<String, Instant>,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, udn: &str) -> bool {
        self.expiries.contains_key(udn)
    }

    pub fn len(&self) -> usize {
        self.expiries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expiries.is_empty()
    }

    /// Start tracking a device that has just been announced.
    pub fn insert(&mut self, udn: &str, max_age: Duration, now: Instant) {
        self.expiries.insert(udn.to_string(), now + max_age);
    }

    /// Push back the expiry of a known device. Returns `false` for unknown UDNs.
    pub fn refresh(&mut self, udn: &str, max_age: Duration, now: Instant) -> bool {
        match self.expiries.get_mut(udn) {
            Some(expiry) => {
                *expiry = (*expiry).max(now + max_age);
                true
            }
            None => false,
        }
    }

    /// Forget a device. Returns `true` if it was tracked.
    pub fn remove(&mut self, udn: &str) -> bool {
        self.expiries.remove(udn).is_some()
    }

    /// Drop and return every device whose advertisement has lapsed.
    pub fn expire(&mut self, now: Instant) -> Vec<String> {
        let lapsed: Vec<String> = self
            .expiries
            .iter()
            .filter(|(_, expiry)| **expiry <= now)
            .map(|(udn, _)| udn.clone())
            .collect();
        for udn in &lapsed {
            self.expiries.remove(udn);
        }
        lapsed
    }
}
