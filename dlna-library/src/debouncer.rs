//! Coalesces change notifications into delayed rescans
//!
//! Servers publish a new system update token on every content change, often
//! many in a burst while a library is being re-indexed. A device's debouncer
//! keeps at most one pending timer: every new token restarts it, and only
//! when the server has been quiet for the whole delay does one rescan fire.
//!
//! The first notification after subscribing only describes the current
//! state, so it is taken as the baseline and never schedules anything.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::sync::SyncMessage;

/// Quiet period before a change triggers a rescan.
pub const DEFAULT_RESCAN_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceState {
    /// No notification seen yet
    Idle,
    /// Initial token recorded
    Baseline,
    /// A rescan timer is running
    Pending,
    /// The last timer fired and its token is committed
    Armed,
}

#[derive(Debug)]
struct PendingRescan {
    token: String,
    generation: u64,
    timer: JoinHandle<()>,
}

/// Per-device debounce state machine.
///
/// Timer tasks post [`SyncMessage::RescanDue`] tagged with the device's
/// session and a generation number; [`on_timer`](Self::on_timer) accepts
/// only the generation of the live timer.
#[derive(Debug)]
pub struct ChangeDebouncer {
    udn: String,
    session: u64,
    delay: Duration,
    state: DebounceState,
    committed: Option<String>,
    pending: Option<PendingRescan>,
    generation: u64,
    fire_tx: mpsc::UnboundedSender<SyncMessage>,
}

impl ChangeDebouncer {
    pub fn new(
        udn: impl Into<String>,
        session: u64,
        delay: Duration,
        fire_tx: mpsc::UnboundedSender<SyncMessage>,
    ) -> Self {
        Self {
            udn: udn.into(),
            session,
            delay,
            state: DebounceState::Idle,
            committed: None,
            pending: None,
            generation: 0,
            fire_tx,
        }
    }

    pub fn state(&self) -> DebounceState {
        self.state
    }

    /// Token of the last baseline or fired rescan.
    pub fn committed_token(&self) -> Option<&str> {
        self.committed.as_deref()
    }

    pub fn pending_token(&self) -> Option<&str> {
        self.pending.as_ref().map(|p| p.token.as_str())
    }

    /// Feed a system update token. Returns `true` if a timer was (re)started.
    ///
    /// Must be called from within a tokio runtime.
    pub fn notify(&mut self, token: &str) -> bool {
        if self.state == DebounceState::Idle {
            debug!(udn = %self.udn, token, "baseline update token");
            self.committed = Some(token.to_string());
            self.state = DebounceState::Baseline;
            return false;
        }

        if self.committed.as_deref() == Some(token) {
            trace!(udn = %self.udn, token, "update token unchanged");
            return false;
        }

        if let Some(previous) = self.pending.take() {
            previous.timer.abort();
        }

        self.generation += 1;
        let generation = self.generation;
        let delay = self.delay;
        let tx = self.fire_tx.clone();
        let udn = self.udn.clone();
        let session = self.session;

        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(SyncMessage::RescanDue {
                udn,
                session,
                generation,
            });
        });

        debug!(udn = %self.udn, token, ?delay, "rescan scheduled");
        self.pending = Some(PendingRescan {
            token: token.to_string(),
            generation,
            timer,
        });
        self.state = DebounceState::Pending;
        true
    }

    /// Timer `generation` fired. Returns the token to commit if that timer is
    /// still the live one; the caller should rescan exactly once.
    pub fn on_timer(&mut self, generation: u64) -> Option<String> {
        match &self.pending {
            Some(pending) if pending.generation == generation => {}
            _ => {
                trace!(udn = %self.udn, generation, "stale rescan timer");
                return None;
            }
        }

        let pending = self.pending.take()?;
        self.committed = Some(pending.token.clone());
        self.state = DebounceState::Armed;
        Some(pending.token)
    }

    /// Abort the pending timer, if any.
    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
            debug!(udn = %self.udn, "pending rescan cancelled");
        }
        if self.state == DebounceState::Pending {
            self.state = DebounceState::Armed;
        }
    }
}

impl Drop for ChangeDebouncer {
    fn drop(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
        }
    }
}
