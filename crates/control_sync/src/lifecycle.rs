//! Disposal signal and the observable state of one synchronizer.

use std::{
    panic::{self, AssertUnwindSafe},
    sync::{Arc, Mutex, PoisonError},
};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncState {
    #[default]
    Unattached,
    WaitingForGate,
    Observing,
    Retrying,
    Degraded,
    Disposed,
}

impl SyncState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unattached => "unattached",
            Self::WaitingForGate => "waiting_for_gate",
            Self::Observing => "observing",
            Self::Retrying => "retrying",
            Self::Degraded => "degraded",
            Self::Disposed => "disposed",
        }
    }

    /// `Disposed` is terminal; `Degraded` only leaves through disposal.
    pub fn can_move_to(self, next: SyncState) -> bool {
        use SyncState::*;
        match (self, next) {
            (Disposed, _) => false,
            (_, Disposed) => true,
            (Unattached, WaitingForGate)
            | (WaitingForGate, Observing)
            | (Observing, Retrying)
            | (Retrying, Observing)
            | (Observing, Degraded)
            | (Retrying, Degraded) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncStatus {
    pub state: SyncState,
    /// Resubscriptions performed after stream faults.
    pub retries: u32,
    /// Render requests handed to the sink.
    pub notifications: u64,
}

/// Outcome of handing one render request to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Delivery {
    Delivered,
    Disposed,
    SinkPanicked,
}

pub(crate) struct Lifecycle {
    name: Arc<str>,
    token: CancellationToken,
    disposed: Mutex<bool>,
    status: watch::Sender<SyncStatus>,
}

impl Lifecycle {
    pub(crate) fn new(name: Arc<str>) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            name,
            token: CancellationToken::new(),
            disposed: Mutex::new(false),
            status,
        }
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub(crate) fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    pub(crate) fn is_disposed(&self) -> bool {
        *self.disposed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn transition(&self, next: SyncState) -> bool {
        let name = &self.name;
        self.status.send_if_modified(|status| {
            if !status.state.can_move_to(next) {
                return false;
            }
            debug!(field = %name, from = %status.state, to = %next, "synchronizer state change");
            status.state = next;
            true
        })
    }

    pub(crate) fn record_retry(&self) -> u32 {
        let mut attempt = 0;
        self.status.send_if_modified(|status| {
            if !status.state.can_move_to(SyncState::Retrying) {
                return false;
            }
            status.state = SyncState::Retrying;
            status.retries += 1;
            attempt = status.retries;
            true
        });
        attempt
    }

    /// Runs `notify` unless disposal already happened.
    ///
    /// Holds the delivery lock for the duration of the call, so `dispose`
    /// cannot return while a delivery is in progress. `notify` must not
    /// dispose the same synchronizer. A panic inside `notify` is caught and
    /// reported as [`Delivery::SinkPanicked`].
    pub(crate) fn deliver(&self, notify: impl FnOnce()) -> Delivery {
        let disposed = self.disposed.lock().unwrap_or_else(PoisonError::into_inner);
        if *disposed || self.token.is_cancelled() {
            return Delivery::Disposed;
        }
        if panic::catch_unwind(AssertUnwindSafe(notify)).is_err() {
            return Delivery::SinkPanicked;
        }
        self.status.send_modify(|status| status.notifications += 1);
        Delivery::Delivered
    }

    /// Returns `false` when already disposed.
    pub(crate) fn dispose(&self) -> bool {
        {
            let mut disposed = self.disposed.lock().unwrap_or_else(PoisonError::into_inner);
            if *disposed {
                return false;
            }
            *disposed = true;
        }
        self.token.cancel();
        self.transition(SyncState::Disposed);
        true
    }
}

#[cfg(test)]
#[path = "tests/lifecycle_tests.rs"]
mod tests;
