//! In-memory control state and readiness gates for hosts without a form
//! framework of their own.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use shared::{
    domain::{ControlEvent, ControlSnapshot, ValidationErrors},
    error::StreamFault,
};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tracing::debug;

use crate::{ControlEventStream, ControlHandle, ReadinessGate};

const DEFAULT_EVENT_CAPACITY: usize = 64;

type EventItem = Result<ControlEvent, StreamFault>;

#[derive(Debug, Default)]
struct CellState {
    value: Value,
    snapshot: ControlSnapshot,
}

struct CellInner {
    state: Mutex<CellState>,
    events: broadcast::Sender<EventItem>,
}

/// Shared, mutable control state with a broadcast event stream.
///
/// Clones observe the same control. Every mutation that changes the readable
/// state emits one [`ControlEvent`].
#[derive(Clone)]
pub struct ControlCell {
    inner: Arc<CellInner>,
}

impl Default for ControlCell {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlCell {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            inner: Arc::new(CellInner {
                state: Mutex::new(CellState::default()),
                events,
            }),
        }
    }

    pub fn value(&self) -> Value {
        self.lock().value.clone()
    }

    pub fn set_value(&self, value: Value) {
        self.lock().value = value;
        self.emit(ControlEvent::ValueChanged);
    }

    pub fn mark_touched(&self) {
        let changed = {
            let mut state = self.lock();
            !std::mem::replace(&mut state.snapshot.touched, true)
        };
        if changed {
            self.emit(ControlEvent::TouchedChanged);
        }
    }

    /// Marks async validation as in flight. Current errors stay in place.
    pub fn start_validation(&self) {
        self.lock().snapshot.pending = true;
        self.emit(ControlEvent::StatusChanged);
    }

    pub fn finish_validation(&self, errors: Option<ValidationErrors>) {
        {
            let mut state = self.lock();
            state.snapshot.pending = false;
            state.snapshot.errors = errors;
        }
        self.emit(ControlEvent::StatusChanged);
    }

    /// Replaces the errors without touching the pending flag.
    pub fn set_errors(&self, errors: Option<ValidationErrors>) {
        self.lock().snapshot.errors = errors;
        self.emit(ControlEvent::StatusChanged);
    }

    pub fn reset(&self) {
        *self.lock() = CellState::default();
        self.emit(ControlEvent::Reset);
    }

    /// Pushes a fault to every current subscriber.
    pub fn inject_fault(&self, fault: StreamFault) {
        let _ = self.inner.events.send(Err(fault));
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    fn emit(&self, event: ControlEvent) {
        let _ = self.inner.events.send(Ok(event));
    }

    fn lock(&self) -> MutexGuard<'_, CellState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl ControlHandle for ControlCell {
    fn snapshot(&self) -> ControlSnapshot {
        self.lock().snapshot.clone()
    }

    /// A subscriber that falls behind sees the skipped events as one
    /// `StatusChanged` tick rather than a fault.
    fn events(&self) -> Option<ControlEventStream> {
        let stream = BroadcastStream::new(self.inner.events.subscribe()).map(|item| match item {
            Ok(item) => item,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                debug!(skipped, "control event subscriber lagged; coalescing");
                Ok(ControlEvent::StatusChanged)
            }
        });
        Some(stream.boxed())
    }
}

/// Creates a readiness gate and the trigger that fires it.
pub fn idle_gate() -> (IdleTrigger, IdleGate) {
    let (tx, rx) = watch::channel(false);
    (IdleTrigger { tx }, IdleGate { rx })
}

/// Fires the paired [`IdleGate`] once. Dropping it unfired closes the gate.
pub struct IdleTrigger {
    tx: watch::Sender<bool>,
}

impl IdleTrigger {
    pub fn fire(self) {
        self.tx.send_replace(true);
    }
}

#[derive(Clone)]
pub struct IdleGate {
    rx: watch::Receiver<bool>,
}

#[async_trait]
impl ReadinessGate for IdleGate {
    async fn ready(&self) -> bool {
        let mut rx = self.rx.clone();
        let fired = rx.wait_for(|fired| *fired).await.is_ok();
        fired
    }
}

/// Gate that is open from the start.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImmediateGate;

#[async_trait]
impl ReadinessGate for ImmediateGate {
    async fn ready(&self) -> bool {
        true
    }
}

#[cfg(test)]
#[path = "tests/control_tests.rs"]
mod tests;
