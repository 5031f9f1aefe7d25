use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use futures::{stream, StreamExt};
use shared::{
    domain::{ControlEvent, ControlSnapshot, MergedEvent, ValidationErrors},
    error::StreamFault,
};
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::BroadcastStream;

use crate::{ControlEventStream, ControlHandle, SyncStatus};

pub(crate) const WAIT: Duration = Duration::from_secs(5);

/// Control whose first subscriptions fault on a script; later ones are live.
pub(crate) struct ScriptedControl {
    snapshot: Mutex<ControlSnapshot>,
    live: broadcast::Sender<Result<ControlEvent, StreamFault>>,
    faulting_subscriptions: usize,
    events_before_fault: usize,
    detached: bool,
    subscriptions: AtomicUsize,
}

impl ScriptedControl {
    pub(crate) fn new() -> Arc<Self> {
        Self::build(0, 0, false)
    }

    pub(crate) fn faulting_first(subscriptions: usize) -> Arc<Self> {
        Self::build(subscriptions, 0, false)
    }

    /// Every subscription yields `events_before_fault` events, then faults.
    pub(crate) fn always_faulting(events_before_fault: usize) -> Arc<Self> {
        Self::build(usize::MAX, events_before_fault, false)
    }

    pub(crate) fn detached() -> Arc<Self> {
        Self::build(0, 0, true)
    }

    fn build(faulting_subscriptions: usize, events_before_fault: usize, detached: bool) -> Arc<Self> {
        let (live, _) = broadcast::channel(64);
        Arc::new(Self {
            snapshot: Mutex::new(ControlSnapshot::default()),
            live,
            faulting_subscriptions,
            events_before_fault,
            detached,
            subscriptions: AtomicUsize::new(0),
        })
    }

    pub(crate) fn set(&self, touched: bool, pending: bool, errors: Option<&[&str]>) {
        *self.snapshot.lock().expect("snapshot lock") = ControlSnapshot {
            touched,
            pending,
            errors: errors.map(|messages| ValidationErrors::from_messages(messages.iter().copied())),
        };
    }

    pub(crate) fn emit(&self, event: ControlEvent) {
        let _ = self.live.send(Ok(event));
    }

    pub(crate) fn subscriptions(&self) -> usize {
        self.subscriptions.load(Ordering::SeqCst)
    }
}

impl ControlHandle for ScriptedControl {
    fn snapshot(&self) -> ControlSnapshot {
        self.snapshot.lock().expect("snapshot lock").clone()
    }

    fn events(&self) -> Option<ControlEventStream> {
        if self.detached {
            return None;
        }
        let attempt = self.subscriptions.fetch_add(1, Ordering::SeqCst);
        if attempt < self.faulting_subscriptions {
            let mut script: Vec<Result<ControlEvent, StreamFault>> = (0..self.events_before_fault)
                .map(|_| Ok(ControlEvent::StatusChanged))
                .collect();
            script.push(Err(StreamFault::Malformed("undefined".into())));
            return Some(stream::iter(script).boxed());
        }
        let live = BroadcastStream::new(self.live.subscribe())
            .filter_map(|item| async move { item.ok() });
        Some(live.boxed())
    }
}

#[derive(Default)]
pub(crate) struct RecordingSink {
    events: Mutex<Vec<MergedEvent>>,
}

impl RecordingSink {
    pub(crate) fn events(&self) -> Vec<MergedEvent> {
        self.events.lock().expect("events lock").clone()
    }
}

impl crate::RenderRequestSink for RecordingSink {
    fn request_render(&self, event: &MergedEvent) {
        self.events.lock().expect("events lock").push(*event);
    }
}

pub(crate) async fn wait_for_status(
    rx: &mut watch::Receiver<SyncStatus>,
    predicate: impl FnMut(&SyncStatus) -> bool,
) -> SyncStatus {
    let status = tokio::time::timeout(WAIT, rx.wait_for(predicate))
        .await
        .expect("status wait timed out")
        .expect("status channel closed");
    *status
}
