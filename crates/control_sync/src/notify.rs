//! Render requests handed from the synchronizer to the host.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use shared::domain::{EventOrigin, MergedEvent};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::lifecycle::{Delivery, Lifecycle};

/// Host capability asked to schedule one re-render pass per merged event.
///
/// Coalescing and scheduling are up to the host. Implementations must not
/// block and must not dispose the wrapper that is calling them. A panic in
/// `request_render` moves the wrapper to `Degraded`.
pub trait RenderRequestSink: Send + Sync {
    fn request_render(&self, event: &MergedEvent);
}

impl<F> RenderRequestSink for F
where
    F: Fn(&MergedEvent) + Send + Sync,
{
    fn request_render(&self, event: &MergedEvent) {
        self(event)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderRequest {
    pub field: Arc<str>,
    pub event: MergedEvent,
}

/// Forwards render requests over a bounded queue.
///
/// A full queue means a re-render is already scheduled, so the request is
/// dropped.
pub struct ChannelRenderSink {
    field: Arc<str>,
    tx: mpsc::Sender<RenderRequest>,
    closed_reported: AtomicBool,
}

impl ChannelRenderSink {
    pub fn new(field: impl Into<Arc<str>>, tx: mpsc::Sender<RenderRequest>) -> Self {
        Self {
            field: field.into(),
            tx,
            closed_reported: AtomicBool::new(false),
        }
    }

    pub fn channel(
        field: impl Into<Arc<str>>,
        capacity: usize,
    ) -> (Self, mpsc::Receiver<RenderRequest>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(field, tx), rx)
    }
}

impl RenderRequestSink for ChannelRenderSink {
    fn request_render(&self, event: &MergedEvent) {
        let request = RenderRequest {
            field: Arc::clone(&self.field),
            event: *event,
        };
        match self.tx.try_send(request) {
            Ok(()) => debug!(field = %self.field, seq = event.seq, "queued render request"),
            Err(TrySendError::Full(_)) => {
                debug!(field = %self.field, seq = event.seq, "render already queued; coalescing");
            }
            Err(TrySendError::Closed(_)) => {
                if !self.closed_reported.swap(true, Ordering::Relaxed) {
                    warn!(field = %self.field, "render queue closed; dropping render requests");
                }
            }
        }
    }
}

/// Turns merged ticks into numbered render requests, gated by disposal.
pub(crate) struct Notifier {
    sink: Arc<dyn RenderRequestSink>,
    lifecycle: Arc<Lifecycle>,
    next_seq: u64,
}

impl Notifier {
    pub(crate) fn new(sink: Arc<dyn RenderRequestSink>, lifecycle: Arc<Lifecycle>) -> Self {
        Self {
            sink,
            lifecycle,
            next_seq: 0,
        }
    }

    pub(crate) fn on_merged_event(&mut self, origin: EventOrigin) -> Delivery {
        let event = MergedEvent {
            seq: self.next_seq,
            origin,
        };
        let sink = &self.sink;
        let delivery = self.lifecycle.deliver(|| sink.request_render(&event));
        if delivery == Delivery::Delivered {
            self.next_seq += 1;
        }
        delivery
    }
}

#[cfg(test)]
#[path = "tests/notify_tests.rs"]
mod tests;
