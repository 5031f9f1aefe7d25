//! Gate, merge, retry and degrade: the event side of the synchronizer.

use std::{sync::Arc, time::Duration};

use futures::{
    stream::{self, BoxStream},
    StreamExt,
};
use serde::Deserialize;
use shared::{
    domain::{ControlEvent, EventOrigin},
    error::StreamFault,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    lifecycle::{Delivery, Lifecycle, SyncState},
    notify::Notifier,
    ControlHandle, ReadinessGate,
};

const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RetryPolicy {
    /// Resubscriptions allowed over the lifetime of one wrapper.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Pause before resubscribing; zero resubscribes immediately.
    #[serde(default)]
    pub retry_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: 0,
        }
    }
}

impl RetryPolicy {
    pub fn retry_delay(&self) -> Option<Duration> {
        (self.retry_delay_ms > 0).then(|| Duration::from_millis(self.retry_delay_ms))
    }
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}

type TaggedStream = BoxStream<'static, (EventOrigin, Result<ControlEvent, StreamFault>)>;

enum Outcome {
    Cancelled,
    Exhausted,
    Faulted(StreamFault),
    SinkPanicked,
}

pub(crate) struct EventComposer {
    name: Arc<str>,
    field: Option<Arc<dyn ControlHandle>>,
    group: Option<Arc<dyn ControlHandle>>,
    gate: Arc<dyn ReadinessGate>,
    policy: RetryPolicy,
}

impl EventComposer {
    pub(crate) fn new(
        name: Arc<str>,
        field: Option<Arc<dyn ControlHandle>>,
        group: Option<Arc<dyn ControlHandle>>,
        gate: Arc<dyn ReadinessGate>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            name,
            field,
            group,
            gate,
            policy,
        }
    }

    /// Drives the synchronizer until disposal, degradation or source exhaustion.
    pub(crate) async fn run(self, mut notifier: Notifier, lifecycle: Arc<Lifecycle>) {
        let token = lifecycle.token();
        let opened = tokio::select! {
            biased;
            _ = token.cancelled() => return,
            opened = self.gate.ready() => opened,
        };
        if !opened {
            debug!(field = %self.name, "readiness gate closed without firing");
            return;
        }

        loop {
            let merged = self.subscribe();
            lifecycle.transition(SyncState::Observing);
            match self.observe(merged, &mut notifier, &token).await {
                Outcome::Cancelled => return,
                Outcome::Exhausted => {
                    debug!(field = %self.name, "control event sources completed");
                    return;
                }
                Outcome::SinkPanicked => {
                    lifecycle.transition(SyncState::Degraded);
                    warn!(field = %self.name, "render sink panicked; live updates stopped");
                    return;
                }
                Outcome::Faulted(fault) => {
                    if lifecycle.status().retries >= self.policy.max_retries {
                        lifecycle.transition(SyncState::Degraded);
                        warn!(
                            field = %self.name,
                            max_retries = self.policy.max_retries,
                            %fault,
                            "control event stream kept faulting; live updates stopped"
                        );
                        return;
                    }
                    let attempt = lifecycle.record_retry();
                    info!(
                        field = %self.name,
                        attempt,
                        max_retries = self.policy.max_retries,
                        %fault,
                        "control event stream faulted; resubscribing"
                    );
                    if let Some(delay) = self.policy.retry_delay() {
                        tokio::select! {
                            biased;
                            _ = token.cancelled() => return,
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        }
    }

    fn subscribe(&self) -> TaggedStream {
        let field = tagged(self.field.as_ref(), EventOrigin::Field);
        let group = tagged(self.group.as_ref(), EventOrigin::Group);
        stream::select(field, group).boxed()
    }

    async fn observe(
        &self,
        mut merged: TaggedStream,
        notifier: &mut Notifier,
        token: &CancellationToken,
    ) -> Outcome {
        loop {
            let next = tokio::select! {
                biased;
                _ = token.cancelled() => return Outcome::Cancelled,
                next = merged.next() => next,
            };
            match next {
                Some((origin, Ok(_))) => match notifier.on_merged_event(origin) {
                    Delivery::Delivered => {}
                    Delivery::Disposed => return Outcome::Cancelled,
                    Delivery::SinkPanicked => return Outcome::SinkPanicked,
                },
                Some((_, Err(fault))) => return Outcome::Faulted(fault),
                None => return Outcome::Exhausted,
            }
        }
    }
}

fn tagged(handle: Option<&Arc<dyn ControlHandle>>, origin: EventOrigin) -> TaggedStream {
    match handle.and_then(|handle| handle.events()) {
        Some(events) => events.map(move |item| (origin, item)).boxed(),
        None => stream::empty().boxed(),
    }
}

#[cfg(test)]
#[path = "tests/composer_tests.rs"]
mod tests;
