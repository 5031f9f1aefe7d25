//! Host-facing handle for one wrapped control.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::{runtime::Handle, sync::watch, task::JoinHandle};
use tracing::info;

use crate::{
    cache::StateReader,
    composer::{EventComposer, RetryPolicy},
    lifecycle::{Lifecycle, SyncState, SyncStatus},
    notify::{Notifier, RenderRequestSink},
    ControlHandle, ReadinessGate, SyncError,
};

const DEFAULT_NAME: &str = "control";

/// Synchronizer for one wrapped field and its optional group.
///
/// Reads (`errors`, `invalid`) are served on demand to the render layer.
/// After [`start`](Self::start) a background task waits for the readiness
/// gate and then requests one render per merged field/group event until the
/// wrapper is disposed or dropped.
pub struct ControlWrapper {
    name: Arc<str>,
    reader: StateReader,
    lifecycle: Arc<Lifecycle>,
    unstarted: Mutex<Option<(EventComposer, Notifier)>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

pub struct ControlWrapperBuilder {
    name: Arc<str>,
    field: Option<Arc<dyn ControlHandle>>,
    group: Option<Arc<dyn ControlHandle>>,
    gate: Arc<dyn ReadinessGate>,
    sink: Arc<dyn RenderRequestSink>,
    policy: RetryPolicy,
}

impl ControlWrapperBuilder {
    pub fn name(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = name.into();
        self
    }

    pub fn field(mut self, field: Arc<dyn ControlHandle>) -> Self {
        self.field = Some(field);
        self
    }

    pub fn group(mut self, group: Arc<dyn ControlHandle>) -> Self {
        self.group = Some(group);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ControlWrapper {
        let lifecycle = Arc::new(Lifecycle::new(Arc::clone(&self.name)));
        let reader = StateReader::new(self.field.clone(), self.group.clone());
        let composer = EventComposer::new(
            Arc::clone(&self.name),
            self.field,
            self.group,
            self.gate,
            self.policy,
        );
        let notifier = Notifier::new(self.sink, Arc::clone(&lifecycle));
        ControlWrapper {
            name: self.name,
            reader,
            lifecycle,
            unstarted: Mutex::new(Some((composer, notifier))),
            task: Mutex::new(None),
        }
    }
}

impl ControlWrapper {
    pub fn builder(
        gate: Arc<dyn ReadinessGate>,
        sink: Arc<dyn RenderRequestSink>,
    ) -> ControlWrapperBuilder {
        ControlWrapperBuilder {
            name: Arc::from(DEFAULT_NAME),
            field: None,
            group: None,
            gate,
            sink,
            policy: RetryPolicy::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current error list, or the last settled one while validation is pending.
    pub fn errors(&self) -> Option<Vec<String>> {
        self.reader.errors()
    }

    /// Touched and showing at least one error.
    pub fn invalid(&self) -> bool {
        self.reader.invalid()
    }

    pub fn status(&self) -> SyncStatus {
        self.lifecycle.status()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.lifecycle.subscribe()
    }

    /// Spawns the observation task on the current tokio runtime.
    pub fn start(&self) -> Result<(), SyncError> {
        if self.lifecycle.is_disposed() {
            return Err(SyncError::Disposed);
        }
        let runtime = Handle::try_current().map_err(|_| SyncError::NoRuntime)?;
        let Some((composer, notifier)) = self
            .unstarted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return Err(SyncError::AlreadyStarted);
        };

        self.lifecycle.transition(SyncState::WaitingForGate);
        let task = runtime.spawn(composer.run(notifier, Arc::clone(&self.lifecycle)));
        *self.task.lock().unwrap_or_else(PoisonError::into_inner) = Some(task);
        info!(field = %self.name, "control wrapper started");
        Ok(())
    }

    /// Stops all observation. No render request is issued once this returns.
    pub fn dispose(&self) {
        if !self.lifecycle.dispose() {
            return;
        }
        if let Some(task) = self
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
        self.unstarted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.reader.discard_cache();
        info!(field = %self.name, "control wrapper disposed");
    }
}

impl Drop for ControlWrapper {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
#[path = "tests/wrapper_tests.rs"]
mod tests;
