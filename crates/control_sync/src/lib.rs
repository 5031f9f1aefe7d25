//! Validation-state synchronizer for form control wrappers.
//!
//! A [`ControlWrapper`] watches one field (and optionally its enclosing
//! group), keeps the last settled error list so in-flight validation does not
//! flicker, and asks the host to re-render once per merged change event.

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared::{
    domain::{ControlEvent, ControlSnapshot},
    error::StreamFault,
};
use thiserror::Error;

mod cache;
mod composer;
mod control;
mod lifecycle;
mod notify;
mod wrapper;

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;

pub use composer::RetryPolicy;
pub use control::{idle_gate, ControlCell, IdleGate, IdleTrigger, ImmediateGate};
pub use lifecycle::{SyncState, SyncStatus};
pub use notify::{ChannelRenderSink, RenderRequest, RenderRequestSink};
pub use wrapper::{ControlWrapper, ControlWrapperBuilder};

pub type ControlEventStream = BoxStream<'static, Result<ControlEvent, StreamFault>>;

/// Read-only view over a field or group owned by the validation subsystem.
pub trait ControlHandle: Send + Sync {
    fn snapshot(&self) -> ControlSnapshot;

    /// Opens a fresh subscription to the live event stream.
    ///
    /// `None` means no stream is attached; it is observed as a source that
    /// never emits.
    fn events(&self) -> Option<ControlEventStream>;
}

/// One-shot signal that the surrounding form finished its initial settle pass.
#[async_trait]
pub trait ReadinessGate: Send + Sync {
    /// Resolves `true` once the gate fired, `false` if it closed without firing.
    async fn ready(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("synchronizer already started")]
    AlreadyStarted,
    #[error("synchronizer was disposed")]
    Disposed,
    #[error("no tokio runtime available to drive the synchronizer")]
    NoRuntime,
}
