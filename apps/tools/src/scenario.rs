//! Scripted walks through an async validation cycle, as the render layer
//! would observe them.

use std::{fmt, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use control_sync::{
    idle_gate, ChannelRenderSink, ControlCell, ControlWrapper, RenderRequest, SyncState,
    SyncStatus,
};
use lookup_client::ExistenceCheck;
use shared::domain::ValidationErrors;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::Settings;

const RENDER_WAIT: Duration = Duration::from_secs(5);
pub const TAKEN_MESSAGE: &str = "userId is already taken";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    pub step: String,
    pub errors: Option<Vec<String>>,
    pub invalid: bool,
}

impl fmt::Display for StepReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let errors = match &self.errors {
            Some(errors) => format!("{errors:?}"),
            None => "none".to_string(),
        };
        write!(
            f,
            "{:<28} errors={errors:<28} invalid={}",
            self.step, self.invalid
        )
    }
}

struct Session {
    cell: ControlCell,
    wrapper: ControlWrapper,
    renders: mpsc::Receiver<RenderRequest>,
}

impl Session {
    async fn open(field: &str, settings: &Settings) -> Result<Self> {
        let cell = ControlCell::new();
        let (trigger, gate) = idle_gate();
        let (sink, renders) = ChannelRenderSink::channel(field, settings.render_queue_capacity);
        let wrapper = ControlWrapper::builder(Arc::new(gate), Arc::new(sink))
            .name(field)
            .field(Arc::new(cell.clone()))
            .retry_policy(settings.retry_policy())
            .build();
        let mut status = wrapper.subscribe_status();
        wrapper.start().context("failed to start control wrapper")?;
        trigger.fire();
        tokio::time::timeout(
            RENDER_WAIT,
            status.wait_for(|status| status.state == SyncState::Observing),
        )
        .await
        .map_err(|_| anyhow!("control wrapper for '{field}' never started observing"))?
        .context("control wrapper status channel closed")?;
        Ok(Self {
            cell,
            wrapper,
            renders,
        })
    }

    /// Waits for the render request caused by the last mutation, then
    /// reads the wrapper the way a render pass would.
    async fn settle(&mut self, step: &str) -> Result<StepReport> {
        tokio::time::timeout(RENDER_WAIT, self.renders.recv())
            .await
            .map_err(|_| anyhow!("no render requested after '{step}'"))?
            .ok_or_else(|| anyhow!("render queue closed during '{step}'"))?;
        while self.renders.try_recv().is_ok() {}

        let report = StepReport {
            step: step.to_string(),
            errors: self.wrapper.errors(),
            invalid: self.wrapper.invalid(),
        };
        info!(step, errors = ?report.errors, invalid = report.invalid, "render pass");
        Ok(report)
    }

    fn read(&self, step: &str) -> StepReport {
        StepReport {
            step: step.to_string(),
            errors: self.wrapper.errors(),
            invalid: self.wrapper.invalid(),
        }
    }

    fn status(&self) -> SyncStatus {
        self.wrapper.status()
    }
}

/// Untouched, first pending window, settled failure, pending re-check.
pub async fn run_validation_scenario(settings: &Settings) -> Result<(Vec<StepReport>, SyncStatus)> {
    let mut session = Session::open("firstName", settings).await?;
    let mut reports = vec![session.read("untouched")];

    session.cell.mark_touched();
    session.cell.start_validation();
    reports.push(session.settle("first validation pending").await?);

    session
        .cell
        .finish_validation(Some(ValidationErrors::from_messages(["required"])));
    reports.push(session.settle("validation settled").await?);

    session.cell.start_validation();
    session.cell.set_errors(None);
    reports.push(session.settle("re-check pending").await?);

    let status = session.status();
    session.wrapper.dispose();
    Ok((reports, status))
}

/// Runs the existence check for `id` as an async validator on a `userId`
/// control.
pub async fn run_check_user(
    checker: &dyn ExistenceCheck,
    id: &str,
    settings: &Settings,
) -> Result<Vec<StepReport>> {
    let mut session = Session::open("userId", settings).await?;

    session.cell.set_value(id.into());
    session.cell.mark_touched();
    session.cell.start_validation();
    let mut reports = vec![session.settle("lookup in flight").await?];

    let taken = checker.exists(id).await;
    let errors = taken.then(|| ValidationErrors::from_messages([TAKEN_MESSAGE]));
    session.cell.finish_validation(errors);
    reports.push(session.settle("lookup settled").await?);

    session.wrapper.dispose();
    Ok(reports)
}

#[cfg(test)]
#[path = "tests/scenario_tests.rs"]
mod tests;
