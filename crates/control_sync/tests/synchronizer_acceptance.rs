use std::{sync::Arc, time::Duration};

use control_sync::{
    idle_gate, ChannelRenderSink, ControlCell, ControlWrapper, RenderRequest, SyncState,
};
use shared::{domain::ValidationErrors, error::StreamFault};
use tokio::sync::mpsc;

const WAIT: Duration = Duration::from_secs(5);

async fn next_render(rx: &mut mpsc::Receiver<RenderRequest>) -> RenderRequest {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("render request timed out")
        .expect("render queue closed")
}

async fn drain(rx: &mut mpsc::Receiver<RenderRequest>) {
    next_render(rx).await;
    while rx.try_recv().is_ok() {}
}

#[tokio::test]
async fn host_render_loop_sees_stable_errors_through_async_validation() {
    let cell = ControlCell::new();
    let (trigger, gate) = idle_gate();
    let (sink, mut renders) = ChannelRenderSink::channel("userId", 16);
    let wrapper = ControlWrapper::builder(Arc::new(gate), Arc::new(sink))
        .name("userId")
        .field(Arc::new(cell.clone()))
        .build();
    let mut status = wrapper.subscribe_status();
    wrapper.start().expect("start");

    cell.set_value("1".into());
    trigger.fire();
    tokio::time::timeout(WAIT, status.wait_for(|s| s.state == SyncState::Observing))
        .await
        .expect("observing")
        .expect("status channel");
    assert!(renders.try_recv().is_err(), "no renders before the form settled");
    assert_eq!(wrapper.errors(), None);
    assert!(!wrapper.invalid());

    cell.mark_touched();
    cell.start_validation();
    drain(&mut renders).await;
    assert_eq!(wrapper.errors(), None);
    assert!(!wrapper.invalid());

    cell.finish_validation(Some(ValidationErrors::from_messages(["required"])));
    let request = next_render(&mut renders).await;
    assert_eq!(&*request.field, "userId");
    assert_eq!(wrapper.errors(), Some(vec!["required".to_string()]));
    assert!(wrapper.invalid());

    cell.start_validation();
    cell.set_errors(None);
    drain(&mut renders).await;
    assert_eq!(wrapper.errors(), Some(vec!["required".to_string()]));
    assert!(wrapper.invalid());

    cell.finish_validation(None);
    drain(&mut renders).await;
    assert_eq!(wrapper.errors(), None);
    assert!(!wrapper.invalid());
}

#[tokio::test]
async fn transient_faults_are_absorbed_and_persistent_ones_freeze_updates() {
    let cell = ControlCell::new();
    let (trigger, gate) = idle_gate();
    let (sink, mut renders) = ChannelRenderSink::channel("email", 16);
    let wrapper = ControlWrapper::builder(Arc::new(gate), Arc::new(sink))
        .field(Arc::new(cell.clone()))
        .build();
    let mut status = wrapper.subscribe_status();
    wrapper.start().expect("start");
    trigger.fire();

    for attempt in 1..=3 {
        tokio::time::timeout(WAIT, status.wait_for(|s| s.state == SyncState::Observing))
            .await
            .expect("observing")
            .expect("status channel");
        cell.inject_fault(StreamFault::Malformed("undefined".into()));
        tokio::time::timeout(
            WAIT,
            status.wait_for(|s| s.retries == attempt && s.state == SyncState::Observing),
        )
        .await
        .expect("resubscribed")
        .expect("status channel");
    }

    cell.set_value("still live".into());
    next_render(&mut renders).await;

    cell.inject_fault(StreamFault::Detached);
    let degraded = *tokio::time::timeout(WAIT, status.wait_for(|s| s.state == SyncState::Degraded))
        .await
        .expect("degraded")
        .expect("status channel");
    assert_eq!(degraded.retries, 3);

    cell.set_value("frozen".into());
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(renders.try_recv().is_err());

    wrapper.dispose();
    assert_eq!(wrapper.status().state, SyncState::Disposed);
}
