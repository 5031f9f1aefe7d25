use super::*;

fn lifecycle() -> Lifecycle {
    Lifecycle::new(Arc::from("email"))
}

#[test]
fn disposed_is_terminal() {
    for next in [
        SyncState::Unattached,
        SyncState::WaitingForGate,
        SyncState::Observing,
        SyncState::Retrying,
        SyncState::Degraded,
        SyncState::Disposed,
    ] {
        assert!(!SyncState::Disposed.can_move_to(next), "disposed -> {next}");
    }
}

#[test]
fn degraded_only_leaves_through_disposal() {
    assert!(SyncState::Degraded.can_move_to(SyncState::Disposed));
    assert!(!SyncState::Degraded.can_move_to(SyncState::Observing));
    assert!(!SyncState::Degraded.can_move_to(SyncState::Retrying));
}

#[test]
fn every_live_state_can_be_disposed() {
    for state in [
        SyncState::Unattached,
        SyncState::WaitingForGate,
        SyncState::Observing,
        SyncState::Retrying,
        SyncState::Degraded,
    ] {
        assert!(state.can_move_to(SyncState::Disposed), "{state} -> disposed");
    }
}

#[test]
fn observing_and_retrying_alternate() {
    let lifecycle = lifecycle();
    assert!(lifecycle.transition(SyncState::WaitingForGate));
    assert!(lifecycle.transition(SyncState::Observing));
    assert_eq!(lifecycle.record_retry(), 1);
    assert_eq!(lifecycle.status().state, SyncState::Retrying);
    assert!(lifecycle.transition(SyncState::Observing));
    assert_eq!(lifecycle.record_retry(), 2);
    assert_eq!(lifecycle.status().retries, 2);
}

#[test]
fn skipping_the_gate_is_rejected() {
    let lifecycle = lifecycle();
    assert!(!lifecycle.transition(SyncState::Observing));
    assert_eq!(lifecycle.status().state, SyncState::Unattached);
}

#[test]
fn dispose_is_idempotent() {
    let lifecycle = lifecycle();
    assert!(lifecycle.dispose());
    assert!(!lifecycle.dispose());
    assert!(lifecycle.is_disposed());
    assert!(lifecycle.token().is_cancelled());
    assert_eq!(lifecycle.status().state, SyncState::Disposed);
}

#[test]
fn delivery_stops_after_dispose() {
    let lifecycle = lifecycle();
    let mut calls = 0;
    assert_eq!(lifecycle.deliver(|| calls += 1), Delivery::Delivered);
    lifecycle.dispose();
    assert_eq!(lifecycle.deliver(|| calls += 1), Delivery::Disposed);
    assert_eq!(calls, 1);
    assert_eq!(lifecycle.status().notifications, 1);
}

#[test]
fn panicking_delivery_is_reported_and_not_counted() {
    let lifecycle = lifecycle();
    assert_eq!(
        lifecycle.deliver(|| panic!("render host crashed")),
        Delivery::SinkPanicked
    );
    assert_eq!(lifecycle.status().notifications, 0);
    assert!(!lifecycle.is_disposed());
    assert!(lifecycle.dispose());
}

#[test]
fn retry_is_not_recorded_after_dispose() {
    let lifecycle = lifecycle();
    lifecycle.transition(SyncState::WaitingForGate);
    lifecycle.transition(SyncState::Observing);
    lifecycle.dispose();
    lifecycle.record_retry();
    assert_eq!(lifecycle.status().retries, 0);
    assert_eq!(lifecycle.status().state, SyncState::Disposed);
}
