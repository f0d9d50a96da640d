// Test suite for the snapshot scheduler
// Runs on a paused clock so interval and debounce timing is deterministic.

mod common;

use std::time::Duration;

use common::{config, harness};
use dataguard_core::ExErrorKind;
use dataguard_engine::SchedulerState;
use tokio::time::sleep;

#[tokio::test(start_paused = true)]
async fn test_periodic_snapshots_start_one_interval_after_start() {
    let h = harness(config(&["users"], 10)).await;
    h.primary_set("users", "[]");
    h.engine.start().unwrap();

    sleep(Duration::from_secs(299)).await;
    assert!(h.engine.list_snapshots().is_empty());

    sleep(Duration::from_secs(2)).await;
    assert_eq!(h.engine.list_snapshots().len(), 1);

    sleep(Duration::from_secs(300)).await;
    assert_eq!(h.engine.list_snapshots().len(), 2);

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_start_is_exclusive_and_stop_idempotent() {
    let h = harness(config(&["users"], 10)).await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Stopped);

    h.engine.start().unwrap();
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Running);
    let err = h.engine.start().unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::AlreadyRunning);

    h.engine.stop().await;
    h.engine.stop().await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Stopped);

    // No timer survives a stop.
    sleep(Duration::from_secs(900)).await;
    assert!(h.engine.list_snapshots().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_protected_writes_debounce_into_one_snapshot() {
    let h = harness(config(&["users"], 10)).await;
    h.engine.start().unwrap();

    for balance in 0..5 {
        h.engine
            .store()
            .set("users", &format!(r#"[{{"balance":{}}}]"#, balance))
            .unwrap();
        sleep(Duration::from_millis(200)).await;
    }
    sleep(Duration::from_secs(2)).await;

    let listed = h.engine.list_snapshots();
    assert_eq!(listed.len(), 1);
    let snapshot = h.engine.snapshot(&listed[0].id).unwrap();
    assert_eq!(snapshot.contents["users"], r#"[{"balance":4}]"#);

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_unprotected_writes_do_not_trigger() {
    let h = harness(config(&["users"], 10)).await;
    h.engine.start().unwrap();

    h.engine.store().set("ui_state", "{}").unwrap();
    sleep(Duration::from_secs(10)).await;

    assert!(h.engine.list_snapshots().is_empty());
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_inactive_trigger_snapshots_after_window() {
    let h = harness(config(&["users"], 10)).await;
    h.primary_set("users", "[1]");
    h.engine.start().unwrap();

    h.engine.trigger_handle().going_inactive();
    sleep(Duration::from_millis(1_500)).await;
    assert!(h.engine.list_snapshots().is_empty());

    sleep(Duration::from_millis(600)).await;
    assert_eq!(h.engine.list_snapshots().len(), 1);
    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_periodic_failure_is_swallowed_and_retried() {
    let h = harness(config(&["users"], 10)).await;
    h.primary_set("users", "[]");
    h.secondary.set_failing(true);
    h.engine.start().unwrap();

    sleep(Duration::from_secs(301)).await;
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Running);
    assert_eq!(h.secondary.attempts(), 3);

    h.secondary.set_failing(false);
    sleep(Duration::from_secs(300)).await;
    assert_eq!(h.secondary.inner.len(), 1);

    h.engine.stop().await;
}

#[tokio::test(start_paused = true)]
async fn test_stop_lets_in_flight_pass_finish() {
    let mut cfg = config(&["users"], 10);
    cfg.backup_interval_secs = 10;
    let h = harness(cfg).await;
    h.primary_set("users", "[]");
    h.secondary.set_delay(Duration::from_secs(5));
    h.engine.start().unwrap();

    // The pass starts at 10s and blocks in the secondary write until 15s.
    sleep(Duration::from_secs(11)).await;
    assert_eq!(h.secondary.inner.len(), 0);

    h.engine.stop().await;
    assert_eq!(h.secondary.inner.len(), 1);
    assert_eq!(h.engine.scheduler_state(), SchedulerState::Stopped);
}
