#![allow(clippy::unwrap_used, clippy::expect_used)]

use dataguard_core::errors::{ExError, ExErrorKind, GuardError};
use dataguard_core::logging_facility::test_capture::init_test_capture;
use dataguard_core::{log_op_end, log_op_error, log_op_start};
use dataguard_core_types::schema::{
    EVENT_END, EVENT_END_ERROR, EVENT_START, FIELD_DURATION_MS, FIELD_ERR_CODE, FIELD_ERR_KIND,
    FIELD_SNAPSHOT_ID,
};

#[test]
fn test_log_op_start_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_start_unique_1";

    log_op_start!(op_name);

    let events = capture.events();
    let start_events: Vec<_> = events
        .iter()
        .filter(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START))
        .collect();

    assert_eq!(start_events.len(), 1);
}

#[test]
fn test_log_op_end_macro_records_duration() {
    let capture = init_test_capture();
    let op_name = "test_log_op_end_unique_2";

    log_op_end!(op_name, duration_ms = 42);

    let events = capture.events();
    let end_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END))
        .expect("Should have end event");

    assert_eq!(end_event.fields.get(FIELD_DURATION_MS), Some(&"42".to_string()));
}

#[test]
fn test_log_op_error_macro() {
    let capture = init_test_capture();
    let op_name = "test_log_op_error_unique_3";

    let err = GuardError::SnapshotNotFound {
        snapshot_id: "1700000000000-0000000001".to_string(),
    };
    log_op_error!(op_name, err, duration_ms = 3);

    let events = capture.events();
    let error_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    assert_eq!(
        error_event.fields.get(FIELD_ERR_CODE),
        Some(&"ERR_SNAPSHOT_NOT_FOUND".to_string())
    );
    assert_eq!(
        error_event.fields.get(FIELD_ERR_KIND),
        Some(&"SnapshotNotFound".to_string())
    );
}

#[test]
fn test_boundary_ownership_single_start_end() {
    let capture = init_test_capture();
    let op_name = "test_boundary_ownership_unique_4";

    log_op_start!(op_name);
    log_op_end!(op_name, duration_ms = 1);

    let events = capture.events();
    let starts = events
        .iter()
        .filter(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_START))
        .count();
    let ends = events
        .iter()
        .filter(|e| e.op.as_deref() == Some(op_name) && e.event.as_deref() == Some(EVENT_END))
        .count();

    assert_eq!(starts, 1, "Should have exactly one start event");
    assert_eq!(ends, 1, "Should have exactly one end event");
}

#[test]
fn test_storage_error_event_carries_code() {
    let capture = init_test_capture();
    let op_name = "test_storage_error_unique_5";

    let err = GuardError::StorageWrite {
        target: "secondary".to_string(),
        reason: "disk full".to_string(),
    };
    log_op_error!(op_name, err.clone(), duration_ms = 5, attempts = 3);

    capture.assert_event_exists(op_name, EVENT_END_ERROR);

    let events = capture.events_for_op(op_name);
    let error_event = events
        .iter()
        .find(|e| e.event.as_deref() == Some(EVENT_END_ERROR))
        .expect("Should have error event");

    let ex_err: ExError = err.into();
    assert_eq!(ex_err.kind(), ExErrorKind::StorageWrite);
    assert_eq!(
        error_event.fields.get(FIELD_ERR_CODE),
        Some(&"ERR_STORAGE_WRITE".to_string())
    );
    assert_eq!(error_event.fields.get("attempts"), Some(&"3".to_string()));
}

#[test]
fn test_log_macros_with_multiple_fields() {
    let capture = init_test_capture();
    let op_name = "test_log_macros_fields_unique_6";

    log_op_start!(op_name, snapshot_id = "1700000000000-0000000009", datasets = 2);

    let events = capture.events();
    let start_event = events
        .iter()
        .find(|e| e.op.as_deref() == Some(op_name))
        .expect("Should have start event");

    assert_eq!(
        start_event.fields.get(FIELD_SNAPSHOT_ID),
        Some(&"1700000000000-0000000009".to_string())
    );
    assert_eq!(start_event.fields.get("datasets"), Some(&"2".to_string()));
}

#[test]
fn test_test_capture_assert_event_exists() {
    let capture = init_test_capture();
    let op_name = "test_capture_assert_unique_7";

    log_op_start!(op_name);

    capture.assert_event_exists(op_name, EVENT_START);
}

#[test]
#[should_panic(expected = "Expected event")]
fn test_test_capture_assert_event_exists_fails() {
    let capture = init_test_capture();

    capture.assert_event_exists("nonexistent_op_truly_unique_999", EVENT_START);
}

#[test]
fn test_test_capture_count_events() {
    let capture = init_test_capture();
    let op1_name = "test_count_events_op1_unique_8";
    let op2_name = "test_count_events_op2_unique_8";

    log_op_start!(op1_name);
    log_op_start!(op2_name);
    log_op_end!(op1_name, duration_ms = 10);

    let start_count = capture.count_events(|e| {
        e.event.as_deref() == Some(EVENT_START)
            && (e.op.as_deref() == Some(op1_name) || e.op.as_deref() == Some(op2_name))
    });
    let end_count = capture.count_events(|e| {
        e.event.as_deref() == Some(EVENT_END)
            && (e.op.as_deref() == Some(op1_name) || e.op.as_deref() == Some(op2_name))
    });

    assert_eq!(start_count, 2);
    assert_eq!(end_count, 1);
}

#[test]
fn test_multiple_operations_logged_independently() {
    let capture = init_test_capture();
    let op1_name = "test_multi_ops_snapshot_unique_10";
    let op2_name = "test_multi_ops_restore_unique_10";

    log_op_start!(op1_name);
    log_op_end!(op1_name, duration_ms = 10);

    log_op_start!(op2_name);
    log_op_end!(op2_name, duration_ms = 5);

    assert_eq!(capture.events_for_op(op1_name).len(), 2);
    assert_eq!(capture.events_for_op(op2_name).len(), 2);
}
