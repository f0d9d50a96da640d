#![allow(clippy::unwrap_used)]

use dataguard_core::errors::{poisoned, ExError, ExErrorKind, GuardError};

#[test]
fn test_snapshot_not_found_verifiable_by_kind() {
    let err = GuardError::SnapshotNotFound {
        snapshot_id: "1700000000000-0000000004".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::SnapshotNotFound);
    assert_eq!(ex_err.code(), "ERR_SNAPSHOT_NOT_FOUND");
    assert_eq!(ex_err.entity_id(), Some("1700000000000-0000000004"));
}

#[test]
fn test_storage_write_names_target() {
    let err = GuardError::StorageWrite {
        target: "secondary".to_string(),
        reason: "database is locked".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::StorageWrite);
    assert_eq!(ex_err.entity_id(), Some("secondary"));
    assert!(ex_err.message().contains("database is locked"));
}

#[test]
fn test_remote_unavailable_distinct_from_storage_write() {
    let ex_err: ExError = GuardError::RemoteUnavailable {
        reason: "timed out".to_string(),
    }
    .into();

    assert_eq!(ex_err.kind(), ExErrorKind::RemoteUnavailable);
    assert_ne!(ex_err.kind(), ExErrorKind::StorageWrite);
    assert_eq!(ex_err.entity_id(), None);
}

#[test]
fn test_serialization_names_dataset() {
    let ex_err: ExError = GuardError::Serialization {
        dataset: "users".to_string(),
        reason: "expected value at line 1".to_string(),
    }
    .into();

    assert_eq!(ex_err.code(), "ERR_SERIALIZATION");
    assert_eq!(ex_err.entity_id(), Some("users"));
}

#[test]
fn test_error_kind_code_mapping() {
    let kinds = vec![
        (ExErrorKind::InvalidInput, "ERR_INVALID_INPUT"),
        (ExErrorKind::InvalidConfig, "ERR_INVALID_CONFIG"),
        (ExErrorKind::SnapshotNotFound, "ERR_SNAPSHOT_NOT_FOUND"),
        (ExErrorKind::AlreadyRunning, "ERR_ALREADY_RUNNING"),
        (ExErrorKind::StorageWrite, "ERR_STORAGE_WRITE"),
        (ExErrorKind::RemoteUnavailable, "ERR_REMOTE_UNAVAILABLE"),
        (ExErrorKind::Serialization, "ERR_SERIALIZATION"),
        (ExErrorKind::Persistence, "ERR_PERSISTENCE"),
        (ExErrorKind::Io, "ERR_IO"),
        (ExErrorKind::Timeout, "ERR_TIMEOUT"),
        (ExErrorKind::Internal, "ERR_INTERNAL"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}

#[test]
fn test_ex_error_builder_pattern() {
    let ex_err = ExError::new(ExErrorKind::Persistence)
        .with_op("persist_snapshot")
        .with_entity_id("1700000000000-0000000001")
        .with_message("constraint failed");

    assert_eq!(ex_err.kind(), ExErrorKind::Persistence);
    assert_eq!(ex_err.op(), Some("persist_snapshot"));
    assert_eq!(ex_err.entity_id(), Some("1700000000000-0000000001"));
    assert_eq!(ex_err.message(), "constraint failed");
}

#[test]
fn test_ex_error_display() {
    let ex_err = ExError::new(ExErrorKind::SnapshotNotFound)
        .with_op("restore")
        .with_entity_id("1700000000000-0000000002")
        .with_message("no such snapshot");

    assert_eq!(
        ex_err.to_string(),
        "[ERR_SNAPSHOT_NOT_FOUND] in operation 'restore': no such snapshot (entity_id: 1700000000000-0000000002)"
    );
}

#[test]
fn test_io_and_json_errors_convert() {
    let io: ExError = std::io::Error::other("boom").into();
    assert_eq!(io.kind(), ExErrorKind::Io);

    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let json: ExError = json_err.into();
    assert_eq!(json.kind(), ExErrorKind::Serialization);
}

#[test]
fn test_poisoned_lock_is_internal() {
    let ex_err = poisoned("version_index");
    assert_eq!(ex_err.kind(), ExErrorKind::Internal);
    assert_eq!(ex_err.op(), Some("version_index"));
}
