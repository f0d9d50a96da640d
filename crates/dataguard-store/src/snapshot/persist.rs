//! Snapshot ledger writes.

use crate::errors::{write_error, Result};
use dataguard_core::errors::{ExError, ExErrorKind};
use dataguard_core::{Snapshot, SnapshotId};
use rusqlite::Connection;

/// Insert a snapshot and all its datasets atomically.
///
/// Either every row lands or none do, so a retried write after a failure
/// never sees a half-written snapshot.
///
/// ## Errors
///
/// - `ExErrorKind::StorageWrite`: transaction or insert failed
/// - `ExErrorKind::Serialization`: skipped-dataset list failed to encode
pub fn insert_snapshot(conn: &mut Connection, snapshot: &Snapshot) -> Result<()> {
    let skipped_json = serde_json::to_string(&snapshot.skipped).map_err(|e| {
        ExError::new(ExErrorKind::Serialization)
            .with_op("insert_snapshot")
            .with_entity_id(snapshot.id.as_str())
            .with_message(format!("Failed to encode skipped datasets: {}", e))
    })?;

    let tx = conn
        .transaction()
        .map_err(|e| write_error("insert_snapshot", e))?;

    tx.execute(
        r#"
        INSERT INTO snapshots (snapshot_id, created_at, size_bytes, content_digest, skipped_json)
        VALUES (?1, ?2, ?3, ?4, ?5)
        "#,
        rusqlite::params![
            snapshot.id.as_str(),
            snapshot.created_at.timestamp_millis(),
            snapshot.size_bytes as i64,
            snapshot.content_digest,
            skipped_json,
        ],
    )
    .map_err(|e| write_error("insert_snapshot", e))?;

    {
        let mut stmt = tx
            .prepare(
                "INSERT INTO snapshot_datasets (snapshot_id, dataset, value) VALUES (?1, ?2, ?3)",
            )
            .map_err(|e| write_error("insert_snapshot", e))?;
        for (dataset, value) in &snapshot.contents {
            stmt.execute(rusqlite::params![snapshot.id.as_str(), dataset, value])
                .map_err(|e| write_error("insert_snapshot", e))?;
        }
    }

    tx.commit().map_err(|e| write_error("insert_snapshot", e))?;

    tracing::debug!(
        snapshot_id = %snapshot.id,
        datasets = snapshot.contents.len(),
        size_bytes = snapshot.size_bytes,
        "Persisted snapshot to ledger"
    );

    Ok(())
}

/// Delete a snapshot; its dataset rows cascade. Absent ids are a no-op.
pub fn delete_snapshot(conn: &Connection, id: &SnapshotId) -> Result<()> {
    let removed = conn
        .execute(
            "DELETE FROM snapshots WHERE snapshot_id = ?1",
            [id.as_str()],
        )
        .map_err(|e| write_error("delete_snapshot", e))?;

    tracing::debug!(snapshot_id = %id, removed, "Deleted snapshot from ledger");

    Ok(())
}
