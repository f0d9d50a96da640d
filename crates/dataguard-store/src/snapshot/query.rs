//! Snapshot ledger reads.

use std::collections::{BTreeMap, HashMap};

use crate::errors::{from_rusqlite, Result};
use chrono::{TimeZone, Utc};
use dataguard_core::errors::{ExError, ExErrorKind};
use dataguard_core::{Snapshot, SnapshotId};
use rusqlite::{Connection, OptionalExtension};

struct LedgerRow {
    id: String,
    created_at_ms: i64,
    size_bytes: i64,
    content_digest: String,
    skipped_json: String,
}

/// Load every snapshot with its datasets, newest first.
///
/// The stored digest is returned as-is; verification is the caller's job.
///
/// ## Errors
///
/// - `ExErrorKind::Persistence`: query failed or a row holds an invalid id/timestamp
pub fn load_snapshots(conn: &Connection) -> Result<Vec<Snapshot>> {
    let mut stmt = conn
        .prepare(
            r#"
            SELECT snapshot_id, created_at, size_bytes, content_digest, skipped_json
            FROM snapshots
            ORDER BY snapshot_id DESC
            "#,
        )
        .map_err(from_rusqlite)?;
    let rows: Vec<LedgerRow> = stmt
        .query_map([], |row| {
            Ok(LedgerRow {
                id: row.get(0)?,
                created_at_ms: row.get(1)?,
                size_bytes: row.get(2)?,
                content_digest: row.get(3)?,
                skipped_json: row.get(4)?,
            })
        })
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    drop(stmt);

    let mut datasets = load_all_datasets(conn)?;

    rows.into_iter()
        .map(|row| {
            let contents = datasets.remove(&row.id).unwrap_or_default();
            into_snapshot(row, contents)
        })
        .collect()
}

/// Whether a snapshot row exists for `id`
pub fn contains_snapshot(conn: &Connection, id: &SnapshotId) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM snapshots WHERE snapshot_id = ?1",
            [id.as_str()],
            |_| Ok(()),
        )
        .optional()
        .map_err(from_rusqlite)?;
    Ok(found.is_some())
}

fn load_all_datasets(conn: &Connection) -> Result<HashMap<String, BTreeMap<String, String>>> {
    let mut stmt = conn
        .prepare("SELECT snapshot_id, dataset, value FROM snapshot_datasets")
        .map_err(from_rusqlite)?;
    let mut grouped: HashMap<String, BTreeMap<String, String>> = HashMap::new();
    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })
        .map_err(from_rusqlite)?;
    for row in rows {
        let (snapshot_id, dataset, value) = row.map_err(from_rusqlite)?;
        grouped.entry(snapshot_id).or_default().insert(dataset, value);
    }
    Ok(grouped)
}

fn into_snapshot(row: LedgerRow, contents: BTreeMap<String, String>) -> Result<Snapshot> {
    let corrupt = |reason: String| {
        ExError::new(ExErrorKind::Persistence)
            .with_op("load_snapshots")
            .with_entity_id(row.id.clone())
            .with_message(reason)
    };

    let id: SnapshotId = row
        .id
        .parse()
        .map_err(|e: ExError| corrupt(e.message().to_string()))?;
    let created_at = Utc
        .timestamp_millis_opt(row.created_at_ms)
        .single()
        .ok_or_else(|| corrupt(format!("invalid created_at {}", row.created_at_ms)))?;
    let skipped: Vec<String> = serde_json::from_str(&row.skipped_json)
        .map_err(|e| corrupt(format!("invalid skipped_json: {}", e)))?;

    Ok(Snapshot {
        id,
        created_at,
        contents,
        size_bytes: row.size_bytes.max(0) as u64,
        skipped,
        content_digest: row.content_digest,
    })
}
