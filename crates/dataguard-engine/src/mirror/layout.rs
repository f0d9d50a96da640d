//! Flattening datasets into rows and columns for the tabular mirror.

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::Grid;

/// Range holding mirror metadata (last snapshot id and time)
pub const META_RANGE: &str = "_meta!A1";

/// Top-left anchor of a dataset's sheet
pub fn dataset_range(dataset: &str) -> String {
    format!("{}!A1", dataset)
}

/// Whole-sheet range used to measure what a previous push left behind
pub fn extent_range(dataset: &str) -> String {
    format!("{}!A:ZZ", dataset)
}

/// Encode a serialized dataset as a grid.
///
/// A JSON array of objects becomes a header row (union of field names in
/// first-seen order) followed by one row per record. Nested values are written
/// as JSON text. Anything else, including text that is not valid JSON, lands
/// in a single cell.
pub fn encode_dataset(raw: &str) -> Grid {
    let records = match serde_json::from_str::<Value>(raw) {
        Ok(Value::Array(items)) if !items.is_empty() && items.iter().all(Value::is_object) => {
            items
        }
        _ => return vec![vec![Value::String(raw.to_string())]],
    };

    let mut header: Vec<String> = Vec::new();
    for record in &records {
        if let Some(fields) = record.as_object() {
            for name in fields.keys() {
                if !header.iter().any(|h| h == name) {
                    header.push(name.clone());
                }
            }
        }
    }

    let mut grid = Vec::with_capacity(records.len() + 1);
    grid.push(header.iter().cloned().map(Value::String).collect());
    for record in &records {
        let row = header
            .iter()
            .map(|name| cell(record.get(name)))
            .collect();
        grid.push(row);
    }
    grid
}

fn cell(value: Option<&Value>) -> Value {
    match value {
        None | Some(Value::Null) => Value::String(String::new()),
        Some(v @ (Value::String(_) | Value::Number(_) | Value::Bool(_))) => v.clone(),
        Some(nested) => Value::String(nested.to_string()),
    }
}

/// Blank out cells a previous, larger push left behind.
///
/// The grid grows to cover `previous` in both dimensions with empty strings,
/// so a single write overwrites stale rows and columns.
pub fn pad_to_cover(grid: &mut Grid, previous: &Grid) {
    let width = grid
        .iter()
        .chain(previous.iter())
        .map(Vec::len)
        .max()
        .unwrap_or(0);
    while grid.len() < previous.len() {
        grid.push(Vec::new());
    }
    for row in grid.iter_mut() {
        row.resize(width, Value::String(String::new()));
    }
}

/// Rows written to [`META_RANGE`] after a successful push
pub fn metadata_grid(snapshot_id: &str, created_at: DateTime<Utc>) -> Grid {
    vec![
        vec![Value::from("snapshot_id"), Value::from(snapshot_id)],
        vec![Value::from("created_at"), Value::from(created_at.to_rfc3339())],
    ]
}
