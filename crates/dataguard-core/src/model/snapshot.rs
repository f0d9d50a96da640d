use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::snapshot_id::SnapshotId;

/// Immutable copy of every protected dataset at one instant
///
/// `contents` maps dataset name to the exact serialized text read from the
/// primary store, so a restore writes back byte-identical values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
    pub contents: BTreeMap<String, String>,
    pub size_bytes: u64,
    /// Protected datasets left out because their value failed validation
    #[serde(default)]
    pub skipped: Vec<String>,
    /// SHA-256 over the canonical contents, hex-encoded
    pub content_digest: String,
}

impl Snapshot {
    pub fn new(
        id: SnapshotId,
        created_at: DateTime<Utc>,
        contents: BTreeMap<String, String>,
        skipped: Vec<String>,
    ) -> Self {
        let size_bytes = contents
            .iter()
            .map(|(name, value)| (name.len() + value.len()) as u64)
            .sum();
        let content_digest = compute_content_digest(&contents);
        Self {
            id,
            created_at,
            contents,
            size_bytes,
            skipped,
            content_digest,
        }
    }

    pub fn summary(&self) -> SnapshotSummary {
        SnapshotSummary {
            id: self.id.clone(),
            created_at: self.created_at,
            size_bytes: self.size_bytes,
        }
    }

    /// True when the stored digest still matches the contents
    pub fn verify_digest(&self) -> bool {
        compute_content_digest(&self.contents) == self.content_digest
    }
}

/// Listing entry returned by `list_snapshots`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
    pub id: SnapshotId,
    pub created_at: DateTime<Utc>,
    pub size_bytes: u64,
}

/// Compute the content digest of a snapshot's dataset map.
///
/// Each entry contributes `len(name) || name || len(value) || value` in key
/// order, so digests are stable regardless of insertion order and no two
/// distinct maps share an encoding.
pub fn compute_content_digest(contents: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in contents {
        hasher.update((name.len() as u64).to_be_bytes());
        hasher.update(name.as_bytes());
        hasher.update((value.len() as u64).to_be_bytes());
        hasher.update(value.as_bytes());
    }
    hex::encode(hasher.finalize())
}
