//! Rewriting protected datasets from a retained snapshot.

use std::sync::Arc;
use std::time::Instant;

use dataguard_core::errors::{ExError, GuardError, Result};
use dataguard_core::{log_op_end, log_op_error, log_op_start, PrimaryStore, Snapshot, SnapshotId};

use crate::snapshot_manager::SnapshotManager;

/// Applies snapshots back onto the primary store
///
/// Restores bypass the guarded store: they announce no changes and take no
/// pre-deletion snapshot. Callers wanting a safety copy snapshot first.
pub struct RestoreService {
    primary: Arc<dyn PrimaryStore>,
    manager: Arc<SnapshotManager>,
}

impl RestoreService {
    pub fn new(primary: Arc<dyn PrimaryStore>, manager: Arc<SnapshotManager>) -> Self {
        Self { primary, manager }
    }

    /// Replace every protected dataset held by the snapshot.
    ///
    /// Datasets absent from the snapshot are left as they are. Returns the
    /// number of datasets written.
    ///
    /// # Errors
    ///
    /// - `SnapshotNotFound` if `id` is not retained; nothing is written.
    /// - `StorageWrite` if a write fails; datasets already written are put
    ///   back to their prior values.
    pub async fn restore(&self, id: &SnapshotId) -> Result<usize> {
        let started = Instant::now();
        log_op_start!("restore", snapshot_id = %id);

        let result = self.apply(id).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(written) => {
                log_op_end!(
                    "restore",
                    duration_ms = duration_ms,
                    snapshot_id = %id,
                    dataset_count = *written
                );
            }
            Err(err) => {
                log_op_error!(
                    "restore",
                    err.clone(),
                    duration_ms = duration_ms,
                    snapshot_id = %id
                );
            }
        }
        result
    }

    async fn apply(&self, id: &SnapshotId) -> Result<usize> {
        let snapshot = self.manager.get(id).ok_or_else(|| {
            ExError::from(GuardError::SnapshotNotFound {
                snapshot_id: id.to_string(),
            })
        })?;

        let _guard = self.manager.lock_store().await;
        let targets = self.targets(&snapshot);

        let mut previous = Vec::with_capacity(targets.len());
        for (name, _) in &targets {
            previous.push((name.to_string(), self.primary.get(name)?));
        }

        for (written, (name, value)) in targets.iter().enumerate() {
            if let Err(err) = self.primary.set(name, value) {
                self.roll_back(&previous[..written]);
                return Err(GuardError::StorageWrite {
                    target: name.to_string(),
                    reason: err.to_string(),
                }
                .into());
            }
        }
        Ok(targets.len())
    }

    fn targets<'a>(&self, snapshot: &'a Snapshot) -> Vec<(&'a str, &'a str)> {
        let keys = self.manager.protected_keys();
        snapshot
            .contents
            .iter()
            .filter(|(name, _)| {
                let protected = keys.contains(name.as_str());
                if !protected {
                    tracing::warn!(
                        dataset = %name,
                        snapshot_id = %snapshot.id,
                        "Dataset no longer protected; not restoring"
                    );
                }
                protected
            })
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect()
    }

    fn roll_back(&self, previous: &[(String, Option<String>)]) {
        for (name, value) in previous.iter().rev() {
            let outcome = match value {
                Some(value) => self.primary.set(name, value),
                None => self.primary.delete(name),
            };
            if let Err(err) = outcome {
                tracing::error!(dataset = %name, error = %err, "Rollback of restored dataset failed");
            }
        }
    }
}
