//! Deletion-guarded facade over the primary store.
//!
//! Application code reads and writes through [`GuardedStore`]. Destructive
//! calls touching protected datasets take a snapshot before anything is
//! removed, and writes to protected keys are announced so the scheduler can
//! debounce a backup.

use std::sync::Arc;

use dataguard_core::errors::{GuardError, Result};
use dataguard_core::{PrimaryStore, SnapshotId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::broadcast;

use crate::snapshot_manager::SnapshotManager;

const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// A protected dataset was written through the guarded store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreChange {
    pub key: String,
}

/// Primary store access with pre-deletion snapshots
#[derive(Clone)]
pub struct GuardedStore {
    primary: Arc<dyn PrimaryStore>,
    manager: Arc<SnapshotManager>,
    changes: broadcast::Sender<StoreChange>,
}

impl GuardedStore {
    pub fn new(primary: Arc<dyn PrimaryStore>, manager: Arc<SnapshotManager>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            primary,
            manager,
            changes,
        }
    }

    pub fn is_protected(&self, key: &str) -> bool {
        self.manager.protected_keys().contains(key)
    }

    /// Receive a [`StoreChange`] for every protected-key write
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub(crate) fn change_sender(&self) -> broadcast::Sender<StoreChange> {
        self.changes.clone()
    }

    /// # Errors
    ///
    /// Propagates primary-store read failures.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.primary.get(key)
    }

    /// Read and decode a JSON dataset.
    ///
    /// # Errors
    ///
    /// Returns `Serialization` if the stored text does not decode as `T`.
    pub fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.primary.get(key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw).map(Some).map_err(|e| {
            GuardError::Serialization {
                dataset: key.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// # Errors
    ///
    /// Propagates primary-store write failures.
    pub fn set(&self, key: &str, value: &str) -> Result<()> {
        self.primary.set(key, value)?;
        if self.is_protected(key) {
            // No receivers just means the scheduler is not running.
            let _ = self.changes.send(StoreChange {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Serialization` if `value` cannot be encoded, otherwise as
    /// [`GuardedStore::set`].
    pub fn set_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value).map_err(|e| GuardError::Serialization {
            dataset: key.to_string(),
            reason: e.to_string(),
        })?;
        self.set(key, &raw)
    }

    /// # Errors
    ///
    /// Propagates primary-store listing failures.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.primary.keys()
    }

    /// Delete one dataset, snapshotting first when it is protected.
    ///
    /// The snapshot always reflects writes made before the call; a pass that
    /// already read the store is not reused.
    ///
    /// A failed pre-deletion snapshot is logged and the delete proceeds; the
    /// previous retained snapshot still holds the data.
    ///
    /// # Errors
    ///
    /// Propagates the primary-store delete failure.
    pub async fn delete(&self, key: &str) -> Result<()> {
        if self.is_protected(key) {
            match self.manager.create_fresh_snapshot().await {
                Ok(id) => log_pre_deletion(key, &id),
                Err(err) => tracing::warn!(
                    dataset = key,
                    error = %err,
                    "Pre-deletion snapshot failed; deleting anyway"
                ),
            }
        }
        self.primary.delete(key)
    }

    /// Remove every dataset, always snapshotting first.
    ///
    /// # Errors
    ///
    /// Refuses with the snapshot error when the pre-clear snapshot failed and
    /// no earlier snapshot exists to recover from. Otherwise propagates the
    /// primary-store failure.
    pub async fn clear_all(&self) -> Result<()> {
        match self.manager.create_fresh_snapshot().await {
            Ok(id) => log_pre_deletion("*", &id),
            Err(err) if self.manager.list_snapshots().is_empty() => {
                tracing::error!(error = %err, "Refusing to clear store without a snapshot");
                return Err(err);
            }
            Err(err) => tracing::warn!(
                error = %err,
                "Pre-clear snapshot failed; clearing with earlier snapshots retained"
            ),
        }
        self.primary.clear()
    }
}

fn log_pre_deletion(dataset: &str, id: &SnapshotId) {
    tracing::info!(dataset, snapshot_id = %id, "Pre-deletion snapshot taken");
}
