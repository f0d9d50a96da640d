use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::errors::{poisoned, Result};
use crate::model::{Snapshot, SnapshotId};

/// Second, independent durable store receiving every snapshot
///
/// Async because real implementations block on disk I/O and must not stall
/// the runtime; the engine awaits these calls under its store lock.
#[async_trait]
pub trait SecondaryStore: Send + Sync {
    /// Persist a complete snapshot atomically
    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Remove a snapshot and all its dataset rows; absent ids succeed
    async fn delete_snapshot(&self, id: &SnapshotId) -> Result<()>;

    /// Load every stored snapshot, newest first
    async fn load_snapshots(&self) -> Result<Vec<Snapshot>>;

    /// Whether a snapshot with `id` is stored
    async fn contains(&self, id: &SnapshotId) -> Result<bool>;
}

/// Secondary store kept in process memory
#[derive(Debug, Default)]
pub struct MemorySecondaryStore {
    snapshots: Mutex<BTreeMap<SnapshotId, Snapshot>>,
}

impl MemorySecondaryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snapshots.lock().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SecondaryStore for MemorySecondaryStore {
    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|_| poisoned("put_snapshot"))?;
        snapshots.insert(snapshot.id.clone(), snapshot.clone());
        Ok(())
    }

    async fn delete_snapshot(&self, id: &SnapshotId) -> Result<()> {
        let mut snapshots = self
            .snapshots
            .lock()
            .map_err(|_| poisoned("delete_snapshot"))?;
        snapshots.remove(id);
        Ok(())
    }

    async fn load_snapshots(&self) -> Result<Vec<Snapshot>> {
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|_| poisoned("load_snapshots"))?;
        Ok(snapshots.values().rev().cloned().collect())
    }

    async fn contains(&self, id: &SnapshotId) -> Result<bool> {
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|_| poisoned("contains_snapshot"))?;
        Ok(snapshots.contains_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn snapshot(id: &str) -> Snapshot {
        let mut contents = BTreeMap::new();
        contents.insert("users".to_string(), "[]".to_string());
        Snapshot::new(id.parse().unwrap(), Utc::now(), contents, vec![])
    }

    #[tokio::test]
    async fn test_load_is_newest_first() {
        let store = MemorySecondaryStore::new();
        store
            .put_snapshot(&snapshot("0000000000001-0000000001"))
            .await
            .unwrap();
        store
            .put_snapshot(&snapshot("0000000000002-0000000002"))
            .await
            .unwrap();

        let loaded = store.load_snapshots().await.unwrap();
        assert_eq!(loaded[0].id.as_str(), "0000000000002-0000000002");
        assert_eq!(loaded[1].id.as_str(), "0000000000001-0000000001");
    }

    #[tokio::test]
    async fn test_delete_removes_entry() {
        let store = MemorySecondaryStore::new();
        let snap = snapshot("0000000000001-0000000001");
        store.put_snapshot(&snap).await.unwrap();
        assert!(store.contains(&snap.id).await.unwrap());

        store.delete_snapshot(&snap.id).await.unwrap();
        assert!(!store.contains(&snap.id).await.unwrap());
        assert!(store.is_empty());
    }
}
