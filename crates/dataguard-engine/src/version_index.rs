//! Bounded, newest-first in-memory index of retained snapshots.

use std::collections::VecDeque;

use dataguard_core::{Snapshot, SnapshotId, SnapshotSummary};

/// Ordered collection of retained snapshots
///
/// Entries are kept sorted by id, newest first. Inserting past the cap evicts
/// from the oldest end and hands the evicted ids back so the caller can drop
/// them from the secondary store too.
#[derive(Debug)]
pub struct VersionIndex {
    max_versions: usize,
    entries: VecDeque<Snapshot>,
}

impl VersionIndex {
    pub fn new(max_versions: usize) -> Self {
        Self {
            max_versions: max_versions.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Insert a snapshot in id order and enforce the retention cap.
    ///
    /// Returns the ids evicted to honour the cap, oldest first. Inserting an
    /// id already present replaces the stored copy.
    pub fn insert(&mut self, snapshot: Snapshot) -> Vec<SnapshotId> {
        if let Some(existing) = self.entries.iter_mut().find(|s| s.id == snapshot.id) {
            *existing = snapshot;
            return Vec::new();
        }

        let position = self
            .entries
            .iter()
            .position(|s| s.id < snapshot.id)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, snapshot);
        self.evict_overflow()
    }

    fn evict_overflow(&mut self) -> Vec<SnapshotId> {
        let mut evicted = Vec::new();
        while self.entries.len() > self.max_versions {
            if let Some(oldest) = self.entries.pop_back() {
                evicted.push(oldest.id);
            }
        }
        evicted.reverse();
        evicted
    }

    pub fn get(&self, id: &SnapshotId) -> Option<&Snapshot> {
        self.entries.iter().find(|s| &s.id == id)
    }

    pub fn remove(&mut self, id: &SnapshotId) -> Option<Snapshot> {
        let position = self.entries.iter().position(|s| &s.id == id)?;
        self.entries.remove(position)
    }

    pub fn newest(&self) -> Option<&Snapshot> {
        self.entries.front()
    }

    pub fn summaries(&self) -> Vec<SnapshotSummary> {
        self.entries.iter().map(Snapshot::summary).collect()
    }

    pub fn ids(&self) -> Vec<SnapshotId> {
        self.entries.iter().map(|s| s.id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_versions(&self) -> usize {
        self.max_versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn snapshot(millis: i64, seq: u64) -> Snapshot {
        let id: SnapshotId = format!("{:013}-{:010}", millis, seq).parse().unwrap();
        let mut contents = BTreeMap::new();
        contents.insert("users".to_string(), format!("[{}]", seq));
        Snapshot::new(
            id,
            Utc.timestamp_millis_opt(millis).unwrap(),
            contents,
            Vec::new(),
        )
    }

    #[test]
    fn test_newest_first_and_cap() {
        let mut index = VersionIndex::new(3);
        let mut evicted = Vec::new();
        for seq in 1..=4 {
            evicted.extend(index.insert(snapshot(1_000, seq)));
        }

        let ids: Vec<u64> = index.ids().iter().map(SnapshotId::seq).collect();
        assert_eq!(ids, vec![4, 3, 2]);
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].seq(), 1);
        assert_eq!(index.newest().map(|s| s.id.seq()), Some(4));
    }

    #[test]
    fn test_out_of_order_insert_keeps_order() {
        let mut index = VersionIndex::new(10);
        index.insert(snapshot(2_000, 2));
        index.insert(snapshot(3_000, 3));
        index.insert(snapshot(1_000, 1));

        let millis: Vec<i64> = index.summaries().iter().map(|s| s.id.millis()).collect();
        assert_eq!(millis, vec![3_000, 2_000, 1_000]);
    }

    #[test]
    fn test_inserting_older_than_full_window_evicts_it() {
        let mut index = VersionIndex::new(2);
        index.insert(snapshot(2_000, 2));
        index.insert(snapshot(3_000, 3));

        let evicted = index.insert(snapshot(1_000, 1));
        assert_eq!(evicted.iter().map(SnapshotId::seq).collect::<Vec<_>>(), vec![1]);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_remove_and_get() {
        let mut index = VersionIndex::new(5);
        let s = snapshot(1_000, 1);
        let id = s.id.clone();
        index.insert(s);

        assert!(index.get(&id).is_some());
        assert!(index.remove(&id).is_some());
        assert!(index.get(&id).is_none());
        assert!(index.is_empty());
    }
}
