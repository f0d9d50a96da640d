//! Snapshot creation, retention, and listing.
//!
//! A pass reads every protected dataset from the primary store, records the
//! snapshot in the version index, persists it to the secondary store, evicts
//! what falls outside the retention window, and hands the snapshot to the
//! mirror in the background. Passes never overlap: a caller arriving while a
//! pass is in flight awaits that pass and receives its result. Each pass runs
//! on its own task, so it completes even when every caller has gone away.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::{TimeZone, Utc};
use dataguard_core::errors::{ExError, ExErrorKind, GuardError, Result};
use dataguard_core::{
    log_op_end, log_op_error, log_op_start, EngineConfig, PrimaryStore, ProtectedKeySet,
    SecondaryStore, Snapshot, SnapshotId, SnapshotIdGenerator, SnapshotSummary,
};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::IgnoredAny;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

use crate::mirror::MirrorSink;
use crate::version_index::VersionIndex;

type PassFuture = Shared<BoxFuture<'static, Result<SnapshotId>>>;

struct InFlightPass {
    /// Set once the pass has started reading the primary store
    captured: Arc<AtomicBool>,
    result: PassFuture,
}

/// Clears the in-flight slot when the pass task exits, panics included
struct ClearInFlight<'a>(&'a SnapshotManager);

impl Drop for ClearInFlight<'_> {
    fn drop(&mut self) {
        *self
            .0
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Orders mirror pushes so the remote always ends on the newest snapshot
#[derive(Default)]
struct MirrorQueue {
    newest: Mutex<Option<SnapshotId>>,
    turn: AsyncMutex<()>,
}

impl MirrorQueue {
    fn offer(&self, id: &SnapshotId) {
        let mut newest = self.newest.lock().unwrap_or_else(PoisonError::into_inner);
        if newest.as_ref().map_or(true, |current| id > current) {
            *newest = Some(id.clone());
        }
    }

    fn is_superseded(&self, id: &SnapshotId) -> bool {
        self.newest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|newest| newest > id)
    }
}

/// Tuning knobs taken from [`EngineConfig`]
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    pub max_versions: usize,
    /// Attempts per secondary-store write
    pub write_retries: u32,
    pub retry_backoff: Duration,
}

impl ManagerOptions {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_versions: config.max_versions,
            write_retries: config.write_retries,
            retry_backoff: config.retry_backoff(),
        }
    }
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self::from_config(&EngineConfig::new(Vec::<String>::new()))
    }
}

/// Owner of the version index and the only writer of the secondary store
pub struct SnapshotManager {
    keys: ProtectedKeySet,
    primary: Arc<dyn PrimaryStore>,
    secondary: Arc<dyn SecondaryStore>,
    mirror: Option<Arc<dyn MirrorSink>>,
    options: ManagerOptions,
    ids: SnapshotIdGenerator,
    index: Mutex<VersionIndex>,
    store_lock: AsyncMutex<()>,
    in_flight: Mutex<Option<InFlightPass>>,
    mirror_queue: Arc<MirrorQueue>,
}

impl SnapshotManager {
    pub fn new(
        keys: ProtectedKeySet,
        primary: Arc<dyn PrimaryStore>,
        secondary: Arc<dyn SecondaryStore>,
        mirror: Option<Arc<dyn MirrorSink>>,
        options: ManagerOptions,
    ) -> Arc<Self> {
        Arc::new(Self {
            index: Mutex::new(VersionIndex::new(options.max_versions)),
            keys,
            primary,
            secondary,
            mirror,
            options,
            ids: SnapshotIdGenerator::new(),
            store_lock: AsyncMutex::new(()),
            in_flight: Mutex::new(None),
            mirror_queue: Arc::new(MirrorQueue::default()),
        })
    }

    pub fn protected_keys(&self) -> &ProtectedKeySet {
        &self.keys
    }

    /// Load retained snapshots from the secondary store into the index.
    ///
    /// Snapshots whose digest no longer matches their contents are skipped.
    /// Anything beyond the retention cap is evicted from the secondary store.
    /// Returns the number of snapshots now indexed.
    ///
    /// # Errors
    ///
    /// Propagates secondary-store read failures.
    pub async fn hydrate(&self) -> Result<usize> {
        let loaded = self.secondary.load_snapshots().await?;
        let mut evicted = Vec::new();
        {
            let mut index = self.lock_index();
            for snapshot in loaded {
                if !snapshot.verify_digest() {
                    tracing::warn!(
                        snapshot_id = %snapshot.id,
                        "Stored snapshot failed digest check; ignoring"
                    );
                    continue;
                }
                self.ids.observe(&snapshot.id)?;
                evicted.extend(index.insert(snapshot));
            }
        }
        self.evict_oldest(evicted).await;

        let count = self.lock_index().len();
        tracing::info!(snapshot_count = count, "Version index hydrated");
        Ok(count)
    }

    /// Take a snapshot now, or join the pass already running.
    ///
    /// # Errors
    ///
    /// Returns `StorageWrite` when the secondary store rejected the snapshot
    /// after all retries. The snapshot stays in the version index and remains
    /// restorable for the life of the process.
    pub async fn create_snapshot(self: &Arc<Self>) -> Result<SnapshotId> {
        let (pass, _) = self.join_or_start();
        pass.await
    }

    /// Take a snapshot that reflects every write made before this call.
    ///
    /// Joins the in-flight pass only if it has not read the primary store
    /// yet; otherwise waits for it and runs a new one.
    ///
    /// # Errors
    ///
    /// As [`SnapshotManager::create_snapshot`].
    pub async fn create_fresh_snapshot(self: &Arc<Self>) -> Result<SnapshotId> {
        loop {
            let (pass, captured) = self.join_or_start();
            if !captured {
                return pass.await;
            }
            tracing::debug!("In-flight pass already captured; queueing a fresh one");
            // That outcome belongs to the pass's own callers.
            let _ = pass.await;
        }
    }

    /// Returns the pass to await and whether it had already captured.
    fn join_or_start(self: &Arc<Self>) -> (PassFuture, bool) {
        let mut slot = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pass) = slot.as_ref() {
            tracing::debug!("Snapshot pass in flight; awaiting its result");
            return (pass.result.clone(), pass.captured.load(Ordering::SeqCst));
        }

        let captured = Arc::new(AtomicBool::new(false));
        let manager = Arc::clone(self);
        let flag = Arc::clone(&captured);
        let task = tokio::spawn(async move {
            let _clear = ClearInFlight(&manager);
            manager.run_pass(&flag).await
        });
        let result = async move {
            task.await.unwrap_or_else(|err| {
                Err(ExError::new(ExErrorKind::Internal)
                    .with_op("create_snapshot")
                    .with_message(err.to_string()))
            })
        }
        .boxed()
        .shared();

        *slot = Some(InFlightPass {
            captured,
            result: result.clone(),
        });
        (result, false)
    }

    async fn run_pass(&self, captured: &AtomicBool) -> Result<SnapshotId> {
        let started = Instant::now();
        log_op_start!("create_snapshot");

        let outcome = self.capture_and_store(captured).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        match outcome {
            Ok(snapshot) => {
                log_op_end!(
                    "create_snapshot",
                    duration_ms = duration_ms,
                    snapshot_id = %snapshot.id,
                    dataset_count = snapshot.contents.len(),
                    size_bytes = snapshot.size_bytes
                );
                Ok(snapshot.id)
            }
            Err(err) => {
                log_op_error!("create_snapshot", err.clone(), duration_ms = duration_ms);
                Err(err)
            }
        }
    }

    async fn capture_and_store(&self, captured: &AtomicBool) -> Result<Snapshot> {
        let guard = self.store_lock.lock().await;

        captured.store(true, Ordering::SeqCst);
        let (contents, skipped) = self.capture();
        let id = self.ids.next()?;
        let created_at = Utc
            .timestamp_millis_opt(id.millis())
            .single()
            .unwrap_or_else(Utc::now);
        let snapshot = Snapshot::new(id, created_at, contents, skipped);

        let evicted = self.lock_index().insert(snapshot.clone());
        let persisted = self.persist_with_retry(&snapshot).await;
        self.evict_oldest(evicted).await;
        drop(guard);

        self.spawn_mirror_sync(snapshot.clone());
        persisted.map(|()| snapshot)
    }

    /// Read every protected dataset. Values that are not valid JSON, or that
    /// cannot be read, are left out and named in the returned skip list.
    fn capture(&self) -> (BTreeMap<String, String>, Vec<String>) {
        let mut contents = BTreeMap::new();
        let mut skipped = Vec::new();
        for key in self.keys.iter() {
            match self.primary.get(key) {
                Ok(Some(raw)) => match serde_json::from_str::<IgnoredAny>(&raw) {
                    Ok(_) => {
                        contents.insert(key.to_string(), raw);
                    }
                    Err(e) => {
                        let err: ExError = GuardError::Serialization {
                            dataset: key.to_string(),
                            reason: e.to_string(),
                        }
                        .into();
                        tracing::warn!(dataset = key, error = %err, "Skipping dataset");
                        skipped.push(key.to_string());
                    }
                },
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(dataset = key, error = %err, "Skipping unreadable dataset");
                    skipped.push(key.to_string());
                }
            }
        }
        (contents, skipped)
    }

    async fn persist_with_retry(&self, snapshot: &Snapshot) -> Result<()> {
        let attempts = self.options.write_retries.max(1);
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.secondary.put_snapshot(snapshot).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    tracing::warn!(
                        snapshot_id = %snapshot.id,
                        attempt,
                        attempts,
                        error = %err,
                        "Secondary store write failed"
                    );
                    last_error = err.to_string();
                    if attempt < attempts {
                        tokio::time::sleep(self.options.retry_backoff * attempt).await;
                    }
                }
            }
        }
        Err(GuardError::StorageWrite {
            target: "secondary".to_string(),
            reason: last_error,
        }
        .into())
    }

    /// Delete evicted snapshots from the secondary store.
    ///
    /// Failures are logged; the entry is already gone from the index and a
    /// later hydrate evicts it again.
    async fn evict_oldest(&self, evicted: Vec<SnapshotId>) {
        for id in evicted {
            match self.secondary.delete_snapshot(&id).await {
                Ok(()) => tracing::debug!(snapshot_id = %id, "Evicted snapshot"),
                Err(err) => {
                    tracing::warn!(snapshot_id = %id, error = %err, "Failed to evict snapshot")
                }
            }
        }
    }

    /// Pushes run one at a time; a push is dropped once a newer snapshot is
    /// queued behind it.
    fn spawn_mirror_sync(&self, snapshot: Snapshot) {
        let Some(mirror) = self.mirror.clone() else {
            return;
        };
        let queue = Arc::clone(&self.mirror_queue);
        queue.offer(&snapshot.id);
        tokio::spawn(async move {
            let _turn = queue.turn.lock().await;
            if queue.is_superseded(&snapshot.id) {
                tracing::debug!(snapshot_id = %snapshot.id, "Newer snapshot queued for mirror; skipping");
                return;
            }
            if let Err(err) = mirror.sync(&snapshot).await {
                tracing::warn!(
                    snapshot_id = %snapshot.id,
                    error = %err,
                    "Mirror sync failed; local backup unaffected"
                );
            }
        });
    }

    /// Retained snapshots, newest first
    pub fn list_snapshots(&self) -> Vec<SnapshotSummary> {
        self.lock_index().summaries()
    }

    pub fn get(&self, id: &SnapshotId) -> Option<Snapshot> {
        self.lock_index().get(id).cloned()
    }

    pub fn newest(&self) -> Option<Snapshot> {
        self.lock_index().newest().cloned()
    }

    /// Drop one snapshot from the index and the secondary store.
    ///
    /// Returns whether the snapshot was indexed.
    ///
    /// # Errors
    ///
    /// Returns `StorageWrite` if the secondary store delete fails.
    pub async fn purge(&self, id: &SnapshotId) -> Result<bool> {
        let _guard = self.store_lock.lock().await;
        let removed = self.lock_index().remove(id).is_some();
        self.secondary.delete_snapshot(id).await.map_err(|err| {
            ExError::from(GuardError::StorageWrite {
                target: "secondary".to_string(),
                reason: err.to_string(),
            })
        })?;
        tracing::info!(snapshot_id = %id, removed, "Purged snapshot");
        Ok(removed)
    }

    /// Serialize a primary-store rewrite against snapshot passes
    pub(crate) async fn lock_store(&self) -> AsyncMutexGuard<'_, ()> {
        self.store_lock.lock().await
    }

    fn lock_index(&self) -> std::sync::MutexGuard<'_, VersionIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
