// Shared fixtures for engine integration tests: configurable fakes for the
// storage tiers and the mirror.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use dataguard_core::errors::{GuardError, Result};
use dataguard_core::{
    EngineConfig, MemorySecondaryStore, MemoryStore, PrimaryStore, SecondaryStore, Snapshot,
    SnapshotId,
};
use dataguard_engine::{Engine, EngineDeps, MirrorSink};

pub fn config(keys: &[&str], max_versions: usize) -> EngineConfig {
    let mut config = EngineConfig::new(keys.iter().copied());
    config.max_versions = max_versions;
    config.retry_backoff_ms = 1;
    config
}

pub struct Harness {
    pub engine: Engine,
    pub primary: Arc<MemoryStore>,
    pub secondary: Arc<FlakySecondary>,
}

impl Harness {
    pub fn primary_set(&self, key: &str, value: &str) {
        self.primary.set(key, value).unwrap();
    }
}

pub async fn harness(config: EngineConfig) -> Harness {
    let primary = Arc::new(MemoryStore::new());
    let secondary = Arc::new(FlakySecondary::default());
    let engine = Engine::new(
        config,
        EngineDeps {
            primary: primary.clone(),
            secondary: secondary.clone(),
            mirror: None,
        },
    )
    .await
    .unwrap();
    Harness {
        engine,
        primary,
        secondary,
    }
}

/// Secondary store that can be told to reject writes or to stall them
#[derive(Default)]
pub struct FlakySecondary {
    pub inner: MemorySecondaryStore,
    pub fail_puts: AtomicBool,
    pub put_attempts: AtomicUsize,
    pub delay: Mutex<Option<Duration>>,
}

impl FlakySecondary {
    pub fn set_failing(&self, failing: bool) {
        self.fail_puts.store(failing, Ordering::SeqCst);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn attempts(&self) -> usize {
        self.put_attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SecondaryStore for FlakySecondary {
    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.put_attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(GuardError::StorageWrite {
                target: "secondary".to_string(),
                reason: "disk full".to_string(),
            }
            .into());
        }
        self.inner.put_snapshot(snapshot).await
    }

    async fn delete_snapshot(&self, id: &SnapshotId) -> Result<()> {
        self.inner.delete_snapshot(id).await
    }

    async fn load_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.inner.load_snapshots().await
    }

    async fn contains(&self, id: &SnapshotId) -> Result<bool> {
        self.inner.contains(id).await
    }
}

/// Primary store that rejects writes to one chosen key
pub struct BrittlePrimary {
    pub inner: MemoryStore,
    pub failing_key: Mutex<Option<String>>,
}

impl BrittlePrimary {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            failing_key: Mutex::new(None),
        }
    }

    pub fn fail_writes_to(&self, key: &str) {
        *self.failing_key.lock().unwrap() = Some(key.to_string());
    }

    pub fn heal(&self) {
        *self.failing_key.lock().unwrap() = None;
    }
}

impl PrimaryStore for BrittlePrimary {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if self.failing_key.lock().unwrap().as_deref() == Some(key) {
            return Err(GuardError::StorageWrite {
                target: key.to_string(),
                reason: "read-only filesystem".to_string(),
            }
            .into());
        }
        self.inner.set(key, value)
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.inner.delete(key)
    }

    fn clear(&self) -> Result<()> {
        self.inner.clear()
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys()
    }
}

/// Mirror that records what it was asked to push
#[derive(Default)]
pub struct RecordingMirror {
    pub synced: Mutex<Vec<SnapshotId>>,
    pub migrated: Mutex<Vec<BTreeMap<String, String>>>,
    pub fail: AtomicBool,
}

impl RecordingMirror {
    pub fn synced(&self) -> Vec<SnapshotId> {
        self.synced.lock().unwrap().clone()
    }
}

#[async_trait]
impl MirrorSink for RecordingMirror {
    async fn sync(&self, snapshot: &Snapshot) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GuardError::RemoteUnavailable {
                reason: "503".to_string(),
            }
            .into());
        }
        self.synced.lock().unwrap().push(snapshot.id.clone());
        Ok(())
    }

    async fn migrate(&self, datasets: &BTreeMap<String, String>) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(GuardError::RemoteUnavailable {
                reason: "503".to_string(),
            }
            .into());
        }
        self.migrated.lock().unwrap().push(datasets.clone());
        Ok(())
    }
}

/// Poll until `f` holds, yielding to spawned tasks in between
pub async fn eventually(mut f: impl FnMut() -> bool) {
    for _ in 0..100 {
        if f() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached");
}
