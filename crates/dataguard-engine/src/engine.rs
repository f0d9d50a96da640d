//! Wiring of stores, snapshot manager, scheduler, and mirror into one service.

use std::collections::BTreeMap;
use std::sync::Arc;

use dataguard_core::errors::{GuardError, Result};
use dataguard_core::{
    EngineConfig, MemorySecondaryStore, MemoryStore, PrimaryStore, ProtectedKeySet,
    SecondaryStore, Snapshot, SnapshotId, SnapshotSummary,
};
use dataguard_store::{FsPrimaryStore, SqliteSecondaryStore};

use crate::guard::GuardedStore;
use crate::mirror::{MirrorSink, RemoteMirror};
use crate::restore::RestoreService;
use crate::scheduler::{Scheduler, SchedulerState, TriggerHandle};
use crate::snapshot_manager::{ManagerOptions, SnapshotManager};

/// Storage tiers and mirror an [`Engine`] runs against
pub struct EngineDeps {
    pub primary: Arc<dyn PrimaryStore>,
    pub secondary: Arc<dyn SecondaryStore>,
    pub mirror: Option<Arc<dyn MirrorSink>>,
}

impl EngineDeps {
    /// Process-memory stores and no mirror
    pub fn in_memory() -> Self {
        Self {
            primary: Arc::new(MemoryStore::new()),
            secondary: Arc::new(MemorySecondaryStore::new()),
            mirror: None,
        }
    }
}

/// Versioned-backup engine for one application instance
///
/// Construct one per process and share it; each engine owns its scheduler,
/// so two engines never interfere with each other's loop.
pub struct Engine {
    keys: ProtectedKeySet,
    primary: Arc<dyn PrimaryStore>,
    mirror: Option<Arc<dyn MirrorSink>>,
    manager: Arc<SnapshotManager>,
    store: GuardedStore,
    restorer: RestoreService,
    scheduler: Scheduler,
}

impl Engine {
    /// Build an engine and load retained snapshots from the secondary store.
    ///
    /// An unreadable secondary store is logged and the engine starts with an
    /// empty history.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if `config` fails validation.
    pub async fn new(config: EngineConfig, deps: EngineDeps) -> Result<Self> {
        config.validate()?;
        let keys = config.protected_key_set()?;

        let manager = SnapshotManager::new(
            keys.clone(),
            Arc::clone(&deps.primary),
            deps.secondary,
            deps.mirror.clone(),
            ManagerOptions::from_config(&config),
        );
        if let Err(err) = manager.hydrate().await {
            tracing::warn!(error = %err, "Could not load snapshot history; starting empty");
        }

        let store = GuardedStore::new(Arc::clone(&deps.primary), Arc::clone(&manager));
        let restorer = RestoreService::new(Arc::clone(&deps.primary), Arc::clone(&manager));
        let scheduler = Scheduler::new(
            Arc::clone(&manager),
            config.backup_interval(),
            config.debounce_window(),
            store.change_sender(),
        );

        tracing::info!(
            protected_keys = keys.len(),
            max_versions = config.max_versions,
            mirror = deps.mirror.is_some(),
            "Engine ready"
        );

        Ok(Self {
            keys,
            primary: deps.primary,
            mirror: deps.mirror,
            manager,
            store,
            restorer,
            scheduler,
        })
    }

    /// Engine over the file-backed primary store and SQLite secondary store
    /// under `config.data_dir`, with the HTTP mirror when configured.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` for a bad configuration, or the store error if
    /// the secondary database cannot be opened.
    pub async fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let primary = Arc::new(FsPrimaryStore::new(config.primary_dir()));
        let secondary = Arc::new(SqliteSecondaryStore::open(config.secondary_db_path())?);
        let mirror = match &config.mirror {
            Some(mirror_config) => {
                Some(Arc::new(RemoteMirror::from_config(mirror_config)?) as Arc<dyn MirrorSink>)
            }
            None => None,
        };
        Self::new(
            config,
            EngineDeps {
                primary,
                secondary,
                mirror,
            },
        )
        .await
    }

    /// # Errors
    ///
    /// See [`SnapshotManager::create_snapshot`].
    pub async fn create_snapshot(&self) -> Result<SnapshotId> {
        self.manager.create_snapshot().await
    }

    /// Retained snapshots, newest first
    pub fn list_snapshots(&self) -> Vec<SnapshotSummary> {
        self.manager.list_snapshots()
    }

    pub fn snapshot(&self, id: &SnapshotId) -> Option<Snapshot> {
        self.manager.get(id)
    }

    /// # Errors
    ///
    /// See [`RestoreService::restore`].
    pub async fn restore(&self, id: &SnapshotId) -> Result<()> {
        self.restorer.restore(id).await.map(|_| ())
    }

    /// Snapshot the current state, then restore `id`.
    ///
    /// Returns the id of the safety snapshot. The target is checked first so
    /// an unknown id does not cost a snapshot.
    ///
    /// # Errors
    ///
    /// `SnapshotNotFound` for an unknown id, the safety snapshot's error if it
    /// fails (nothing is restored then), or the restore error.
    pub async fn restore_with_backup(&self, id: &SnapshotId) -> Result<SnapshotId> {
        if self.manager.get(id).is_none() {
            return Err(GuardError::SnapshotNotFound {
                snapshot_id: id.to_string(),
            }
            .into());
        }
        let safety = self.manager.create_fresh_snapshot().await?;
        self.restorer.restore(id).await?;
        Ok(safety)
    }

    /// Drop one snapshot from history.
    ///
    /// # Errors
    ///
    /// See [`SnapshotManager::purge`].
    pub async fn purge(&self, id: &SnapshotId) -> Result<bool> {
        self.manager.purge(id).await
    }

    /// # Errors
    ///
    /// Returns `AlreadyRunning` if the scheduler is active.
    pub fn start(&self) -> Result<()> {
        self.scheduler.start()
    }

    pub async fn stop(&self) {
        self.scheduler.stop().await;
    }

    pub fn scheduler_state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn trigger_handle(&self) -> TriggerHandle {
        self.scheduler.trigger_handle()
    }

    /// Guarded access to the primary store for application code
    pub fn store(&self) -> &GuardedStore {
        &self.store
    }

    pub fn protected_keys(&self) -> &ProtectedKeySet {
        &self.keys
    }

    /// Push the current protected datasets to the mirror in one go.
    ///
    /// Returns `false` when no mirror is configured or the push failed; the
    /// failure is logged, never raised.
    ///
    /// # Errors
    ///
    /// Propagates primary-store read failures.
    pub async fn migrate_mirror(&self) -> Result<bool> {
        let Some(mirror) = &self.mirror else {
            tracing::info!("No mirror configured; nothing to migrate");
            return Ok(false);
        };

        let mut datasets = BTreeMap::new();
        for key in self.keys.iter() {
            if let Some(raw) = self.primary.get(key)? {
                datasets.insert(key.to_string(), raw);
            }
        }

        match mirror.migrate(&datasets).await {
            Ok(()) => Ok(true),
            Err(err) => {
                tracing::warn!(error = %err, "Mirror migration failed");
                Ok(false)
            }
        }
    }
}
