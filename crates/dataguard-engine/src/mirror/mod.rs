//! Optional remote tabular mirror.
//!
//! The mirror is strictly best effort: every failure is absorbed here or in
//! the snapshot manager and never reaches the local backup path.

pub mod layout;
pub mod sheets;

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dataguard_core::errors::{ExError, ExErrorKind, GuardError, Result};
use dataguard_core::{MirrorConfig, Snapshot};

use layout::{dataset_range, encode_dataset, extent_range, metadata_grid, pad_to_cover, META_RANGE};
pub use sheets::SheetsClient;

/// Row-major cell values
pub type Grid = Vec<Vec<serde_json::Value>>;

/// Remote spreadsheet-like service addressed by A1 ranges
#[async_trait]
pub trait TabularStore: Send + Sync {
    async fn read(&self, range: &str) -> Result<Grid>;
    async fn write(&self, range: &str, values: Grid) -> Result<()>;
}

/// Destination for best-effort snapshot pushes
#[async_trait]
pub trait MirrorSink: Send + Sync {
    /// Push the latest snapshot's datasets.
    ///
    /// # Errors
    ///
    /// Returns `RemoteUnavailable` when the push fails part-way; callers log
    /// it and carry on.
    async fn sync(&self, snapshot: &Snapshot) -> Result<()>;

    /// One-shot bulk export of current primary data.
    ///
    /// # Errors
    ///
    /// Same failure semantics as [`MirrorSink::sync`].
    async fn migrate(&self, datasets: &BTreeMap<String, String>) -> Result<()>;
}

/// Availability as last observed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteMirrorState {
    pub available: bool,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Mirror that pushes each dataset to its own sheet of a [`TabularStore`]
pub struct RemoteMirror {
    table: Arc<dyn TabularStore>,
    timeout: Duration,
    probe_range: String,
    state: Mutex<RemoteMirrorState>,
}

impl RemoteMirror {
    pub fn new(table: Arc<dyn TabularStore>, timeout: Duration, probe_range: impl Into<String>) -> Self {
        Self {
            table,
            timeout,
            probe_range: probe_range.into(),
            state: Mutex::new(RemoteMirrorState::default()),
        }
    }

    /// Mirror backed by the HTTP spreadsheet client.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the endpoint is not a usable URL.
    pub fn from_config(config: &MirrorConfig) -> Result<Self> {
        let client = SheetsClient::new(config)?;
        Ok(Self::new(
            Arc::new(client),
            config.timeout(),
            config.probe_range.clone(),
        ))
    }

    pub fn state(&self) -> RemoteMirrorState {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Probe the remote with a lightweight read.
    pub async fn is_available(&self) -> bool {
        match self.call(self.table.read(&self.probe_range)).await {
            Ok(_) => {
                self.update(|state| state.available = true);
                true
            }
            Err(err) => {
                tracing::debug!(error = %err, "Mirror probe failed");
                self.mark_unavailable(&err);
                false
            }
        }
    }

    async fn call<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, fut).await.map_err(|_| {
            ExError::new(ExErrorKind::Timeout)
                .with_op("mirror_call")
                .with_message(format!("no response within {:?}", self.timeout))
        })?
    }

    async fn push(&self, datasets: &BTreeMap<String, String>, meta: Grid) -> Result<()> {
        for (name, raw) in datasets {
            let mut grid = encode_dataset(raw);
            // A failed extent read only means stale cells may survive.
            let previous = self
                .call(self.table.read(&extent_range(name)))
                .await
                .unwrap_or_default();
            pad_to_cover(&mut grid, &previous);
            self.call(self.table.write(&dataset_range(name), grid)).await?;
        }
        self.call(self.table.write(META_RANGE, meta)).await
    }

    async fn push_if_available(
        &self,
        op: &'static str,
        datasets: &BTreeMap<String, String>,
        meta: Grid,
    ) -> Result<()> {
        if !self.is_available().await {
            tracing::debug!(op, "Mirror unavailable; skipping push");
            return Ok(());
        }

        match self.push(datasets, meta).await {
            Ok(()) => {
                self.update(|state| {
                    state.available = true;
                    state.last_sync_at = Some(Utc::now());
                    state.last_error = None;
                });
                tracing::info!(op, dataset_count = datasets.len(), "Mirror push complete");
                Ok(())
            }
            Err(err) => {
                self.mark_unavailable(&err);
                Err(GuardError::RemoteUnavailable {
                    reason: err.to_string(),
                }
                .into())
            }
        }
    }

    fn mark_unavailable(&self, err: &ExError) {
        self.update(|state| {
            state.available = false;
            state.last_error = Some(err.to_string());
        });
    }

    fn update(&self, f: impl FnOnce(&mut RemoteMirrorState)) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut state);
    }
}

#[async_trait]
impl MirrorSink for RemoteMirror {
    async fn sync(&self, snapshot: &Snapshot) -> Result<()> {
        let meta = metadata_grid(snapshot.id.as_str(), snapshot.created_at);
        self.push_if_available("mirror_sync", &snapshot.contents, meta)
            .await
    }

    async fn migrate(&self, datasets: &BTreeMap<String, String>) -> Result<()> {
        // Not tied to a snapshot, so the id cell stays empty.
        let meta = metadata_grid("", Utc::now());
        self.push_if_available("mirror_migrate", datasets, meta)
            .await
    }
}
