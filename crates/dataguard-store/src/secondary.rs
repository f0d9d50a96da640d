//! SQLite-backed secondary store.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dataguard_core::errors::poisoned;
use dataguard_core::{SecondaryStore, Snapshot, SnapshotId};
use rusqlite::Connection;

use crate::errors::{join_error, Result};
use crate::{db, migrations, snapshot};

/// Durable snapshot ledger in an embedded SQLite database
///
/// Every call runs on tokio's blocking pool so disk I/O never stalls the
/// scheduler's event loop. The single connection is shared behind a mutex;
/// the engine already serializes ledger writes.
#[derive(Clone)]
pub struct SqliteSecondaryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSecondaryStore {
    /// Open (creating if needed) the ledger at `path` and apply migrations
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| crate::errors::io_error("create_secondary_dir", e))?;
            }
        }
        Self::from_connection(db::open(path)?)
    }

    /// In-memory ledger (tests, ephemeral embedding)
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(db::open_in_memory()?)
    }

    fn from_connection(mut conn: Connection) -> Result<Self> {
        db::configure(&conn)?;
        migrations::apply_migrations(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock().map_err(|_| poisoned(op))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| join_error(op, e))?
    }
}

#[async_trait]
impl SecondaryStore for SqliteSecondaryStore {
    async fn put_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let owned = snapshot.clone();
        self.with_conn("put_snapshot", move |conn| {
            snapshot::insert_snapshot(conn, &owned)
        })
        .await
    }

    async fn delete_snapshot(&self, id: &SnapshotId) -> Result<()> {
        let id = id.clone();
        self.with_conn("delete_snapshot", move |conn| {
            snapshot::delete_snapshot(conn, &id)
        })
        .await
    }

    async fn load_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.with_conn("load_snapshots", |conn| snapshot::load_snapshots(conn))
            .await
    }

    async fn contains(&self, id: &SnapshotId) -> Result<bool> {
        let id = id.clone();
        self.with_conn("contains_snapshot", move |conn| {
            snapshot::contains_snapshot(conn, &id)
        })
        .await
    }
}
