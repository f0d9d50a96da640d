use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::errors::{poisoned, Result};

/// Synchronous key/value store holding the canonical serialized value of each
/// dataset.
///
/// Values are opaque serialized documents (JSON text). Implementations must
/// return exactly the bytes last written for a key.
pub trait PrimaryStore: Send + Sync {
    /// Read the current value of `key`, `None` if absent
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Create or overwrite `key`
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing an absent key succeeds
    fn delete(&self, key: &str) -> Result<()>;

    /// Remove every key
    fn clear(&self) -> Result<()>;

    /// All keys currently present, sorted
    fn keys(&self) -> Result<Vec<String>>;
}

/// In-process primary store
///
/// Backed by a `BTreeMap` behind an `RwLock`; suitable for embedding and tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PrimaryStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| poisoned("primary_get"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| poisoned("primary_set"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| poisoned("primary_delete"))?;
        entries.remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| poisoned("primary_clear"))?;
        entries.clear();
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = self.entries.read().map_err(|_| poisoned("primary_keys"))?;
        Ok(entries.keys().cloned().collect())
    }
}
