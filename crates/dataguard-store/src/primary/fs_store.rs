//! Directory of JSON documents acting as the primary store

use crate::errors::{io_error, Result};
use crate::primary::atomic::atomic_write;
use dataguard_core::errors::GuardError;
use dataguard_core::model::keyset::is_safe_dataset_key;
use dataguard_core::PrimaryStore;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

const EXTENSION: &str = "json";

/// Primary store keeping each dataset in `<root>/<key>.json`
pub struct FsPrimaryStore {
    root: PathBuf,
}

impl FsPrimaryStore {
    /// Create a store rooted at `root` (created lazily on first write)
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        validate_key(key)?;
        Ok(self.root.join(format!("{}.{}", key, EXTENSION)))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if is_safe_dataset_key(key) {
        Ok(())
    } else {
        Err(GuardError::InvalidInput {
            reason: format!("dataset key '{}' is not a safe file name", key),
        }
        .into())
    }
}

impl PrimaryStore for FsPrimaryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(io_error("read_primary", e).with_entity_id(key)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        atomic_write(&path, value.as_bytes()).map_err(|e| e.with_entity_id(key))
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_error("delete_primary", e).with_entity_id(key)),
        }
    }

    fn clear(&self) -> Result<()> {
        for key in self.keys()? {
            self.delete(&key)?;
        }
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_error("list_primary", e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error("list_primary", e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                if !stem.starts_with('.') {
                    keys.push(stem.to_string());
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
