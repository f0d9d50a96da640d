//! Atomic write primitives
//!
//! Uses temp→rename pattern to ensure no partial writes

use crate::errors::{io_error, Result};
use std::fs;
use std::path::Path;

/// Atomically write bytes to a file
///
/// The temp file lives next to the target so the rename stays on one
/// filesystem.
pub fn atomic_write(target_path: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target_path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error("create_primary_dir", e))?;
    }

    let file_name = target_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = target_path.with_file_name(format!(".{}.tmp", file_name));

    fs::write(&temp_path, content).map_err(|e| io_error("write_primary_temp", e))?;

    fs::rename(&temp_path, target_path).map_err(|e| io_error("rename_primary_temp", e))?;

    Ok(())
}
