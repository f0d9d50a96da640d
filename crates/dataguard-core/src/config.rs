//! Engine configuration.
//!
//! Loaded from a TOML file layered with `DATAGUARD_*` environment variables
//! (`DATAGUARD_DATA_DIR`, `DATAGUARD_MIRROR__TOKEN`, ...). The protected key
//! set is deployment configuration; nothing changes it at runtime.

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use dataguard_core_types::Sensitive;
use serde::Deserialize;

use crate::errors::{ExError, ExErrorKind, GuardError, Result};
use crate::model::ProtectedKeySet;

/// Default snapshot period (5 minutes)
pub const DEFAULT_BACKUP_INTERVAL: Duration = Duration::from_secs(300);
/// Default retention cap
pub const DEFAULT_MAX_VERSIONS: usize = 100;

fn default_backup_interval_secs() -> u64 {
    DEFAULT_BACKUP_INTERVAL.as_secs()
}

fn default_max_versions() -> usize {
    DEFAULT_MAX_VERSIONS
}

fn default_debounce_ms() -> u64 {
    2_000
}

fn default_write_retries() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    100
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".dataguard")
}

fn default_mirror_timeout_secs() -> u64 {
    5
}

fn default_probe_range() -> String {
    "_meta!A1".to_string()
}

/// Top-level engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Dataset names subject to snapshotting and deletion guarding
    pub protected_keys: Vec<String>,
    #[serde(default = "default_backup_interval_secs")]
    pub backup_interval_secs: u64,
    #[serde(default = "default_max_versions")]
    pub max_versions: usize,
    /// Window in which lifecycle/mutation triggers collapse into one snapshot
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
    /// Attempts for a secondary-store write before reporting `StorageWrite`
    #[serde(default = "default_write_retries")]
    pub write_retries: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Root for the file-backed primary store and the SQLite secondary store
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub mirror: Option<MirrorConfig>,
}

/// Remote tabular mirror settings
#[derive(Debug, Clone, Deserialize)]
pub struct MirrorConfig {
    /// Base URL of the spreadsheet resource (`.../spreadsheets/{id}`)
    pub endpoint: String,
    #[serde(default)]
    pub token: Option<Sensitive<String>>,
    #[serde(default = "default_mirror_timeout_secs")]
    pub timeout_secs: u64,
    /// Range read by the availability probe
    #[serde(default = "default_probe_range")]
    pub probe_range: String,
}

impl MirrorConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl EngineConfig {
    /// Configuration with defaults for everything except the key set
    pub fn new<I, S>(protected_keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected_keys: protected_keys.into_iter().map(Into::into).collect(),
            backup_interval_secs: default_backup_interval_secs(),
            max_versions: default_max_versions(),
            debounce_ms: default_debounce_ms(),
            write_retries: default_write_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            data_dir: default_data_dir(),
            mirror: None,
        }
    }

    /// Load from a TOML file plus `DATAGUARD_*` environment overrides.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the file cannot be parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = Config::builder()
            .add_source(File::new(&path.to_string_lossy(), FileFormat::Toml))
            .add_source(
                Environment::with_prefix("DATAGUARD")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("protected_keys"),
            )
            .build()
            .map_err(|e| config_error(path, e))?;

        let config: EngineConfig = settings
            .try_deserialize()
            .map_err(|e| config_error(path, e))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the engine relies on.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` describing the first violated rule.
    pub fn validate(&self) -> Result<()> {
        self.protected_key_set()?;
        if self.max_versions == 0 {
            return Err(invalid("max_versions must be at least 1"));
        }
        if self.backup_interval_secs == 0 {
            return Err(invalid("backup_interval_secs must be at least 1"));
        }
        if let Some(mirror) = &self.mirror {
            if mirror.endpoint.trim().is_empty() {
                return Err(invalid("mirror.endpoint must not be empty"));
            }
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `InvalidConfig` for an empty, duplicated, or unsafe key list.
    pub fn protected_key_set(&self) -> Result<ProtectedKeySet> {
        ProtectedKeySet::new(self.protected_keys.iter().cloned())
    }

    pub fn backup_interval(&self) -> Duration {
        Duration::from_secs(self.backup_interval_secs)
    }

    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    /// Directory holding the file-backed primary store
    pub fn primary_dir(&self) -> PathBuf {
        self.data_dir.join("primary")
    }

    /// Path of the SQLite secondary store
    pub fn secondary_db_path(&self) -> PathBuf {
        self.data_dir.join("snapshots.db")
    }
}

fn invalid(reason: &str) -> ExError {
    GuardError::InvalidConfig {
        reason: reason.to_string(),
    }
    .into()
}

fn config_error(path: &Path, err: config::ConfigError) -> ExError {
    ExError::new(ExErrorKind::InvalidConfig)
        .with_op("load_config")
        .with_entity_id(path.display().to_string())
        .with_message(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new(["users"]);
        assert_eq!(config.backup_interval(), DEFAULT_BACKUP_INTERVAL);
        assert_eq!(config.max_versions, DEFAULT_MAX_VERSIONS);
        assert_eq!(config.debounce_window(), Duration::from_secs(2));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_toml() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
protected_keys = ["users", "transactions"]
max_versions = 7
data_dir = "/var/lib/dataguard"

[mirror]
endpoint = "https://sheets.example/v4/spreadsheets/abc"
token = "tok-123"
"#
        )
        .unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.protected_keys, vec!["users", "transactions"]);
        assert_eq!(config.max_versions, 7);
        assert_eq!(config.backup_interval_secs, 300);
        assert_eq!(
            config.secondary_db_path(),
            PathBuf::from("/var/lib/dataguard/snapshots.db")
        );

        let mirror = config.mirror.expect("mirror section");
        assert_eq!(mirror.timeout(), Duration::from_secs(5));
        assert_eq!(mirror.probe_range, "_meta!A1");
        assert_eq!(mirror.token.as_ref().map(|t| t.expose().as_str()), Some("tok-123"));
        assert!(!format!("{:?}", mirror.token).contains("tok-123"));
    }

    #[test]
    fn test_validate_rejects_zero_retention() {
        let mut config = EngineConfig::new(["users"]);
        config.max_versions = 0;
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
    }

    #[test]
    fn test_validate_rejects_path_like_key() {
        let config = EngineConfig::new(["users", "a/b"]);
        let err = config.validate().unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
        assert!(err.message().contains("a/b"));
    }

    #[test]
    fn test_load_rejects_missing_keys() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "max_versions = 3").unwrap();
        let err = EngineConfig::load(file.path()).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidConfig);
    }
}
