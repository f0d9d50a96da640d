use thiserror::Error;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code usable for programmatic handling,
/// tests, and CLI output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExErrorKind {
    // Validation
    InvalidInput,
    InvalidConfig,

    // Snapshot lifecycle
    SnapshotNotFound,
    AlreadyRunning,

    // Storage tiers
    /// Primary or secondary store write failed (after retries, where applicable)
    StorageWrite,
    /// Remote mirror unreachable or rejected a write; never surfaced past the mirror boundary
    RemoteUnavailable,
    /// A dataset value could not be serialized or parsed
    Serialization,
    /// Stored snapshot data is unreadable or fails digest verification
    Persistence,

    // Integration/IO
    Io,
    Timeout,

    // Internal
    Internal,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::InvalidConfig => "ERR_INVALID_CONFIG",
            ExErrorKind::SnapshotNotFound => "ERR_SNAPSHOT_NOT_FOUND",
            ExErrorKind::AlreadyRunning => "ERR_ALREADY_RUNNING",
            ExErrorKind::StorageWrite => "ERR_STORAGE_WRITE",
            ExErrorKind::RemoteUnavailable => "ERR_REMOTE_UNAVAILABLE",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Timeout => "ERR_TIMEOUT",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }
}

/// Canonical structured error type
///
/// Classification fields for programmatic handling plus free-form context
/// for debugging.
#[derive(Debug, Clone, PartialEq)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    entity_id: Option<String>,
    message: String,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            entity_id: None,
            message: String::new(),
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add entity context (snapshot id or dataset name)
    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    pub fn entity_id(&self) -> Option<&str> {
        self.entity_id.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(entity_id) = &self.entity_id {
            write!(f, " (entity_id: {})", entity_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {}

// ========== End Error Facility ==========

/// Domain errors raised by the protection engine
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GuardError {
    /// Secondary or primary store rejected a write
    #[error("Storage write failed for {target}: {reason}")]
    StorageWrite { target: String, reason: String },

    /// Remote mirror could not be reached or refused the write
    #[error("Remote mirror unavailable: {reason}")]
    RemoteUnavailable { reason: String },

    /// Restore requested for an id that is not in the version index
    #[error("Snapshot not found: {snapshot_id}")]
    SnapshotNotFound { snapshot_id: String },

    /// A dataset's current value is not valid serialized data
    #[error("Dataset '{dataset}' could not be serialized: {reason}")]
    Serialization { dataset: String, reason: String },

    /// Scheduler `start()` called while already running
    #[error("Scheduler is already running")]
    AlreadyRunning,

    /// Configuration rejected by validation
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    /// Malformed caller input (bad snapshot id, unsafe dataset key)
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },
}

impl From<GuardError> for ExError {
    fn from(err: GuardError) -> Self {
        let message = err.to_string();
        match err {
            GuardError::StorageWrite { target, .. } => ExError::new(ExErrorKind::StorageWrite)
                .with_entity_id(target)
                .with_message(message),
            GuardError::RemoteUnavailable { .. } => {
                ExError::new(ExErrorKind::RemoteUnavailable).with_message(message)
            }
            GuardError::SnapshotNotFound { snapshot_id } => {
                ExError::new(ExErrorKind::SnapshotNotFound)
                    .with_entity_id(snapshot_id)
                    .with_message(message)
            }
            GuardError::Serialization { dataset, .. } => ExError::new(ExErrorKind::Serialization)
                .with_entity_id(dataset)
                .with_message(message),
            GuardError::AlreadyRunning => {
                ExError::new(ExErrorKind::AlreadyRunning).with_message(message)
            }
            GuardError::InvalidConfig { .. } => {
                ExError::new(ExErrorKind::InvalidConfig).with_message(message)
            }
            GuardError::InvalidInput { .. } => {
                ExError::new(ExErrorKind::InvalidInput).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for ExError {
    fn from(err: serde_json::Error) -> Self {
        ExError::new(ExErrorKind::Serialization).with_message(err.to_string())
    }
}

impl From<std::io::Error> for ExError {
    fn from(err: std::io::Error) -> Self {
        ExError::new(ExErrorKind::Io).with_message(err.to_string())
    }
}

/// Error for a poisoned in-process lock
pub fn poisoned(op: &str) -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op(op.to_string())
        .with_message("lock poisoned")
}
