//! DataGuard Core - domain model and contracts for the versioned-backup engine
//!
//! This crate provides:
//! - Snapshot model with sortable composite ids and content digests
//! - Protected key set and engine configuration
//! - Storage tier contracts (`PrimaryStore`, `SecondaryStore`) with in-memory implementations
//! - The `ExError` error facility and structured logging facility

pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod model;
pub mod storage;

// Re-export commonly used types
pub use config::{EngineConfig, MirrorConfig};
pub use errors::{ExError, ExErrorKind, GuardError, Result};
pub use model::{ProtectedKeySet, Snapshot, SnapshotId, SnapshotIdGenerator, SnapshotSummary};
pub use storage::{MemorySecondaryStore, MemoryStore, PrimaryStore, SecondaryStore};
