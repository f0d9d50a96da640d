//! DataGuard Engine - orchestration layer
//!
//! Coordinates snapshot creation, retention, restore, deletion guarding,
//! scheduling, and the optional remote mirror over the storage tiers defined
//! in `dataguard-core` and implemented in `dataguard-store`.

pub mod engine;
pub mod guard;
pub mod mirror;
pub mod restore;
pub mod scheduler;
pub mod snapshot_manager;
pub mod version_index;

pub use engine::{Engine, EngineDeps};
pub use guard::{GuardedStore, StoreChange};
pub use mirror::{Grid, MirrorSink, RemoteMirror, RemoteMirrorState, SheetsClient, TabularStore};
pub use restore::RestoreService;
pub use scheduler::{Scheduler, SchedulerState, Trigger, TriggerHandle};
pub use snapshot_manager::{ManagerOptions, SnapshotManager};
pub use version_index::VersionIndex;
