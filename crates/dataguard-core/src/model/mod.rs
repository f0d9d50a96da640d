pub mod keyset;
pub mod snapshot;
pub mod snapshot_id;

pub use keyset::ProtectedKeySet;
pub use snapshot::{compute_content_digest, Snapshot, SnapshotSummary};
pub use snapshot_id::{SnapshotId, SnapshotIdGenerator};
