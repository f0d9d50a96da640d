//! Snapshot ledger persistence.
//!
//! Synchronous functions over a `rusqlite::Connection`:
//!
//! - `persist`: insert a snapshot and its dataset rows in one transaction,
//!   delete a snapshot (dataset rows cascade)
//! - `query`: load snapshots newest-first, membership checks
//!
//! The async `SecondaryStore` adapter in `crate::secondary` runs these on the
//! blocking pool.

pub mod persist;
pub mod query;

pub use persist::{delete_snapshot, insert_snapshot};
pub use query::{contains_snapshot, load_snapshots};
