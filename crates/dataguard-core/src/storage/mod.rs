//! Storage tier contracts.
//!
//! - [`PrimaryStore`]: synchronous live key/value store read and written by
//!   collaborators (through the guarded wrapper in `dataguard-engine`)
//! - [`SecondaryStore`]: independent durable copy of every snapshot

pub mod primary;
pub mod secondary;

pub use primary::{MemoryStore, PrimaryStore};
pub use secondary::{MemorySecondaryStore, SecondaryStore};
