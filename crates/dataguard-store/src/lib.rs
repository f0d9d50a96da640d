//! DataGuard Store - durable storage tiers
//!
//! Provides:
//! - SQLite snapshot ledger with checksummed migrations (`SqliteSecondaryStore`)
//! - File-backed primary store with atomic writes (`FsPrimaryStore`)

pub mod db;
pub mod errors;
pub mod migrations;
pub mod primary;
pub mod secondary;
pub mod snapshot;

// Re-export key types
pub use errors::Result;
pub use primary::FsPrimaryStore;
pub use secondary::SqliteSecondaryStore;
