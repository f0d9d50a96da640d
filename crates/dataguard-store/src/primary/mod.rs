//! File-backed primary store
//!
//! Provides:
//! - One JSON document per dataset key under a root directory
//! - Atomic writes (temp file + rename), so readers never see partial values
//! - Key validation keeping dataset names inside the root

mod atomic;
mod fs_store;

pub use fs_store::FsPrimaryStore;
