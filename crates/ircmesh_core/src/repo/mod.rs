//! Persistence contracts for extension data.
//!
//! # Responsibility
//! - Define the storage contract for per-entity attachment snapshots.
//! - Keep SQLite query details out of the server state.
//!
//! # Invariants
//! - Only internal forms are stored; values without one stay in memory.
//! - Stored names are resolved through the registry on restore, never
//!   trusted as descriptors on their own.

pub mod snapshot_repo;

pub use snapshot_repo::{
    RepoError, RepoResult, SnapshotRepository, SqliteSnapshotRepository, StoredItem,
};
