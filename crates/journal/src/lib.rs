//! Snapshot journal and cleaning
//!
//! This crate provides:
//! - Snapshot records with content-derived IDs
//! - Snapshot index (sled embedded DB)
//! - Repository facade over store + index
//! - Equivalence-based snapshot cleaning

pub mod clean;
pub mod journal;
pub mod repository;
pub mod snapshot;

// Re-exports
pub use journal::Journal;
pub use repository::{find_repo_root, Repository};
pub use snapshot::{now_unix_ms, Snapshot, SnapshotId};

/// Result type for journal operations
pub type Result<T> = anyhow::Result<T>;
