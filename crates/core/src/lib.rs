//! Timelapse Core - Content-addressed storage primitives for snapshot repositories
//!
//! This crate provides the foundational storage layer:
//! - BLAKE3 hashing
//! - Blob storage with compression
//! - Tree representation and diffing
//! - On-disk store management
//! - Structural diff statistics

pub mod hash;
pub mod blob;
pub mod tree;
pub mod store;
pub mod diff;

// Re-export main types for convenience
pub use hash::{hash_bytes, Blake3Hash};
pub use blob::{Blob, BlobHeaderV1, BlobStore};
pub use tree::{Entry, EntryKind, Tree, TreeDiff};
pub use store::{ObjectError, Store};
pub use diff::{diff_trees, finalize_blob_counts, BlobHandle, BlobKind, BlobSet, DiffStat, DiffStats};

/// Common result type used throughout tl-core
pub type Result<T> = anyhow::Result<T>;
