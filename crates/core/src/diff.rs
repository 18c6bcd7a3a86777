//! Structural diff statistics between two stored trees

use crate::blob::BlobStore;
use crate::hash::Blake3Hash;
use crate::store::Store;
use crate::tree::{Entry, EntryKind};
use anyhow::{Context, Result};
use std::collections::BTreeSet;

/// Kind of stored object a blob handle points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlobKind {
    /// File content or symlink target
    Data,
    /// Serialized tree
    Tree,
}

/// Reference to one content block
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlobHandle {
    pub kind: BlobKind,
    pub hash: Blake3Hash,
}

impl BlobHandle {
    pub fn data(hash: Blake3Hash) -> Self {
        Self { kind: BlobKind::Data, hash }
    }

    pub fn tree(hash: Blake3Hash) -> Self {
        Self { kind: BlobKind::Tree, hash }
    }
}

/// Set of content blocks referenced by one side of a diff
pub type BlobSet = BTreeSet<BlobHandle>;

/// Per-direction counters (added or removed)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStat {
    pub files: usize,
    pub dirs: usize,
    pub others: usize,
    pub data_blobs: usize,
    pub tree_blobs: usize,
    pub bytes: u64,
}

impl DiffStat {
    /// Count one entry by kind
    pub fn add(&mut self, entry: &Entry) {
        match entry.kind {
            EntryKind::File => self.files += 1,
            EntryKind::Dir => self.dirs += 1,
            EntryKind::Symlink => self.others += 1,
        }
    }

    fn add_blob(&mut self, handle: &BlobHandle, blobs: &BlobStore) {
        match handle.kind {
            BlobKind::Data => self.data_blobs += 1,
            BlobKind::Tree => self.tree_blobs += 1,
        }
        self.bytes += blobs.blob_size(handle.hash).unwrap_or(0);
    }
}

/// Aggregate result of comparing two trees
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffStats {
    /// Entries present on both sides whose content changed
    pub changed_files: usize,
    pub added: DiffStat,
    pub removed: DiffStat,
    /// Blocks referenced by the before tree
    pub blobs_before: BlobSet,
    /// Blocks referenced by the after tree
    pub blobs_after: BlobSet,
}

/// Compute diff statistics between two stored trees
///
/// Mode and mtime differences do not count as changes. They still change the
/// tree hash, which shows up only in the block sets.
pub fn diff_trees(store: &Store, before: Blake3Hash, after: Blake3Hash) -> Result<DiffStats> {
    let old = store
        .read_tree(before)
        .with_context(|| format!("Failed to load tree {}", before.short()))?;
    let new = store
        .read_tree(after)
        .with_context(|| format!("Failed to load tree {}", after.short()))?;

    let mut stats = DiffStats::default();
    stats.blobs_before.insert(BlobHandle::tree(before));
    stats.blobs_after.insert(BlobHandle::tree(after));

    for (path, old_entry) in old.sorted_entries() {
        let Some(new_entry) = new.get_key(path) else {
            stats.removed.add(old_entry);
            insert_blob(&mut stats.blobs_before, old_entry);
            continue;
        };

        if old_entry.kind != new_entry.kind {
            stats.removed.add(old_entry);
            stats.added.add(new_entry);
        } else if old_entry.kind != EntryKind::Dir && old_entry.blob != new_entry.blob {
            stats.changed_files += 1;
        }

        insert_blob(&mut stats.blobs_before, old_entry);
        insert_blob(&mut stats.blobs_after, new_entry);
    }

    for (path, new_entry) in new.sorted_entries() {
        if old.get_key(path).is_none() {
            stats.added.add(new_entry);
            insert_blob(&mut stats.blobs_after, new_entry);
        }
    }

    Ok(stats)
}

/// Fill block counts and byte totals of `added`/`removed` from the block sets
///
/// Block sizes come from the loaded blob index; trees and unindexed blobs count zero bytes.
pub fn finalize_blob_counts(stats: &mut DiffStats, blobs: &BlobStore) {
    for handle in stats.blobs_after.difference(&stats.blobs_before) {
        stats.added.add_blob(handle, blobs);
    }
    for handle in stats.blobs_before.difference(&stats.blobs_after) {
        stats.removed.add_blob(handle, blobs);
    }
}

fn insert_blob(set: &mut BlobSet, entry: &Entry) {
    if let Some(hash) = entry.blob {
        set.insert(BlobHandle::data(hash));
    }
}
