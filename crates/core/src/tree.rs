//! Tree representation for repository snapshots

use crate::hash::{hash_bytes, Blake3Hash};
use ahash::AHashMap;
use anyhow::Result;
use smallvec::SmallVec;
use std::path::Path;

/// Path key stored in a tree (normalized, `/`-separated bytes)
pub type PathKey = SmallVec<[u8; 64]>;

/// Type of tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Symbolic link (blob holds the link target)
    Symlink,
    /// Directory
    Dir,
}

impl EntryKind {
    fn to_byte(self) -> u8 {
        match self {
            EntryKind::File => 0,
            EntryKind::Symlink => 1,
            EntryKind::Dir => 2,
        }
    }

    fn from_byte(b: u8) -> Result<Self> {
        match b {
            0 => Ok(EntryKind::File),
            1 => Ok(EntryKind::Symlink),
            2 => Ok(EntryKind::Dir),
            other => anyhow::bail!("Unknown entry kind: {}", other),
        }
    }
}

/// Entry in a tree (file, symlink, directory)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Kind of entry
    pub kind: EntryKind,
    /// Unix permission bits (mode)
    pub mode: u32,
    /// Modification time (Unix milliseconds)
    pub mtime_ms: u64,
    /// Hash of the blob holding this entry's content; directories have none
    pub blob: Option<Blake3Hash>,
}

impl Entry {
    /// Create a new file entry
    pub fn file(mode: u32, mtime_ms: u64, blob_hash: Blake3Hash) -> Self {
        Self {
            kind: EntryKind::File,
            mode,
            mtime_ms,
            blob: Some(blob_hash),
        }
    }

    /// Create a new symlink entry
    pub fn symlink(mtime_ms: u64, target_hash: Blake3Hash) -> Self {
        Self {
            kind: EntryKind::Symlink,
            mode: 0o120000, // Standard symlink mode
            mtime_ms,
            blob: Some(target_hash),
        }
    }

    /// Create a new directory entry
    pub fn dir(mode: u32, mtime_ms: u64) -> Self {
        Self {
            kind: EntryKind::Dir,
            mode,
            mtime_ms,
            blob: None,
        }
    }
}

/// A tree represents the complete repository state at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: AHashMap<PathKey, Entry>,
}

impl Tree {
    const MAGIC: &'static [u8; 4] = b"SNT1";

    /// Create a new empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry into the tree
    pub fn insert(&mut self, path: &Path, entry: Entry) {
        self.entries.insert(path_key(path), entry);
    }

    /// Get an entry from the tree
    pub fn get(&self, path: &Path) -> Option<&Entry> {
        self.entries.get(&path_key(path))
    }

    /// Get an entry by raw path key
    pub fn get_key(&self, key: &[u8]) -> Option<&Entry> {
        self.entries.get(key)
    }

    /// Remove an entry from the tree
    pub fn remove(&mut self, path: &Path) -> Option<Entry> {
        self.entries.remove(&path_key(path))
    }

    /// Get the number of entries in the tree
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted lexicographically by path
    pub fn sorted_entries(&self) -> Vec<(&PathKey, &Entry)> {
        let mut entries: Vec<_> = self.entries.iter().collect();
        entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        entries
    }

    /// Serialize the tree to bytes (TreeV1 format)
    ///
    /// Format:
    /// - magic: "SNT1" (4 bytes)
    /// - entry_count: u32
    /// - entries (sorted lexicographically by path):
    ///   - path_len: u16
    ///   - path_bytes: [u8; path_len]
    ///   - kind: u8 (0=file, 1=symlink, 2=dir)
    ///   - mode: u32
    ///   - mtime_ms: u64
    ///   - has_blob: u8, followed by blob_hash: [u8; 32] when set
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.entries.len() * 96);
        out.extend_from_slice(Self::MAGIC);
        out.extend_from_slice(&(self.entries.len() as u32).to_le_bytes());

        for (path, entry) in self.sorted_entries() {
            out.extend_from_slice(&(path.len() as u16).to_le_bytes());
            out.extend_from_slice(path);
            out.push(entry.kind.to_byte());
            out.extend_from_slice(&entry.mode.to_le_bytes());
            out.extend_from_slice(&entry.mtime_ms.to_le_bytes());
            match entry.blob {
                Some(hash) => {
                    out.push(1);
                    out.extend_from_slice(hash.as_bytes());
                }
                None => out.push(0),
            }
        }

        out
    }

    /// Deserialize a tree from bytes (TreeV1 format)
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let mut reader = ByteReader::new(bytes);

        if reader.take(4)? != Self::MAGIC {
            anyhow::bail!("Invalid tree magic");
        }
        let count = u32::from_le_bytes(reader.array()?) as usize;

        let mut entries = AHashMap::with_capacity(count);
        for _ in 0..count {
            let path_len = u16::from_le_bytes(reader.array()?) as usize;
            let path = PathKey::from_slice(reader.take(path_len)?);
            let kind = EntryKind::from_byte(reader.array::<1>()?[0])?;
            let mode = u32::from_le_bytes(reader.array()?);
            let mtime_ms = u64::from_le_bytes(reader.array()?);
            let blob = match reader.array::<1>()?[0] {
                0 => None,
                1 => Some(Blake3Hash::from_bytes(reader.array()?)),
                other => anyhow::bail!("Invalid blob flag: {}", other),
            };
            entries.insert(path, Entry { kind, mode, mtime_ms, blob });
        }

        if !reader.is_empty() {
            anyhow::bail!("Trailing bytes after tree entries");
        }

        Ok(Self { entries })
    }

    /// Compute the hash of this tree
    ///
    /// Hash is deterministic - same tree content always produces same hash
    pub fn hash(&self) -> Blake3Hash {
        hash_bytes(&self.serialize())
    }
}

/// Convert a path into the tree's key form
pub fn path_key(path: &Path) -> PathKey {
    let s = path.to_string_lossy();
    let normalized = s.replace('\\', "/");
    PathKey::from_slice(normalized.as_bytes())
}

struct ByteReader<'a> {
    bytes: &'a [u8],
}

impl<'a> ByteReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.bytes.len() < n {
            anyhow::bail!("Tree data truncated");
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Ok(head)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Differences between two trees, for display
#[derive(Debug, Clone, Default)]
pub struct TreeDiff {
    /// Entries added in new tree
    pub added: Vec<(PathKey, Entry)>,
    /// Entries removed in new tree
    pub removed: Vec<(PathKey, Entry)>,
    /// Entries modified in new tree (old, new)
    pub modified: Vec<(PathKey, Entry, Entry)>,
}

impl TreeDiff {
    /// Compute the diff between two trees
    ///
    /// An entry counts as modified when its kind or content blob differs.
    pub fn diff(old: &Tree, new: &Tree) -> Self {
        let mut diff = TreeDiff::default();

        for (path, old_entry) in old.sorted_entries() {
            match new.get_key(path) {
                None => diff.removed.push((path.clone(), old_entry.clone())),
                Some(new_entry) => {
                    if old_entry.kind != new_entry.kind || old_entry.blob != new_entry.blob {
                        diff.modified.push((path.clone(), old_entry.clone(), new_entry.clone()));
                    }
                }
            }
        }

        for (path, new_entry) in new.sorted_entries() {
            if old.get_key(path).is_none() {
                diff.added.push((path.clone(), new_entry.clone()));
            }
        }

        diff
    }

    /// Check if there are any changes
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }
}
