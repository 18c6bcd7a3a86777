//! Snapshot data structures

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tl_core::{hash_bytes, Blake3Hash};

/// Content-derived snapshot identifier (BLAKE3 of the snapshot body)
#[derive(Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SnapshotId(Blake3Hash);

impl SnapshotId {
    pub const fn from_hash(hash: Blake3Hash) -> Self {
        Self(hash)
    }

    /// Parse a full 64-character hex identifier
    pub fn from_hex(hex: &str) -> Result<Self> {
        Ok(Self(Blake3Hash::from_hex(hex)?))
    }

    /// First 8 hex characters
    pub fn short(&self) -> String {
        self.0.short()
    }
}

impl std::fmt::Debug for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SnapshotId({})", self.0.to_hex())
    }
}

impl std::fmt::Display for SnapshotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_hex())
    }
}

/// A snapshot records the repository tree at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: SnapshotId,
    /// Snapshot that was latest when this one was taken
    pub parent: Option<SnapshotId>,
    /// Root tree hash for this snapshot
    pub root_tree: Blake3Hash,
    /// Timestamp (Unix milliseconds)
    pub ts_unix_ms: u64,
    pub host: String,
    /// Paths that were recorded
    pub paths: Vec<PathBuf>,
}

/// Everything except the id; the id is the hash of this encoding
#[derive(Serialize)]
struct SnapshotBody<'a> {
    parent: &'a Option<SnapshotId>,
    root_tree: &'a Blake3Hash,
    ts_unix_ms: u64,
    host: &'a str,
    paths: &'a [PathBuf],
}

impl Snapshot {
    /// Create a new snapshot and derive its id from its contents
    pub fn new(
        parent: Option<SnapshotId>,
        root_tree: Blake3Hash,
        ts_unix_ms: u64,
        host: String,
        paths: Vec<PathBuf>,
    ) -> Result<Self> {
        let mut snapshot = Self {
            id: SnapshotId::from_hash(Blake3Hash::from_bytes([0; 32])),
            parent,
            root_tree,
            ts_unix_ms,
            host,
            paths,
        };
        snapshot.id = snapshot.derive_id()?;
        Ok(snapshot)
    }

    fn derive_id(&self) -> Result<SnapshotId> {
        let body = SnapshotBody {
            parent: &self.parent,
            root_tree: &self.root_tree,
            ts_unix_ms: self.ts_unix_ms,
            host: &self.host,
            paths: &self.paths,
        };
        let bytes = bincode::serialize(&body).context("Failed to encode snapshot body")?;
        Ok(SnapshotId::from_hash(hash_bytes(&bytes)))
    }

    /// Serialize for storage in the journal
    pub fn serialize(&self) -> Result<Vec<u8>> {
        bincode::serialize(self).context("Failed to serialize snapshot")
    }

    /// Deserialize a journal record, checking that the id matches the body
    pub fn deserialize(bytes: &[u8]) -> Result<Self> {
        let snapshot: Self = bincode::deserialize(bytes).context("Failed to deserialize snapshot")?;
        let expected = snapshot.derive_id()?;
        if expected != snapshot.id {
            anyhow::bail!(
                "Snapshot record {} does not match its content (expected {})",
                snapshot.id.short(),
                expected.short()
            );
        }
        Ok(snapshot)
    }
}

/// Current wall-clock time in Unix milliseconds
pub fn now_unix_ms() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};

    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
