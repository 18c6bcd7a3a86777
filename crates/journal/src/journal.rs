//! Snapshot index using sled

use crate::{Snapshot, SnapshotId};
use anyhow::{Context, Result};
use parking_lot::RwLock;
use sled::Db;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Append-mostly index of snapshot records
pub struct Journal {
    /// Sled database
    db: Db,
    /// In-memory index: snapshot_id -> sequence_number
    index: RwLock<BTreeMap<SnapshotId, u64>>,
    /// Monotonic sequence counter
    seq_counter: AtomicU64,
}

impl Journal {
    /// Open or create a journal at the given path
    pub fn open(path: &Path) -> Result<Self> {
        let db = sled::open(path.join("snapshots.db"))
            .with_context(|| format!("Failed to open snapshot index in {}", path.display()))?;

        // Build in-memory index on startup
        let mut index = BTreeMap::new();
        let mut max_seq = 0u64;

        for item in db.iter() {
            let (key, value) = item?;
            let seq = decode_seq(&key)?;
            let snapshot = Snapshot::deserialize(&value)
                .with_context(|| format!("Corrupt snapshot record at sequence {}", seq))?;
            index.insert(snapshot.id, seq);
            max_seq = max_seq.max(seq);
        }

        Ok(Self {
            db,
            index: RwLock::new(index),
            seq_counter: AtomicU64::new(max_seq + 1),
        })
    }

    /// Append a snapshot to the journal
    ///
    /// Appending a snapshot that is already present returns its existing sequence number.
    pub fn append(&self, snapshot: &Snapshot) -> Result<u64> {
        if let Some(&seq) = self.index.read().get(&snapshot.id) {
            return Ok(seq);
        }

        let seq = self.seq_counter.fetch_add(1, Ordering::SeqCst);
        let value = snapshot.serialize()?;

        self.db.insert(seq.to_be_bytes(), value)?;
        self.db.flush()?;

        self.index.write().insert(snapshot.id, seq);
        Ok(seq)
    }

    /// Get a snapshot by ID
    pub fn get(&self, id: &SnapshotId) -> Result<Option<Snapshot>> {
        let seq = match self.index.read().get(id) {
            Some(&seq) => seq,
            None => return Ok(None),
        };

        match self.db.get(seq.to_be_bytes())? {
            Some(value) => Ok(Some(Snapshot::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All snapshots, in append order
    ///
    /// Reads the database afresh on every call.
    pub fn all(&self) -> Result<Vec<Snapshot>> {
        self.db
            .iter()
            .values()
            .map(|value| Snapshot::deserialize(&value?))
            .collect()
    }

    /// Get the most recently appended snapshot
    pub fn latest(&self) -> Result<Option<Snapshot>> {
        match self.db.last()? {
            Some((_, value)) => Ok(Some(Snapshot::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// All snapshot IDs
    pub fn ids(&self) -> Vec<SnapshotId> {
        self.index.read().keys().copied().collect()
    }

    /// Delete a snapshot record
    ///
    /// Returns `false` if it was already gone. The record is durable-deleted before
    /// the in-memory index forgets it.
    pub fn delete(&self, id: &SnapshotId) -> Result<bool> {
        let mut index = self.index.write();
        let Some(&seq) = index.get(id) else {
            return Ok(false);
        };

        self.db.remove(seq.to_be_bytes())?;
        self.db.flush()?;
        index.remove(id);
        Ok(true)
    }

    /// Get the total number of snapshots
    pub fn count(&self) -> usize {
        self.index.read().len()
    }
}

// Big-endian keys keep sled's iteration order equal to append order
fn decode_seq(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| anyhow::anyhow!("Invalid journal key length: {}", key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}
