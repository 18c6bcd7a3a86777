//! Blob storage with compression and content-addressing

use crate::hash::{hash_bytes, Blake3Hash};
use crate::store::{atomic_write, ObjectError};
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Payloads at or above this size are offered to zstd
const COMPRESSION_THRESHOLD: usize = 4 * 1024;
const ZSTD_LEVEL: i32 = 3;

/// Blob header format (version 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobHeaderV1 {
    /// Magic bytes: "SNB1"
    pub magic: [u8; 4],
    /// Flags: bit0=compressed, bit1-7=reserved
    pub flags: u8,
    /// Original size (before compression)
    pub orig_len: u64,
    /// Stored size (after compression, if compressed)
    pub stored_len: u64,
}

impl BlobHeaderV1 {
    const MAGIC: [u8; 4] = *b"SNB1";
    const FLAG_COMPRESSED: u8 = 0b0000_0001;
    /// magic(4) + flags(1) + orig_len(8) + stored_len(8)
    pub const LEN: usize = 21;

    /// Create a new blob header
    pub fn new(orig_len: u64, stored_len: u64, compressed: bool) -> Self {
        let flags = if compressed { Self::FLAG_COMPRESSED } else { 0 };
        Self {
            magic: Self::MAGIC,
            flags,
            orig_len,
            stored_len,
        }
    }

    /// Check if blob is compressed
    pub fn is_compressed(&self) -> bool {
        (self.flags & Self::FLAG_COMPRESSED) != 0
    }

    /// Serialize header to bytes
    pub fn to_bytes(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        out[..4].copy_from_slice(&self.magic);
        out[4] = self.flags;
        out[5..13].copy_from_slice(&self.orig_len.to_le_bytes());
        out[13..21].copy_from_slice(&self.stored_len.to_le_bytes());
        out
    }

    /// Deserialize header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LEN {
            anyhow::bail!("Blob header truncated: {} bytes", bytes.len());
        }
        if bytes[..4] != Self::MAGIC {
            anyhow::bail!("Invalid blob magic");
        }

        let mut orig = [0u8; 8];
        orig.copy_from_slice(&bytes[5..13]);
        let mut stored = [0u8; 8];
        stored.copy_from_slice(&bytes[13..21]);

        Ok(Self {
            magic: Self::MAGIC,
            flags: bytes[4],
            orig_len: u64::from_le_bytes(orig),
            stored_len: u64::from_le_bytes(stored),
        })
    }
}

/// A blob represents a stored file's contents
#[derive(Debug, Clone)]
pub struct Blob {
    /// Content hash (BLAKE3)
    pub hash: Blake3Hash,
    /// Original size
    pub size: u64,
    /// Whether this blob is stored compressed
    pub compressed: bool,
}

impl Blob {
    /// Create a new blob from bytes, returning metadata and the on-disk encoding
    pub fn from_bytes(data: &[u8]) -> Result<(Self, Vec<u8>)> {
        let hash = hash_bytes(data);

        let compressed_payload = if data.len() >= COMPRESSION_THRESHOLD {
            let packed = zstd::bulk::compress(data, ZSTD_LEVEL)
                .context("Failed to compress blob")?;
            // Only keep compression when it actually saves space
            (packed.len() < data.len()).then_some(packed)
        } else {
            None
        };

        let compressed = compressed_payload.is_some();
        let payload = compressed_payload.as_deref().unwrap_or(data);
        let header = BlobHeaderV1::new(data.len() as u64, payload.len() as u64, compressed);

        let mut encoded = Vec::with_capacity(BlobHeaderV1::LEN + payload.len());
        encoded.extend_from_slice(&header.to_bytes());
        encoded.extend_from_slice(payload);

        Ok((
            Self {
                hash,
                size: data.len() as u64,
                compressed,
            },
            encoded,
        ))
    }

    /// Decode an on-disk blob back into its original bytes
    pub fn decode(encoded: &[u8]) -> Result<Vec<u8>> {
        let header = BlobHeaderV1::from_bytes(encoded)?;
        let payload = &encoded[BlobHeaderV1::LEN..];
        if payload.len() as u64 != header.stored_len {
            anyhow::bail!(
                "Blob payload length mismatch: header says {}, found {}",
                header.stored_len,
                payload.len()
            );
        }

        if header.is_compressed() {
            zstd::bulk::decompress(payload, header.orig_len as usize)
                .context("Failed to decompress blob")
        } else {
            Ok(payload.to_vec())
        }
    }
}

/// Blob storage with an in-memory index of known blobs
pub struct BlobStore {
    /// Root directory for blob storage (objects/blobs)
    root: PathBuf,
    /// Scratch directory for atomic writes
    tmp_dir: PathBuf,
    /// Known blobs: hash -> original size
    index: DashMap<Blake3Hash, u64>,
}

impl BlobStore {
    /// Create a new blob store
    pub fn new(root: PathBuf, tmp_dir: PathBuf) -> Self {
        Self {
            root,
            tmp_dir,
            index: DashMap::new(),
        }
    }

    /// Write a blob to storage, returning its hash
    ///
    /// Writing content that is already stored is a no-op.
    pub fn write_blob(&self, data: &[u8]) -> Result<Blake3Hash> {
        let (blob, encoded) = Blob::from_bytes(data)?;
        let path = self.blob_path(blob.hash);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            atomic_write(&self.tmp_dir, &path, &encoded)?;
            tracing::trace!(hash = %blob.hash.short(), size = blob.size, compressed = blob.compressed, "wrote blob");
        }

        self.index.insert(blob.hash, blob.size);
        Ok(blob.hash)
    }

    /// Read a blob from storage
    pub fn read_blob(&self, hash: Blake3Hash) -> Result<Vec<u8>> {
        let path = self.blob_path(hash);
        let encoded = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectError::NotFound { kind: "blob", hash }.into());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        let data = Blob::decode(&encoded).map_err(|e| ObjectError::Corrupt {
            kind: "blob",
            hash,
            reason: e.to_string(),
        })?;

        if hash_bytes(&data) != hash {
            return Err(ObjectError::Corrupt {
                kind: "blob",
                hash,
                reason: "content hash mismatch".to_string(),
            }
            .into());
        }

        self.index.insert(hash, data.len() as u64);
        Ok(data)
    }

    /// Check if a blob exists
    pub fn has_blob(&self, hash: Blake3Hash) -> bool {
        self.index.contains_key(&hash) || self.blob_path(hash).exists()
    }

    /// Original size of a blob, if it is in the loaded index
    pub fn blob_size(&self, hash: Blake3Hash) -> Option<u64> {
        self.index.get(&hash).map(|size| *size)
    }

    /// Scan objects/blobs and populate the in-memory index
    ///
    /// Only headers are read. Returns the number of indexed blobs.
    pub fn load_index(&self) -> Result<usize> {
        use std::io::Read;

        if !self.root.exists() {
            return Ok(0);
        }

        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(hash) = hash_from_object_path(entry.path()) else {
                tracing::warn!(path = %entry.path().display(), "skipping stray file in blob store");
                continue;
            };

            let mut header = [0u8; BlobHeaderV1::LEN];
            std::fs::File::open(entry.path())?
                .read_exact(&mut header)
                .with_context(|| format!("Failed to read blob header {}", entry.path().display()))?;
            let header = BlobHeaderV1::from_bytes(&header)?;
            self.index.insert(hash, header.orig_len);
        }

        Ok(self.index.len())
    }

    /// Number of blobs currently indexed
    pub fn indexed(&self) -> usize {
        self.index.len()
    }

    /// Get the filesystem path for a blob: blobs/<hh>/<rest>
    fn blob_path(&self, hash: Blake3Hash) -> PathBuf {
        object_path(&self.root, hash)
    }
}

/// Fan-out path for an object: `<root>/<first two hex chars>/<remaining hex>`
pub(crate) fn object_path(root: &Path, hash: Blake3Hash) -> PathBuf {
    let hex = hash.to_hex();
    root.join(&hex[..2]).join(&hex[2..])
}

fn hash_from_object_path(path: &Path) -> Option<Blake3Hash> {
    let rest = path.file_name()?.to_str()?;
    let prefix = path.parent()?.file_name()?.to_str()?;
    Blake3Hash::from_hex(&format!("{}{}", prefix, rest)).ok()
}
