//! On-disk store management for blobs and trees

use crate::blob::{object_path, BlobStore};
use crate::hash::{hash_bytes, Blake3Hash};
use crate::tree::Tree;
use anyhow::{Context, Result};
use dashmap::DashMap;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Contents of a freshly initialized `.tl/config.toml`
pub const DEFAULT_CONFIG_TOML: &str = r#"[clean]
baseline = "fixed"
order = "newest-first"

[log]
level = "warn"
"#;

/// Failures tied to a specific stored object
#[derive(Debug, thiserror::Error)]
pub enum ObjectError {
    #[error("{kind} {hash} not found")]
    NotFound { kind: &'static str, hash: Blake3Hash },
    #[error("{kind} {hash} is corrupt: {reason}")]
    Corrupt {
        kind: &'static str,
        hash: Blake3Hash,
        reason: String,
    },
}

/// Main store for snapshot data
///
/// Manages the `.tl/` directory structure:
/// ```text
/// .tl/
///   config.toml
///   journal/
///     snapshots.db
///   objects/
///     blobs/
///     trees/
///   tmp/
/// ```
pub struct Store {
    /// Root of repository
    root: PathBuf,
    /// Path to .tl directory
    tl_dir: PathBuf,
    /// Blob storage
    blob_store: BlobStore,
    /// Tree cache (hash -> tree)
    tree_cache: DashMap<Blake3Hash, Arc<Tree>>,
}

impl Store {
    /// Initialize a new store at the given repository root
    pub fn init(repo_root: &Path) -> Result<Self> {
        let tl_dir = repo_root.join(".tl");
        if tl_dir.exists() {
            anyhow::bail!("Repository already initialized at {}", tl_dir.display());
        }

        for sub in ["objects/blobs", "objects/trees", "journal", "tmp"] {
            std::fs::create_dir_all(tl_dir.join(sub))
                .with_context(|| format!("Failed to create .tl/{}", sub))?;
        }

        atomic_write(
            &tl_dir.join("tmp"),
            &tl_dir.join("config.toml"),
            DEFAULT_CONFIG_TOML.as_bytes(),
        )?;

        tracing::debug!(root = %repo_root.display(), "initialized store");
        Self::open(repo_root)
    }

    /// Open an existing store
    pub fn open(repo_root: &Path) -> Result<Self> {
        let tl_dir = repo_root.join(".tl");
        if !tl_dir.is_dir() {
            anyhow::bail!("Not a Timelapse repository (no .tl directory at {})", repo_root.display());
        }

        let objects = tl_dir.join("objects");
        if !objects.join("trees").is_dir() || !objects.join("blobs").is_dir() {
            anyhow::bail!("Repository at {} is missing its object directories", repo_root.display());
        }

        let tmp_dir = tl_dir.join("tmp");
        std::fs::create_dir_all(&tmp_dir)?;

        Ok(Self {
            root: repo_root.to_path_buf(),
            blob_store: BlobStore::new(objects.join("blobs"), tmp_dir),
            tl_dir,
            tree_cache: DashMap::new(),
        })
    }

    /// Write a tree to storage
    pub fn write_tree(&self, tree: &Tree) -> Result<Blake3Hash> {
        let bytes = tree.serialize();
        let hash = hash_bytes(&bytes);
        let path = self.tree_path(hash);

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            atomic_write(&self.tl_dir.join("tmp"), &path, &bytes)?;
        }

        self.tree_cache.insert(hash, Arc::new(tree.clone()));
        Ok(hash)
    }

    /// Read a tree from storage
    pub fn read_tree(&self, hash: Blake3Hash) -> Result<Arc<Tree>> {
        if let Some(tree) = self.tree_cache.get(&hash) {
            return Ok(Arc::clone(&tree));
        }

        let path = self.tree_path(hash);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ObjectError::NotFound { kind: "tree", hash }.into());
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
        };

        if hash_bytes(&bytes) != hash {
            return Err(ObjectError::Corrupt {
                kind: "tree",
                hash,
                reason: "content hash mismatch".to_string(),
            }
            .into());
        }

        let tree = Tree::deserialize(&bytes).map_err(|e| ObjectError::Corrupt {
            kind: "tree",
            hash,
            reason: e.to_string(),
        })?;

        let tree = Arc::new(tree);
        self.tree_cache.insert(hash, Arc::clone(&tree));
        Ok(tree)
    }

    /// Get the tree path for a given hash: objects/trees/<hh>/<rest>
    fn tree_path(&self, hash: Blake3Hash) -> PathBuf {
        object_path(&self.tl_dir.join("objects/trees"), hash)
    }

    /// Get the blob store
    pub fn blob_store(&self) -> &BlobStore {
        &self.blob_store
    }

    /// Get the .tl directory path
    pub fn tl_dir(&self) -> &Path {
        &self.tl_dir
    }

    /// Get the repository root path
    pub fn root(&self) -> &Path {
        &self.root
    }
}

static TMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Atomic write helper
///
/// Writes data to a temporary file, fsyncs it, then renames it to the target path.
pub fn atomic_write(tmp_dir: &Path, target: &Path, data: &[u8]) -> Result<()> {
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let tmp_path = tmp_dir.join(format!("write-{}-{}.tmp", std::process::id(), seq));

    let result = (|| -> Result<()> {
        let mut file = std::fs::File::create(&tmp_path)
            .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
        file.write_all(data)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, target)
            .with_context(|| format!("Failed to move object into {}", target.display()))?;
        Ok(())
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp_path);
        return result;
    }

    #[cfg(unix)]
    if let Some(parent) = target.parent() {
        std::fs::File::open(parent)?.sync_all()?;
    }

    Ok(())
}

/// Normalize a path for storage
///
/// - Converts to relative path with `/` separator
/// - Rejects `..` and absolute paths
/// - Removes `./` prefix
pub fn normalize_path(path: &Path) -> Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir => anyhow::bail!("Path escapes repository: {}", path.display()),
            Component::RootDir | Component::Prefix(_) => {
                anyhow::bail!("Absolute path not allowed: {}", path.display())
            }
        }
    }
    if out.as_os_str().is_empty() {
        anyhow::bail!("Empty path");
    }
    Ok(out)
}

/// Check if a path should be ignored
///
/// Always ignores:
/// - `.tl/`
/// - `.git/`
pub fn should_ignore(path: &Path) -> bool {
    path.starts_with(".tl") || path.starts_with(".git")
}
