//! Repository facade tying the object store to the snapshot index

use crate::clean::{
    until_cancelled, CancellationToken, CleanError, ObjectHandle, ObjectKind, SnapshotRemover,
    TreeDiffer,
};
use crate::snapshot::now_unix_ms;
use crate::{Journal, Snapshot, SnapshotId};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tl_core::store::{normalize_path, should_ignore};
use tl_core::{diff_trees, Blake3Hash, DiffStats, Entry, Store, Tree};
use walkdir::WalkDir;

/// An opened snapshot repository
#[derive(Clone)]
pub struct Repository {
    store: Arc<Store>,
    journal: Arc<Journal>,
}

impl Repository {
    /// Create a new repository at `root`
    pub fn init(root: &Path) -> Result<Self> {
        let store = Store::init(root)?;
        let journal = Journal::open(&store.tl_dir().join("journal"))?;
        Ok(Self {
            store: Arc::new(store),
            journal: Arc::new(journal),
        })
    }

    /// Open an existing repository
    pub fn open(root: &Path) -> Result<Self> {
        let store = Store::open(root)?;
        let journal = Journal::open(&store.tl_dir().join("journal"))
            .context("Failed to open snapshot journal")?;
        Ok(Self {
            store: Arc::new(store),
            journal: Arc::new(journal),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// Load the blob index; call once before diffing
    pub async fn load_index(&self, token: &CancellationToken) -> Result<usize, CleanError> {
        let store = Arc::clone(&self.store);
        let loading = async move {
            tokio::task::spawn_blocking(move || store.blob_store().load_index())
                .await
                .context("Index loader panicked")?
        };

        let count = until_cancelled(token, "load index", None, loading)
            .await?
            .map_err(CleanError::RepositoryOpen)?;
        tracing::debug!(blobs = count, "loaded blob index");
        Ok(count)
    }

    /// Every snapshot in the index, freshly read
    pub fn list_snapshots(&self) -> Result<Vec<Snapshot>> {
        self.journal.all()
    }

    /// Resolve a full id or unique id prefix
    pub fn resolve(&self, reference: &str) -> Result<Snapshot> {
        let matching: Vec<SnapshotId> = self
            .journal
            .ids()
            .into_iter()
            .filter(|id| id.to_string().starts_with(reference))
            .collect();

        match matching.as_slice() {
            [id] => self
                .journal
                .get(id)?
                .with_context(|| format!("Snapshot {} vanished from the index", id.short())),
            [] => anyhow::bail!("Unknown snapshot reference: '{}'", reference),
            many => anyhow::bail!(
                "Ambiguous snapshot prefix '{}': matches {} snapshots",
                reference,
                many.len()
            ),
        }
    }

    /// Record the working directory as a new snapshot
    pub fn create_snapshot(&self) -> Result<Snapshot> {
        let root = self.store.root();
        let mut tree = Tree::new();

        let walker = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                entry
                    .path()
                    .strip_prefix(root)
                    .map(|rel| !should_ignore(rel))
                    .unwrap_or(false)
            });

        for entry in walker {
            let entry = entry?;
            let rel = normalize_path(entry.path().strip_prefix(root)?)?;
            let metadata = entry
                .path()
                .symlink_metadata()
                .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
            let mtime_ms = metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_millis() as u64)
                .unwrap_or(0);
            let mode = file_mode(&metadata);

            let file_type = entry.file_type();
            let tree_entry = if file_type.is_symlink() {
                let target = std::fs::read_link(entry.path())?;
                let blob = self
                    .store
                    .blob_store()
                    .write_blob(target.to_string_lossy().as_bytes())?;
                Entry::symlink(mtime_ms, blob)
            } else if file_type.is_dir() {
                Entry::dir(mode, mtime_ms)
            } else {
                let data = std::fs::read(entry.path())
                    .with_context(|| format!("Failed to read {}", entry.path().display()))?;
                Entry::file(mode, mtime_ms, self.store.blob_store().write_blob(&data)?)
            };
            tree.insert(&rel, tree_entry);
        }

        let root_tree = self.store.write_tree(&tree)?;
        let parent = self.journal.latest()?.map(|s| s.id);
        let snapshot = Snapshot::new(
            parent,
            root_tree,
            now_unix_ms(),
            host_name(),
            vec![root.to_path_buf()],
        )?;
        self.journal.append(&snapshot)?;

        tracing::info!(
            snapshot = %snapshot.id.short(),
            entries = tree.len(),
            tree = %root_tree.short(),
            "created snapshot"
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl TreeDiffer for Repository {
    async fn diff(
        &self,
        _token: &CancellationToken,
        before: Blake3Hash,
        after: Blake3Hash,
    ) -> Result<DiffStats> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || diff_trees(&store, before, after))
            .await
            .context("Differ panicked")?
    }
}

#[async_trait]
impl SnapshotRemover for Repository {
    async fn remove(&self, _token: &CancellationToken, handle: &ObjectHandle) -> Result<()> {
        match handle.kind {
            ObjectKind::Snapshot => {
                let id = SnapshotId::from_hex(&handle.name)?;
                let journal = Arc::clone(&self.journal);
                let removed = tokio::task::spawn_blocking(move || journal.delete(&id))
                    .await
                    .context("Snapshot removal panicked")??;
                if !removed {
                    anyhow::bail!("Snapshot {} is not in the index", handle.name);
                }
                Ok(())
            }
        }
    }
}

#[cfg(unix)]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &std::fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}

fn host_name() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .unwrap_or_else(|_| "localhost".to_string())
}

/// Path of the repository root containing `start`, walking up to find `.tl/`
pub fn find_repo_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".tl").is_dir())
        .map(Path::to_path_buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clean::{CleanOptions, Cleaner};
    use std::fs;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    fn set_mtime(path: &Path, secs: u64) {
        let file = fs::File::options().write(true).open(path).unwrap();
        file.set_modified(std::time::UNIX_EPOCH + std::time::Duration::from_secs(secs))
            .unwrap();
    }

    fn tick() {
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    #[test]
    fn test_create_snapshot_records_working_tree() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repository::init(temp_dir.path())?;
        write(temp_dir.path(), "src/main.rs", "fn main() {}");
        write(temp_dir.path(), "README.md", "# hi");

        let snapshot = repo.create_snapshot()?;
        let tree = repo.store().read_tree(snapshot.root_tree)?;
        assert!(tree.get(Path::new("src/main.rs")).is_some());
        assert!(tree.get(Path::new("src")).is_some());
        assert!(tree.get(Path::new(".tl")).is_none());
        assert_eq!(tree.len(), 3);
        assert_eq!(repo.list_snapshots()?, vec![snapshot]);
        Ok(())
    }

    #[test]
    fn test_snapshot_parent_is_previous_latest() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repository::init(temp_dir.path())?;
        write(temp_dir.path(), "a.txt", "a");

        let first = repo.create_snapshot()?;
        let second = repo.create_snapshot()?;
        assert_eq!(second.parent, Some(first.id));
        assert_ne!(first.id, second.id);
        Ok(())
    }

    #[test]
    fn test_resolve_prefix() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repository::init(temp_dir.path())?;
        let snapshot = repo.create_snapshot()?;

        assert_eq!(repo.resolve(&snapshot.id.to_string()[..10])?, snapshot);
        assert!(repo.resolve("zz").is_err());
        // The empty prefix matches everything; with one snapshot it is unique
        assert_eq!(repo.resolve("")?.id, snapshot.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_index_counts_blobs() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repository::init(temp_dir.path())?;
        write(temp_dir.path(), "a.txt", "a");
        write(temp_dir.path(), "b.txt", "b");
        repo.create_snapshot()?;

        let token = CancellationToken::new();
        assert_eq!(repo.load_index(&token).await?, 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_index_respects_cancellation() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repository::init(temp_dir.path())?;
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            repo.load_index(&token).await,
            Err(CleanError::Cancelled { operation: "load index", .. })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_remove_unknown_snapshot_fails() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let repo = Repository::init(temp_dir.path())?;
        let token = CancellationToken::new();
        let handle = ObjectHandle {
            kind: ObjectKind::Snapshot,
            name: "ab".repeat(32),
        };
        assert!(repo.remove(&token, &handle).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_clean_on_disk_removes_metadata_only_snapshots() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        let repo = Repository::init(root)?;

        write(root, "notes.txt", "v1");
        set_mtime(&root.join("notes.txt"), 1_000);
        let baseline = repo.create_snapshot()?;
        tick();

        // Only mtime moves: different tree hash, same content
        set_mtime(&root.join("notes.txt"), 2_000);
        let touched = repo.create_snapshot()?;
        assert_ne!(touched.root_tree, baseline.root_tree);
        tick();

        write(root, "notes.txt", "v2");
        let edited = repo.create_snapshot()?;

        let token = CancellationToken::new();
        repo.load_index(&token).await?;
        let options = CleanOptions {
            order: crate::clean::SnapshotOrder::OldestFirst,
            ..CleanOptions::default()
        };
        let report = Cleaner::new(&repo, &repo, options)
            .prune(&token, repo.list_snapshots()?, &baseline.id.short())
            .await?;

        assert_eq!(report.removed, vec![touched.id]);
        assert_eq!(report.kept.len(), 1);
        assert_eq!(report.kept[0].stats.changed_files, 1);

        let remaining: Vec<_> = repo.list_snapshots()?.into_iter().map(|s| s.id).collect();
        assert_eq!(remaining, vec![baseline.id, edited.id]);

        assert!(repo.journal().get(&touched.id)?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_clean_reports_missing_tree_as_diff_failure() -> Result<()> {
        let temp_dir = tempfile::tempdir()?;
        let root = temp_dir.path();
        let repo = Repository::init(root)?;
        let baseline = repo.create_snapshot()?;
        let orphan = Snapshot::new(
            Some(baseline.id),
            tl_core::hash_bytes(b"no such tree"),
            baseline.ts_unix_ms + 1,
            "test".into(),
            vec![],
        )?;
        repo.journal().append(&orphan)?;

        let token = CancellationToken::new();
        let options = CleanOptions {
            order: crate::clean::SnapshotOrder::OldestFirst,
            ..CleanOptions::default()
        };
        let result = Cleaner::new(&repo, &repo, options)
            .prune(&token, repo.list_snapshots()?, &baseline.id.to_string())
            .await;

        assert!(matches!(result, Err(CleanError::DiffFailure { .. })));
        assert_eq!(repo.list_snapshots()?.len(), 2);
        Ok(())
    }
}
