//! Equivalence pruning of snapshots against a fixed baseline
//!
//! A run selects a baseline snapshot by identifier match and compares each later
//! snapshot to it. Snapshots whose diff carries no meaningful change are removed.
//! The repository is reached only through [`TreeDiffer`] and [`SnapshotRemover`],
//! and every call is raced against one [`CancellationToken`].

mod baseline;
mod classify;
mod prune;

pub use baseline::select_baseline;
pub use classify::{classify, is_no_op_change, normalized, Classification};
pub use prune::{CleanEvent, CleanReport, Cleaner, KeptSnapshot};

use crate::{Snapshot, SnapshotId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::future::Future;
use std::str::FromStr;
use tl_core::{Blake3Hash, DiffStats};
pub use tokio_util::sync::CancellationToken;

/// Errors that end a clean run
#[derive(Debug, thiserror::Error)]
pub enum CleanError {
    #[error("invalid invocation: {0}")]
    InvalidInvocation(String),

    #[error("failed to open repository")]
    RepositoryOpen(#[source] anyhow::Error),

    #[error("did not find snapshot to start clean [start:<{selector}>]")]
    BaselineNotFound { selector: String },

    #[error("diff of snapshot {snapshot} against baseline failed")]
    DiffFailure {
        snapshot: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to remove snapshot {snapshot}")]
    RemovalFailure {
        snapshot: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("{operation} cancelled{}", at_snapshot(.snapshot))]
    Cancelled {
        operation: &'static str,
        snapshot: Option<String>,
    },
}

fn at_snapshot(snapshot: &Option<String>) -> String {
    snapshot
        .as_ref()
        .map(|s| format!(" at snapshot {}", s))
        .unwrap_or_default()
}

/// Kind of object a removal handle names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// Snapshot metadata record
    Snapshot,
}

/// Name of one stored object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub kind: ObjectKind,
    pub name: String,
}

impl ObjectHandle {
    pub fn snapshot(id: &SnapshotId) -> Self {
        Self {
            kind: ObjectKind::Snapshot,
            name: id.to_string(),
        }
    }
}

/// Produces structural diff statistics between two trees
#[async_trait]
pub trait TreeDiffer: Send + Sync {
    async fn diff(
        &self,
        token: &CancellationToken,
        before: Blake3Hash,
        after: Blake3Hash,
    ) -> anyhow::Result<DiffStats>;
}

/// Durably deletes stored objects
#[async_trait]
pub trait SnapshotRemover: Send + Sync {
    async fn remove(&self, token: &CancellationToken, handle: &ObjectHandle) -> anyhow::Result<()>;
}

/// How the comparison point moves during a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BaselineMode {
    /// Every candidate is compared with the selected baseline
    #[default]
    Fixed,
    /// The comparison point advances to each changed snapshot
    Rolling,
}

impl FromStr for BaselineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fixed" => Ok(Self::Fixed),
            "rolling" => Ok(Self::Rolling),
            other => Err(format!("unknown baseline mode '{}' (expected fixed or rolling)", other)),
        }
    }
}

/// Chronological order a run walks snapshots in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotOrder {
    #[default]
    NewestFirst,
    OldestFirst,
}

impl SnapshotOrder {
    /// Compare by timestamp, ties broken by identifier
    pub fn compare(&self, a: &Snapshot, b: &Snapshot) -> Ordering {
        let ascending = a
            .ts_unix_ms
            .cmp(&b.ts_unix_ms)
            .then_with(|| a.id.cmp(&b.id));
        match self {
            SnapshotOrder::OldestFirst => ascending,
            SnapshotOrder::NewestFirst => ascending.reverse(),
        }
    }

    /// Sort snapshots and drop repeated identifiers
    pub fn arrange(&self, mut snapshots: Vec<Snapshot>) -> Vec<Snapshot> {
        snapshots.sort_by(|a, b| self.compare(a, b));
        let before = snapshots.len();
        snapshots.dedup_by(|a, b| a.id == b.id);
        if snapshots.len() != before {
            tracing::warn!(dropped = before - snapshots.len(), "ignoring duplicate snapshot records");
        }
        snapshots
    }
}

impl FromStr for SnapshotOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest-first" => Ok(Self::NewestFirst),
            "oldest-first" => Ok(Self::OldestFirst),
            other => Err(format!(
                "unknown snapshot order '{}' (expected newest-first or oldest-first)",
                other
            )),
        }
    }
}

/// Knobs for one clean run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanOptions {
    pub baseline: BaselineMode,
    pub order: SnapshotOrder,
    /// Classify only; never call the remover
    pub dry_run: bool,
}

/// Run `fut` unless `token` fires first
///
/// An already-cancelled token wins without polling `fut`.
pub(crate) async fn until_cancelled<T, F>(
    token: &CancellationToken,
    operation: &'static str,
    snapshot: Option<&SnapshotId>,
    fut: F,
) -> Result<anyhow::Result<T>, CleanError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(CleanError::Cancelled {
            operation,
            snapshot: snapshot.map(|id| id.to_string()),
        }),
        result = fut => Ok(result),
    }
}
