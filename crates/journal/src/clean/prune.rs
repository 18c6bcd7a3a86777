//! The pruning driver

use super::{
    classify, select_baseline, until_cancelled, BaselineMode, CancellationToken, Classification,
    CleanError, CleanOptions, ObjectHandle, SnapshotRemover, TreeDiffer,
};
use crate::{Snapshot, SnapshotId};
use tl_core::DiffStats;

/// A snapshot that was kept because it differs from its comparison point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeptSnapshot {
    pub id: SnapshotId,
    pub compared_with: SnapshotId,
    /// Normalized statistics (block sets cleared)
    pub stats: DiffStats,
}

/// Outcome of a completed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleanReport {
    pub baseline: SnapshotId,
    pub removed: Vec<SnapshotId>,
    /// Equivalent snapshots left in place by a dry run
    pub would_remove: Vec<SnapshotId>,
    pub kept: Vec<KeptSnapshot>,
}

impl CleanReport {
    fn new(baseline: SnapshotId) -> Self {
        Self {
            baseline,
            removed: Vec::new(),
            would_remove: Vec::new(),
            kept: Vec::new(),
        }
    }

    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }

    /// Number of candidates that were classified
    pub fn processed(&self) -> usize {
        self.removed.len() + self.would_remove.len() + self.kept.len()
    }
}

/// Progress notification, delivered as each candidate is decided
#[derive(Debug, Clone, Copy)]
pub enum CleanEvent<'a> {
    Baseline(&'a Snapshot),
    Removed(&'a Snapshot),
    WouldRemove(&'a Snapshot),
    Kept(&'a Snapshot, &'a DiffStats),
}

type Observer<'a> = Box<dyn Fn(CleanEvent<'_>) + Send + Sync + 'a>;

/// Removes snapshots that are equivalent to a selected baseline
pub struct Cleaner<'a> {
    differ: &'a dyn TreeDiffer,
    remover: &'a dyn SnapshotRemover,
    options: CleanOptions,
    observer: Option<Observer<'a>>,
}

impl<'a> Cleaner<'a> {
    pub fn new(
        differ: &'a dyn TreeDiffer,
        remover: &'a dyn SnapshotRemover,
        options: CleanOptions,
    ) -> Self {
        Self {
            differ,
            remover,
            options,
            observer: None,
        }
    }

    /// Register a callback for per-snapshot progress
    pub fn with_observer(mut self, observer: impl Fn(CleanEvent<'_>) + Send + Sync + 'a) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    fn notify(&self, event: CleanEvent<'_>) {
        if let Some(observer) = &self.observer {
            observer(event);
        }
    }

    /// Remove every snapshot after the baseline that is equivalent to it
    ///
    /// `snapshots` is arranged with the configured order first; "after" means
    /// later in that arrangement. Under [`BaselineMode::Fixed`] every candidate is
    /// compared with the selected baseline, whatever earlier candidates produced.
    ///
    /// Deletion is at-least-once with no rollback: the first failure ends the run
    /// and snapshots already removed stay removed. Since removed snapshots are
    /// gone from later listings, re-running with the same selector is safe.
    pub async fn prune(
        &self,
        token: &CancellationToken,
        snapshots: Vec<Snapshot>,
        selector: &str,
    ) -> Result<CleanReport, CleanError> {
        let snapshots = self.options.order.arrange(snapshots);
        let (position, baseline) = select_baseline(&snapshots, selector)?;
        let candidates = &snapshots[position + 1..];

        if token.is_cancelled() {
            return Err(CleanError::Cancelled {
                operation: "clean",
                snapshot: None,
            });
        }

        tracing::info!(
            baseline = %baseline.id.short(),
            candidates = candidates.len(),
            mode = ?self.options.baseline,
            dry_run = self.options.dry_run,
            "starting clean"
        );
        self.notify(CleanEvent::Baseline(baseline));

        let mut report = CleanReport::new(baseline.id);
        let mut reference = baseline;

        for candidate in candidates {
            if token.is_cancelled() {
                return Err(CleanError::Cancelled {
                    operation: "clean",
                    snapshot: Some(candidate.id.to_string()),
                });
            }

            let classification = classify(
                self.differ,
                token,
                reference.root_tree,
                candidate.root_tree,
                &candidate.id,
            )
            .await?;

            match classification {
                Classification::Equivalent if self.options.dry_run => {
                    tracing::info!(snapshot = %candidate.id.short(), "would remove snapshot");
                    report.would_remove.push(candidate.id);
                    self.notify(CleanEvent::WouldRemove(candidate));
                }
                Classification::Equivalent => {
                    self.remove(token, candidate).await?;
                    tracing::info!(snapshot = %candidate.id.short(), "removed snapshot");
                    report.removed.push(candidate.id);
                    self.notify(CleanEvent::Removed(candidate));
                }
                Classification::Changed(stats) => {
                    tracing::debug!(
                        snapshot = %candidate.id.short(),
                        against = %reference.id.short(),
                        ?stats,
                        "got differences"
                    );
                    self.notify(CleanEvent::Kept(candidate, &stats));
                    report.kept.push(KeptSnapshot {
                        id: candidate.id,
                        compared_with: reference.id,
                        stats,
                    });
                    if self.options.baseline == BaselineMode::Rolling {
                        reference = candidate;
                    }
                }
            }
        }

        tracing::info!(removed = report.removed_count(), kept = report.kept.len(), "clean finished");
        Ok(report)
    }

    async fn remove(&self, token: &CancellationToken, snapshot: &Snapshot) -> Result<(), CleanError> {
        let handle = ObjectHandle::snapshot(&snapshot.id);
        until_cancelled(token, "remove", Some(&snapshot.id), self.remover.remove(token, &handle))
            .await?
            .map_err(|source| CleanError::RemovalFailure {
                snapshot: snapshot.id.to_string(),
                source,
            })
    }
}
