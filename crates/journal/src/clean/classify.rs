//! Equivalence classification of diff statistics

use super::{until_cancelled, CancellationToken, CleanError, TreeDiffer};
use crate::SnapshotId;
use tl_core::{Blake3Hash, BlobSet, DiffStats};

/// Outcome of comparing a candidate with the baseline
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// No meaningful change
    Equivalent,
    /// Real change; carries the normalized statistics
    Changed(DiffStats),
}

impl Classification {
    pub fn from_stats(stats: &DiffStats) -> Self {
        let normalized = normalized(stats);
        if normalized == DiffStats::default() {
            Classification::Equivalent
        } else {
            Classification::Changed(normalized)
        }
    }

    pub fn is_equivalent(&self) -> bool {
        matches!(self, Classification::Equivalent)
    }
}

/// Copy of `stats` with both block sets emptied
///
/// Block sets record which storage blocks each side references. Logically identical
/// trees can reference different blocks, so they take no part in equivalence.
pub fn normalized(stats: &DiffStats) -> DiffStats {
    DiffStats {
        changed_files: stats.changed_files,
        added: stats.added.clone(),
        removed: stats.removed.clone(),
        blobs_before: BlobSet::new(),
        blobs_after: BlobSet::new(),
    }
}

/// True when the diff carries no change beyond block bookkeeping
pub fn is_no_op_change(stats: &DiffStats) -> bool {
    normalized(stats) == DiffStats::default()
}

/// Diff `before` against `after` and classify the result
///
/// `snapshot` is the candidate, named in errors.
pub async fn classify(
    differ: &dyn TreeDiffer,
    token: &CancellationToken,
    before: Blake3Hash,
    after: Blake3Hash,
    snapshot: &SnapshotId,
) -> Result<Classification, CleanError> {
    let stats = until_cancelled(token, "diff", Some(snapshot), differ.diff(token, before, after))
        .await?
        .map_err(|source| CleanError::DiffFailure {
            snapshot: snapshot.to_string(),
            source,
        })?;

    Ok(Classification::from_stats(&stats))
}
