//! Baseline selection by identifier substring

use super::CleanError;
use crate::Snapshot;

/// Find the first snapshot whose identifier contains `selector`
///
/// Scans in the given order and stops at the first hit; an ambiguous selector
/// simply resolves to whichever match comes first.
pub fn select_baseline<'a>(
    snapshots: &'a [Snapshot],
    selector: &str,
) -> Result<(usize, &'a Snapshot), CleanError> {
    if selector.is_empty() {
        return Err(CleanError::InvalidInvocation(
            "set snapshot id to start clean".to_string(),
        ));
    }

    snapshots
        .iter()
        .enumerate()
        .find(|(_, snapshot)| snapshot.id.to_string().contains(selector))
        .ok_or_else(|| CleanError::BaselineNotFound {
            selector: selector.to_string(),
        })
}
