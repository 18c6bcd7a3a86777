//! Remove snapshots that are equivalent to a baseline

use crate::repo_config::RepoConfig;
use crate::util;
use anyhow::Result;
use journal::clean::{
    BaselineMode, CancellationToken, CleanError, CleanEvent, CleanOptions, CleanReport, Cleaner,
    SnapshotOrder,
};
use journal::Repository;
use owo_colors::OwoColorize;
use std::path::Path;

pub struct CleanArgs {
    pub selector: String,
    pub dry_run: bool,
    pub rolling: bool,
    pub order: Option<SnapshotOrder>,
}

/// Flags take precedence over `[clean]` config values
pub fn resolve_options(config: &RepoConfig, args: &CleanArgs) -> CleanOptions {
    CleanOptions {
        baseline: if args.rolling {
            BaselineMode::Rolling
        } else {
            config.clean.baseline
        },
        order: args.order.unwrap_or(config.clean.order),
        dry_run: args.dry_run,
    }
}

pub async fn run(repo_root: &Path, config: &RepoConfig, args: CleanArgs) -> Result<()> {
    let options = resolve_options(config, &args);
    let token = CancellationToken::new();

    let interrupt = tokio::spawn({
        let token = token.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupt received, stopping clean");
                token.cancel();
            }
        }
    });

    let result = clean(repo_root, options, &token, &args.selector).await;
    interrupt.abort();
    let report = result?;

    println!();
    if options.dry_run {
        println!(
            "{} {} of {} snapshots would be removed",
            "Dry run:".bold(),
            report.would_remove.len(),
            report.processed()
        );
    } else {
        println!(
            "{} removed {} of {} snapshots, kept {}",
            "✓".green(),
            report.removed_count(),
            report.processed(),
            report.kept.len()
        );
    }
    Ok(())
}

async fn clean(
    repo_root: &Path,
    options: CleanOptions,
    token: &CancellationToken,
    selector: &str,
) -> Result<CleanReport, CleanError> {
    let repo = Repository::open(repo_root).map_err(CleanError::RepositoryOpen)?;
    repo.load_index(token).await?;
    let snapshots = repo.list_snapshots().map_err(CleanError::RepositoryOpen)?;

    let cleaner = Cleaner::new(&repo, &repo, options).with_observer(print_event);
    let report = cleaner.prune(token, snapshots, selector).await?;
    Ok(report)
}

fn print_event(event: CleanEvent<'_>) {
    match event {
        CleanEvent::Baseline(snapshot) => println!(
            "Baseline {} {}",
            snapshot.id.short().yellow(),
            util::format_absolute_time(snapshot.ts_unix_ms).dimmed()
        ),
        CleanEvent::Removed(snapshot) => println!("removed snapshot {}", snapshot.id.short()),
        CleanEvent::WouldRemove(snapshot) => {
            println!("would remove snapshot {}", snapshot.id.short())
        }
        CleanEvent::Kept(snapshot, stats) => println!(
            "{}",
            format!(
                "kept snapshot {} ({} changed, {} added, {} removed)",
                snapshot.id.short(),
                stats.changed_files,
                stats.added.files + stats.added.dirs + stats.added.others,
                stats.removed.files + stats.removed.dirs + stats.removed.others
            )
            .dimmed()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(rolling: bool, order: Option<SnapshotOrder>) -> CleanArgs {
        CleanArgs {
            selector: "ab".into(),
            dry_run: false,
            rolling,
            order,
        }
    }

    #[test]
    fn test_config_supplies_defaults() {
        let mut config = RepoConfig::default();
        config.clean.baseline = BaselineMode::Rolling;
        config.clean.order = SnapshotOrder::OldestFirst;

        let options = resolve_options(&config, &args(false, None));
        assert_eq!(options.baseline, BaselineMode::Rolling);
        assert_eq!(options.order, SnapshotOrder::OldestFirst);
    }

    #[test]
    fn test_flags_override_config() {
        let config = RepoConfig::default();
        let options = resolve_options(&config, &args(true, Some(SnapshotOrder::OldestFirst)));
        assert_eq!(options.baseline, BaselineMode::Rolling);
        assert_eq!(options.order, SnapshotOrder::OldestFirst);
        assert!(!options.dry_run);
    }
}
