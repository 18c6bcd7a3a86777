//! Show snapshot timeline

use crate::util;
use anyhow::{Context, Result};
use journal::clean::SnapshotOrder;
use journal::Repository;
use owo_colors::OwoColorize;
use std::path::PathBuf;

const DEFAULT_LIMIT: usize = 20;

pub async fn run(repo_root: PathBuf, limit: Option<usize>) -> Result<()> {
    let repo = Repository::open(&repo_root).context("Failed to open repository")?;
    let snapshots = SnapshotOrder::NewestFirst.arrange(repo.list_snapshots()?);

    if snapshots.is_empty() {
        println!("{}", "No snapshots yet".dimmed());
        return Ok(());
    }

    let total = snapshots.len();
    let limit = limit.unwrap_or(DEFAULT_LIMIT);

    println!("{}", "Snapshot Timeline".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    for snapshot in snapshots.iter().take(limit) {
        println!(
            "{} {} {} tree {} {}",
            snapshot.id.short().yellow(),
            util::format_absolute_time(snapshot.ts_unix_ms),
            format!("({})", util::format_relative_time(snapshot.ts_unix_ms)).dimmed(),
            snapshot.root_tree.short().cyan(),
            snapshot.host.dimmed()
        );
    }

    if total > limit {
        println!();
        println!("{}", format!("... {} more (use --limit)", total - limit).dimmed());
    }
    Ok(())
}
