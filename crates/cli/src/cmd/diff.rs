//! Show diff statistics between snapshots

use crate::util;
use anyhow::{Context, Result};
use journal::Repository;
use owo_colors::OwoColorize;
use std::path::PathBuf;
use tl_core::{diff_trees, finalize_blob_counts, DiffStat, DiffStats, TreeDiff};

pub async fn run(repo_root: PathBuf, snapshot_a: &str, snapshot_b: &str) -> Result<()> {
    let a = snapshot_a.to_string();
    let b = snapshot_b.to_string();

    let (snap_a, snap_b, stats, paths) = tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&repo_root).context("Failed to open repository")?;
        let snap_a = repo.resolve(&a)?;
        let snap_b = repo.resolve(&b)?;

        repo.store().blob_store().load_index()?;
        let mut stats = diff_trees(repo.store(), snap_a.root_tree, snap_b.root_tree)?;
        finalize_blob_counts(&mut stats, repo.store().blob_store());

        let tree_a = repo.store().read_tree(snap_a.root_tree)?;
        let tree_b = repo.store().read_tree(snap_b.root_tree)?;
        let paths = TreeDiff::diff(&tree_a, &tree_b);
        anyhow::Ok((snap_a, snap_b, stats, paths))
    })
    .await
    .context("Diff task panicked")??;

    println!("{}", "Diff Summary".bold());
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();
    println!("From: {} {}", snap_a.id.short().yellow(), util::format_relative_time(snap_a.ts_unix_ms).dimmed());
    println!("To:   {} {}", snap_b.id.short().yellow(), util::format_relative_time(snap_b.ts_unix_ms).dimmed());
    println!();

    if !paths.added.is_empty() {
        println!("{} Added ({} entries)", "A".green().bold(), paths.added.len());
        for (path, _entry) in &paths.added {
            println!("  {} {}", "+".green(), util::display_path(path));
        }
        println!();
    }

    if !paths.removed.is_empty() {
        println!("{} Removed ({} entries)", "D".red().bold(), paths.removed.len());
        for (path, _entry) in &paths.removed {
            println!("  {} {}", "-".red(), util::display_path(path));
        }
        println!();
    }

    if !paths.modified.is_empty() {
        println!("{} Modified ({} entries)", "M".yellow().bold(), paths.modified.len());
        for (path, _old, _new) in &paths.modified {
            println!("  {} {}", "~".yellow(), util::display_path(path));
        }
        println!();
    }

    print_stats(&stats);
    Ok(())
}

fn print_stats(stats: &DiffStats) {
    println!("{}", "Statistics".bold());
    println!("  Files changed: {}", stats.changed_files);
    print_side("Added:  ", &stats.added);
    print_side("Removed:", &stats.removed);
    if stats.blobs_before != stats.blobs_after && stats.changed_files == 0 {
        println!("  {}", "Only stored blocks differ".dimmed());
    }
}

fn print_side(label: &str, stat: &DiffStat) {
    println!(
        "  {} {} files, {} dirs, {} others, {} data blobs, {} tree blobs, {}",
        label,
        stat.files,
        stat.dirs,
        stat.others,
        stat.data_blobs,
        stat.tree_blobs,
        util::format_size(stat.bytes)
    );
}
