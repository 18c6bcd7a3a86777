//! Record the working directory as a snapshot

use anyhow::{Context, Result};
use journal::Repository;
use owo_colors::OwoColorize;
use std::path::PathBuf;

pub async fn run(repo_root: PathBuf) -> Result<()> {
    let snapshot = tokio::task::spawn_blocking(move || {
        let repo = Repository::open(&repo_root).context("Failed to open repository")?;
        repo.create_snapshot()
    })
    .await
    .context("Snapshot task panicked")??;

    // The id stays uncolored so it can be copied or piped
    println!("{} Created snapshot {}", "✓".green(), snapshot.id);
    Ok(())
}
