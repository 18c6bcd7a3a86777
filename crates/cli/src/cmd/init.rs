//! Initialize Timelapse in a directory

use anyhow::{Context, Result};
use journal::Repository;
use owo_colors::OwoColorize;
use std::path::Path;

pub async fn run(dir: &Path) -> Result<()> {
    println!("Initializing Timelapse repository at {}", dir.display());

    Repository::init(dir).context("Failed to initialize repository")?;

    println!("{} Initialized Timelapse repository", "✓".green());
    println!();
    println!("Created .tl/ directory structure:");
    println!("  - .tl/objects/blobs/    (file content storage)");
    println!("  - .tl/objects/trees/    (directory tree storage)");
    println!("  - .tl/journal/          (snapshot index)");
    println!("  - .tl/config.toml       (repository settings)");
    println!();
    println!("Next steps:");
    println!("  - Run 'tl snapshot' to record the working directory");
    println!("  - Run 'tl clean <id>' to drop snapshots with no real change");
    Ok(())
}
