//! Timelapse CLI - tl command

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use journal::clean::SnapshotOrder;

mod cmd;
mod logging;
mod repo_config;
mod util;

/// Timelapse - content-addressed snapshots with equivalence cleaning
#[derive(Parser)]
#[command(name = "tl")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Timelapse in the current directory
    Init,
    /// Record the working directory as a new snapshot
    Snapshot,
    /// Show snapshot timeline
    Log {
        /// Number of snapshots to show (default: 20)
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show diff statistics between snapshots
    Diff {
        /// First snapshot ID or prefix
        snapshot_a: String,
        /// Second snapshot ID or prefix
        snapshot_b: String,
    },
    /// Remove snapshots with no meaningful change since a baseline
    Clean {
        /// Substring of the baseline snapshot ID
        selector: String,
        /// Report what would be removed without removing anything
        #[arg(long)]
        dry_run: bool,
        /// Compare each candidate with the most recent kept snapshot
        #[arg(long)]
        rolling: bool,
        /// Walk order: newest-first or oldest-first
        #[arg(long)]
        order: Option<SnapshotOrder>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    let repo_root = journal::find_repo_root(&cwd);
    let config = match &repo_root {
        Some(root) => repo_config::RepoConfig::load(root)?,
        None => repo_config::RepoConfig::default(),
    };

    logging::init(cli.verbose, &config.log.level);

    match cli.command {
        Commands::Init => cmd::init::run(&cwd).await,
        Commands::Snapshot => cmd::snapshot::run(util::require_repo(repo_root)?).await,
        Commands::Log { limit } => cmd::log::run(util::require_repo(repo_root)?, limit).await,
        Commands::Diff { snapshot_a, snapshot_b } => {
            cmd::diff::run(util::require_repo(repo_root)?, &snapshot_a, &snapshot_b).await
        }
        Commands::Clean { selector, dry_run, rolling, order } => {
            let args = cmd::clean::CleanArgs { selector, dry_run, rolling, order };
            cmd::clean::run(repo_root.as_deref().unwrap_or(&cwd), &config, args).await
        }
    }
}
