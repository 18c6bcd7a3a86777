//! End-to-end tests for `tl clean`

mod common;

use anyhow::Result;
use common::TestRepo;

fn short(id: &str) -> &str {
    &id[..8]
}

/// v1 -> v2 -> v2 with only a new mtime
fn edit_then_touch(repo: &TestRepo) -> Result<(String, String, String)> {
    repo.write("notes.txt", "v1")?;
    let first = repo.snapshot()?;
    repo.write("notes.txt", "v2")?;
    let second = repo.snapshot()?;
    repo.touch("notes.txt", 5_000)?;
    let third = repo.snapshot()?;
    Ok((first, second, third))
}

#[test]
fn test_snapshot_output_carries_plain_id() -> Result<()> {
    let repo = TestRepo::init()?;
    repo.write("a.txt", "a")?;

    let result = tl!(repo.path(), "snapshot").assert_success()?;
    let line = result
        .stdout
        .lines()
        .find(|line| line.contains("Created snapshot"))
        .ok_or_else(|| anyhow::anyhow!("no snapshot line in: {}", result.stdout))?;
    let id = line.rsplit(' ').next().unwrap_or_default();

    assert_eq!(id.len(), 64);
    assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(result.parse_snapshot_id().as_deref(), Some(id));
    assert!(repo.log()?.contains(short(id)));
    Ok(())
}

#[test]
fn test_clean_removes_metadata_only_snapshot() -> Result<()> {
    let repo = TestRepo::init()?;
    let (first, second, third) = edit_then_touch(&repo)?;

    // Newest first: baseline is the touched snapshot, second matches it, first differs
    let result = tl!(repo.path(), "clean", &third[..12]).assert_success()?;
    assert_eq!(result.removed_ids(), vec![short(&second).to_string()]);
    assert!(result.contains_stdout("removed 1 of 2 snapshots"));

    let log = repo.log()?;
    assert!(log.contains(short(&first)));
    assert!(!log.contains(short(&second)));
    assert!(log.contains(short(&third)));
    Ok(())
}

#[test]
fn test_clean_oldest_first_walks_forward() -> Result<()> {
    let repo = TestRepo::init()?;
    repo.write("src/lib.rs", "pub fn a() {}")?;
    repo.touch("src/lib.rs", 1_000)?;
    let base = repo.snapshot()?;
    repo.touch("src/lib.rs", 2_000)?;
    let touched = repo.snapshot()?;
    repo.write("src/lib.rs", "pub fn b() {}")?;
    let edited = repo.snapshot()?;

    let result = tl!(repo.path(), "clean", short(&base), "--order", "oldest-first").assert_success()?;
    assert_eq!(result.removed_ids(), vec![short(&touched).to_string()]);

    let log = repo.log()?;
    assert!(log.contains(short(&edited)));
    assert!(!log.contains(short(&touched)));
    Ok(())
}

#[test]
fn test_clean_rerun_is_noop() -> Result<()> {
    let repo = TestRepo::init()?;
    let (_, _, third) = edit_then_touch(&repo)?;

    tl!(repo.path(), "clean", short(&third)).assert_success()?;
    let again = tl!(repo.path(), "clean", short(&third)).assert_success()?;
    assert!(again.removed_ids().is_empty());
    Ok(())
}

#[test]
fn test_clean_dry_run_keeps_everything() -> Result<()> {
    let repo = TestRepo::init()?;
    let (_, second, third) = edit_then_touch(&repo)?;

    let result = tl!(repo.path(), "clean", short(&third), "--dry-run").assert_success()?;
    assert!(result.contains_stdout(&format!("would remove snapshot {}", short(&second))));
    assert!(result.removed_ids().is_empty());
    assert!(repo.log()?.contains(short(&second)));
    Ok(())
}

#[test]
fn test_clean_unknown_selector_fails() -> Result<()> {
    let repo = TestRepo::init()?;
    repo.write("a.txt", "a")?;
    repo.snapshot()?;

    let result = tl!(repo.path(), "clean", "zzzz").assert_failure()?;
    assert!(result.contains_stderr("did not find snapshot to start clean [start:<zzzz>]"));
    Ok(())
}

#[test]
fn test_clean_requires_one_selector() -> Result<()> {
    let repo = TestRepo::init()?;

    let missing = tl!(repo.path(), "clean").assert_failure()?;
    assert_eq!(missing.exit_code, 2);

    let extra = tl!(repo.path(), "clean", "aa", "bb").assert_failure()?;
    assert_eq!(extra.exit_code, 2);
    Ok(())
}

#[test]
fn test_clean_empty_selector_is_rejected() -> Result<()> {
    let repo = TestRepo::init()?;
    let result = tl!(repo.path(), "clean", "").assert_failure()?;
    assert!(result.contains_stderr("set snapshot id to start clean"));
    Ok(())
}

#[test]
fn test_clean_outside_repository_fails() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = tl!(dir.path(), "clean", "abc").assert_failure()?;
    assert!(result.contains_stderr("failed to open repository"));
    Ok(())
}

#[test]
fn test_diff_reports_changed_files() -> Result<()> {
    let repo = TestRepo::init()?;
    let (first, second, third) = edit_then_touch(&repo)?;

    let changed = tl!(repo.path(), "diff", short(&first), short(&second)).assert_success()?;
    assert!(changed.contains_stdout("Files changed: 1"));
    assert!(changed.contains_stdout("notes.txt"));

    let touched = tl!(repo.path(), "diff", short(&second), short(&third)).assert_success()?;
    assert!(touched.contains_stdout("Files changed: 0"));
    assert!(touched.contains_stdout("Only stored blocks differ"));
    Ok(())
}
