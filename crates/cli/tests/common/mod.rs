//! Common utilities for integration tests

pub mod cli;

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, UNIX_EPOCH};
use tempfile::TempDir;

/// Temporary directory initialized as a Timelapse repository
pub struct TestRepo {
    dir: TempDir,
}

impl TestRepo {
    pub fn init() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        crate::tl!(dir.path(), "init").assert_success()?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn file(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.file(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    /// Change only the modification time of `rel`
    pub fn touch(&self, rel: &str, secs: u64) -> Result<()> {
        let file = fs::File::options().write(true).open(self.file(rel))?;
        file.set_modified(UNIX_EPOCH + Duration::from_secs(secs))?;
        Ok(())
    }

    /// Take a snapshot and return its full id
    pub fn snapshot(&self) -> Result<String> {
        // Keeps snapshot timestamps strictly increasing
        std::thread::sleep(Duration::from_millis(10));
        let result = crate::tl!(self.path(), "snapshot").assert_success()?;
        result
            .parse_snapshot_id()
            .ok_or_else(|| anyhow::anyhow!("no snapshot id in output: {}", result.stdout))
    }

    /// Output of `tl log`
    pub fn log(&self) -> Result<String> {
        Ok(crate::tl!(self.path(), "log").assert_success()?.stdout)
    }
}
