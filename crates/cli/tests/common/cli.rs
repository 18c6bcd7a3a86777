//! CLI command execution helpers
//!
//! Wraps the `tl` binary built for this test run and provides
//! assertion helpers.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// CLI command builder
pub struct TlCommand {
    binary_path: PathBuf,
    working_dir: PathBuf,
    args: Vec<String>,
}

impl TlCommand {
    /// Create a new command in the given working directory
    pub fn new(working_dir: impl AsRef<Path>) -> Self {
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_tl")),
            working_dir: working_dir.as_ref().to_path_buf(),
            args: Vec::new(),
        }
    }

    /// Add command arguments
    pub fn args(&mut self, args: &[&str]) -> &mut Self {
        self.args.extend(args.iter().map(|s| s.to_string()));
        self
    }

    /// Execute command and capture its output
    pub fn execute(&self) -> Result<CommandResult> {
        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .current_dir(&self.working_dir)
            .env_remove("RUST_LOG")
            .output()
            .context("Failed to execute command")?;

        Ok(CommandResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
        })
    }

    /// Execute and assert success
    pub fn assert_success(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if !result.success() {
            anyhow::bail!(
                "Command failed (exit code: {}):\nArgs: {:?}\nStdout: {}\nStderr: {}",
                result.exit_code,
                self.args,
                result.stdout,
                result.stderr
            );
        }

        Ok(result)
    }

    /// Execute and expect failure
    pub fn assert_failure(&self) -> Result<CommandResult> {
        let result = self.execute()?;

        if result.success() {
            anyhow::bail!(
                "Command should have failed but succeeded:\nArgs: {:?}\nStdout: {}",
                self.args,
                result.stdout
            );
        }

        Ok(result)
    }
}

/// Command execution result
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl CommandResult {
    /// Check if command succeeded
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Check if stdout contains text
    pub fn contains_stdout(&self, text: &str) -> bool {
        self.stdout.contains(text)
    }

    /// Check if stderr contains text
    pub fn contains_stderr(&self, text: &str) -> bool {
        self.stderr.contains(text)
    }

    /// First full snapshot ID (64 hex characters) in stdout
    pub fn parse_snapshot_id(&self) -> Option<String> {
        self.stdout.lines().find_map(extract_snapshot_id)
    }

    /// Short IDs from `removed snapshot <id>` lines
    pub fn removed_ids(&self) -> Vec<String> {
        self.stdout
            .lines()
            .filter_map(|line| line.trim().strip_prefix("removed snapshot "))
            .map(|id| id.trim().to_string())
            .collect()
    }
}

/// Extract a full snapshot ID from a line of text
pub fn extract_snapshot_id(line: &str) -> Option<String> {
    line.split(|c: char| !c.is_ascii_alphanumeric())
        .find(|word| word.len() == 64 && word.chars().all(|c| c.is_ascii_hexdigit()))
        .map(str::to_string)
}

/// Macro for convenient command construction
///
/// Usage:
/// ```ignore
/// tl!(dir, "init").assert_success()?;
/// tl!(dir, "clean", &snapshot_id).assert_success()?;
/// ```
#[macro_export]
macro_rules! tl {
    ($dir:expr, $($arg:expr),*) => {{
        let mut cmd = $crate::common::cli::TlCommand::new($dir);
        cmd.args(&[$($arg),*]);
        cmd
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_id_extraction() {
        let id = "ab".repeat(32);
        let line = format!("Created snapshot {}", id);
        assert_eq!(extract_snapshot_id(&line), Some(id));
        assert_eq!(extract_snapshot_id("Created snapshot abcdef"), None);
    }

    #[test]
    fn test_removed_ids() {
        let result = CommandResult {
            stdout: "Baseline 11111111\nremoved snapshot 22222222\nremoved snapshot 33333333\n".to_string(),
            stderr: String::new(),
            exit_code: 0,
        };
        assert_eq!(result.removed_ids(), vec!["22222222", "33333333"]);
    }
}
