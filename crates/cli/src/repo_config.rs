//! Per-repository configuration (`.tl/config.toml`)

use anyhow::{Context, Result};
use journal::clean::{BaselineMode, SnapshotOrder};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::level_filters::LevelFilter;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RepoConfig {
    pub clean: CleanConfig,
    pub log: LogConfig,
}

/// Defaults for `tl clean`; flags override them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CleanConfig {
    pub baseline: BaselineMode,
    pub order: SnapshotOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl RepoConfig {
    /// Load from `<repo_root>/.tl/config.toml`; a missing file yields defaults
    pub fn load(repo_root: &Path) -> Result<Self> {
        let path = repo_root.join(".tl").join("config.toml");
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::parse(&contents)
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        Ok(config)
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.log
            .level
            .parse::<LevelFilter>()
            .map_err(|_| anyhow::anyhow!("log.level '{}' is not a valid level", self.log.level))?;
        Ok(())
    }
}
