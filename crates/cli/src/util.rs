//! Shared utilities for CLI commands

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use std::path::PathBuf;

/// Repository root, or an error when the cwd is outside any repository
pub fn require_repo(root: Option<PathBuf>) -> Result<PathBuf> {
    match root {
        Some(root) => Ok(root),
        None => anyhow::bail!("Not a Timelapse repository (no .tl directory found)"),
    }
}

/// Format timestamp as relative time ("2 hours ago")
pub fn format_relative_time(ts_ms: u64) -> String {
    format_relative_to(ts_ms, Utc::now())
}

fn format_relative_to(ts_ms: u64, now: DateTime<Utc>) -> String {
    let Some(then) = DateTime::<Utc>::from_timestamp_millis(ts_ms as i64) else {
        return "at an unknown time".to_string();
    };

    let seconds = (now - then).num_seconds();
    if seconds < 0 {
        "in the future".to_string()
    } else if seconds < 60 {
        format!("{} seconds ago", seconds)
    } else if seconds < 3600 {
        format!("{} minutes ago", seconds / 60)
    } else if seconds < 86400 {
        format!("{} hours ago", seconds / 3600)
    } else if seconds < 604800 {
        format!("{} days ago", seconds / 86400)
    } else {
        format!("{} weeks ago", seconds / 604800)
    }
}

/// Format timestamp as local absolute time ("2024-01-03 14:30:00")
pub fn format_absolute_time(ts_ms: u64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ts_ms as i64)
        .map(|t| t.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| "-".to_string())
}

/// Format file size in human-readable format
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Display form of a stored path key
pub fn display_path(key: &[u8]) -> String {
    String::from_utf8_lossy(key).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.00 KB");
        assert_eq!(format_size(1024 * 1024), "1.00 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.00 GB");
        assert_eq!(format_size(1536), "1.50 KB");
    }

    #[test]
    fn test_format_relative_time() {
        let now = Utc::now();
        let ms = |t: DateTime<Utc>| t.timestamp_millis() as u64;

        assert!(format_relative_to(ms(now), now).contains("seconds ago"));
        assert_eq!(format_relative_to(ms(now - Duration::hours(1)), now), "1 hours ago");
        assert_eq!(format_relative_to(ms(now - Duration::days(2)), now), "2 days ago");
        assert_eq!(format_relative_to(ms(now + Duration::hours(1)), now), "in the future");
    }

    #[test]
    fn test_require_repo() {
        assert!(require_repo(None).is_err());
        assert_eq!(require_repo(Some(PathBuf::from("/r"))).ok(), Some(PathBuf::from("/r")));
    }
}
