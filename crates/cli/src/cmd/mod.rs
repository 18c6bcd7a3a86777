//! CLI command implementations

pub mod clean;
pub mod diff;
pub mod init;
pub mod log;
pub mod snapshot;
