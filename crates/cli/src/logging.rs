//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install the global subscriber on stderr
///
/// `RUST_LOG` wins. Otherwise `verbose` selects debug, else `configured`.
pub fn init(verbose: bool, configured: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, configured)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn default_directive(verbose: bool, configured: &str) -> &str {
    if verbose {
        "debug"
    } else {
        configured
    }
}
