//! Logging initialization.
//!
//! Stdout belongs to the stdio transport, so logs go to the configured log
//! file or to stderr. Never to stdout.

use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Directives used with `--debug`. Targets match by prefix, so
/// `mattermost_mcp` also covers every `mattermost_mcp_*` crate.
const DEBUG_FILTER: &str = "mattermost_mcp=debug,tower_http=debug";

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. `RUST_LOG` wins over both presets.
pub fn init_logging(debug: bool, log_file: Option<&Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if debug { DEBUG_FILTER } else { DEFAULT_FILTER })
    });

    let file = log_file.and_then(|path| {
        match std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
        {
            Ok(f) => Some(f),
            Err(e) => {
                eprintln!("Warning: Could not open log file {}: {e}", path.display());
                None
            }
        }
    });

    match file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(file)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .init(),
    }
}
