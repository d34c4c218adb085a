//! Logging configuration and initialization
//!
//! Logs go to stderr so that command output on stdout stays machine-readable.

use crate::app::config::AppConfig;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Install the global `tracing` subscriber for the binary
pub fn init_logging(config: &AppConfig) {
    let requested = config.log_level();
    let (filter, rejected) = match EnvFilter::try_new(&requested) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(config.verbose >= 2)
        .with_thread_ids(config.verbose >= 2)
        .with_line_number(config.verbose >= 3)
        .init();

    if let Some(e) = rejected {
        warn!(filter = %requested, error = %e, "Ignoring invalid log filter, using info");
    }
    debug!(verbosity = config.verbose, filter = %requested, "switchyard logging initialized");
}
