//! Error handling utilities

use crate::error::ConfigurationError;
use tracing::error;

/// Report a fatal error and exit.
///
/// Configuration errors exit with status 2, everything else with 1. With
/// `verbose >= 1` the full error chain is printed.
pub fn handle_fatal_error(error: anyhow::Error, verbose: u8) -> ! {
    error!("Fatal error: {}", error);
    eprintln!("Error: {error}");

    if verbose >= 1 {
        eprintln!("\nError chain:");
        for (i, cause) in error.chain().enumerate() {
            eprintln!("  {}: {}", i, cause);
        }
    }

    let exit_code = if error.downcast_ref::<ConfigurationError>().is_some() {
        2
    } else {
        1
    };
    std::process::exit(exit_code)
}
