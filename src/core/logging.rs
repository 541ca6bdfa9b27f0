//! Diagnostic logging to stderr. Command results go to stdout; everything here
//! is for operators and is filtered through `GLOSS_LOG` (EnvFilter syntax).

use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "GLOSS_LOG";
const DEFAULT_DIRECTIVE: &str = "gloss=warn";

/// Install the global subscriber. Safe to call more than once; later calls are no-ops.
pub fn init(verbose: bool) {
    let fallback = if verbose { "gloss=debug" } else { DEFAULT_DIRECTIVE };
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(fallback));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
