//! Log subscriber setup.

use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,keel=debug";

/// Installs a formatted subscriber honouring `RUST_LOG`.
///
/// Call once from `main`. Returns quietly if a global subscriber is already
/// set (tests, embedding applications).
pub fn init() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .try_init();
}
