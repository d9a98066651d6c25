//! Log output for the CLI.

use tracing_subscriber::EnvFilter;

/// Filter applied when `RUST_LOG` is unset or invalid.
const DEFAULT_FILTER: &str = "info";

/// Install a stderr formatter honouring `RUST_LOG`.
///
/// Records emitted through the `log` facade by the library crates are
/// forwarded to the same formatter. Calling this twice is harmless; the
/// second installation attempt is ignored.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    // `try_init` only fails when a global subscriber already exists.
    if tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_err()
    {
        log::debug!("logging already initialised");
    }
}
