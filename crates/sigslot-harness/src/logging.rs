#![forbid(unsafe_code)]

//! Log capture for harness tests.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "sigslot=debug";

/// Install a test-writer subscriber once per process.
///
/// Later calls (from other tests in the same binary) are no-ops.
pub fn init_test_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
