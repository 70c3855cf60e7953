//! Logging initialization built on `tracing`.
//!
//! Library code only emits events; installing a subscriber is the
//! embedding application's choice. These helpers cover the common case
//! of a process that wants env-filtered stderr output.

use tracing_subscriber::EnvFilter;

/// Initializes a global stderr subscriber filtered by `RUST_LOG`,
/// defaulting to `info` for this crate when the variable is unset.
///
/// Safe to call more than once; only the first call installs the
/// subscriber.
pub fn init() {
    init_with_filter("shelfwise=info");
}

/// Initializes logging with an explicit default filter directive, still
/// overridable through `RUST_LOG`.
pub fn init_with_filter(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));

    // Returns Err when a subscriber is already set; that is fine
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
