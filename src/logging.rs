//! Log output for xApps built on the framework.
//!
//! The framework itself only emits `tracing` events; applications call
//! [`init`] once to get them printed.

use tracing_subscriber::EnvFilter;

/// Environment variable consulted first for the log filter.
pub const LOG_ENV: &str = "XAPP_LOG";

/// Install a formatted subscriber on stderr.
///
/// The filter is taken from `filter`, else `XAPP_LOG`, else `RUST_LOG`,
/// else `info`. Calling this more than once (or after another subscriber was
/// installed) is harmless; the first subscriber stays.
pub fn init(filter: Option<&str>) {
    let filter = filter
        .map(EnvFilter::new)
        .or_else(|| EnvFilter::try_from_env(LOG_ENV).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .try_init();
}
