//! Structured logging bootstrap.
//!
//! Gateway crates log through `tracing` macros with key/value fields
//! (`device_id = %id`). Binaries call [`init_subscriber`] once at startup;
//! tests use [`capture_logs`] to assert on lifecycle events.

pub mod test_utils;

use tracing_subscriber::EnvFilter;

pub use test_utils::{CapturedEvent, CapturedLogs, capture_logs};

/// Install the global subscriber: compact lines on stderr.
///
/// `RUST_LOG` wins over `level` when set. Later calls are no-ops.
pub fn init_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .compact()
        .try_init();
}

/// Install the global subscriber: one JSON object per line on stderr.
///
/// Same filtering as [`init_subscriber`].
pub fn init_json_subscriber(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter(level))
        .with_writer(std::io::stderr)
        .json()
        .try_init();
}

fn filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeat_init_is_harmless() {
        init_subscriber("warn");
        init_json_subscriber("debug");
        init_subscriber("debug");
    }
}
