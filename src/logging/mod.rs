//! Logging setup for Turnstile
//!
//! `RUST_LOG` takes precedence; otherwise the crate logs at the configured
//! level and dependencies at `info`. Logs go to stderr so command output on
//! stdout stays machine-readable.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub fn default_filter(level: &str) -> String {
    format!("turnstile={},info", level)
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init(level: &str, json: bool) -> Result<(), TryInitError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(level)));

    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            fmt::layer()
                .json()
                .with_current_span(false)
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init()
}
