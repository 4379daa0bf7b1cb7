//! Tracing infrastructure.
//!
//! Structured, async-aware logging for the harness, built on `tracing` and
//! `tracing-subscriber`. The filter is taken from `RUST_LOG` when set,
//! otherwise from the configured log level, so CI runs can tighten or loosen
//! verbosity without touching the settings file.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{HarnessError, HarnessResult};

/// Initialize the global tracing subscriber.
///
/// `default_level` is any `EnvFilter` directive (e.g. `"info"`,
/// `"depthcam_verify=debug"`). Calling this twice returns an error from the
/// subscriber registry; tests that need logging should use their own
/// subscriber instead.
pub fn init(default_level: &str) -> HarnessResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| HarnessError::Logging(e.to_string()))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| HarnessError::Logging(e.to_string()))
}
