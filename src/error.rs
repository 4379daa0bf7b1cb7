//! Custom error types for the harness.
//!
//! This module defines the primary error type, `HarnessError`, used across the
//! crate. Using the `thiserror` crate, it provides a centralized way to handle
//! the different kinds of failures a scenario run can hit, from configuration
//! problems to malformed reference tables.
//!
//! Note that a failing *verdict* is not an error: collection timeouts and
//! comparison mismatches are converted to diagnostics on the scenario verdict
//! at the orchestrator boundary. `HarnessError` is reserved for harness
//! defects and infrastructure failures that make a verdict meaningless.

use thiserror::Error;

/// Convenience alias for results using the harness error type.
pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

#[derive(Error, Debug)]
pub enum HarnessError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Scenario suite parse error: {0}")]
    SuiteParse(#[from] toml::de::Error),

    /// Reference tables that cannot be checked as written are a harness
    /// defect, surfaced immediately and never retried.
    #[error("Malformed reference data: {0}")]
    MalformedReference(String),

    #[error("Malformed message payload on '{topic}': {reason}")]
    MalformedPayload { topic: String, reason: String },

    #[error("Driver launch failure: {0}")]
    Launch(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Logging initialization failed: {0}")]
    Logging(String),
}
