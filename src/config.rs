//! Configuration management.
//!
//! Harness-level settings, as opposed to the per-scenario tables in
//! [`crate::scenario`]. These cover the knobs that are the same for every
//! scenario in a run: logging, where recorded sessions live, and how often
//! the waiter polls its collectors. Per-scenario deadlines live on the
//! scenario itself.

use std::path::PathBuf;
use std::time::Duration;

use config::Config;
use serde::Deserialize;

use crate::error::HarnessError;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Settings {
    /// Default tracing filter directive when `RUST_LOG` is not set.
    pub log_level: String,

    /// Directory that recorded session files are resolved against when a
    /// scenario names a bare file. Defaults to the current directory.
    pub bag_dir: Option<PathBuf>,

    /// Interval between waiter polls of the per-topic channels. A tuning
    /// parameter, not a correctness requirement.
    #[serde(with = "humantime_serde")]
    pub poll_quantum: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            bag_dir: None,
            poll_quantum: Duration::from_millis(25),
        }
    }
}

impl Settings {
    /// Load settings from `config/<name>.toml`, or fall back to defaults when
    /// no name is given.
    pub fn new(config_name: Option<&str>) -> Result<Self, HarnessError> {
        match config_name {
            None => Ok(Self::default()),
            Some(name) => {
                let config_path = format!("config/{name}");
                let s = Config::builder()
                    .add_source(config::File::with_name(&config_path))
                    .build()
                    .map_err(HarnessError::Config)?;
                s.try_deserialize().map_err(HarnessError::Config)
            }
        }
    }
}
