//! Declarative scenario tables.
//!
//! A scenario is data, not code: the recorded-session source, the driver
//! options to launch with, and an ordered list of topic themes, each naming a
//! topic, the message kind expected there, how many chunks to collect, and
//! the reference the captured data is compared against. Suites of scenarios
//! load from TOML for the CLI and are built with plain struct literals in
//! tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};
use crate::messages::MessageKind;

fn default_chunks() -> usize {
    1
}

fn default_collect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_ready_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_lookup_tolerance() -> Duration {
    Duration::from_millis(50)
}

/// Expected per-channel image statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageReference {
    /// Expected channel means in payload order.
    pub average: Vec<f64>,
    /// Aggregate mean-absolute-difference bound per channel.
    pub epsilon: f64,
    #[serde(default)]
    pub width: Option<u32>,
    #[serde(default)]
    pub height: Option<u32>,
}

/// Expected inertial readings for a device held still.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImuReference {
    #[serde(default)]
    pub linear_acceleration: Option<[f64; 3]>,
    #[serde(default)]
    pub angular_velocity: Option<[f64; 3]>,
    pub epsilon: f64,
}

/// Expected point-cloud structure and field averages.
///
/// Replay is not bit-deterministic in point count, so `acceptable_counts` is
/// a list: the observed count passes when it matches ANY entry exactly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointCloudReference {
    pub acceptable_counts: Vec<u64>,
    pub rows: u32,
    /// Expected means: `[x, y, z]` or `[x, y, z, r, g, b]`.
    pub average: Vec<f64>,
    pub position_epsilon: f64,
    #[serde(default)]
    pub color_epsilon: Option<f64>,
}

/// Expected transform between one frame pair; `expected = None` means the
/// lookup must report the transform as unavailable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FramePairExpectation {
    pub parent: String,
    pub child: String,
    #[serde(default)]
    pub expected: Option<TransformExpectation>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformExpectation {
    pub translation: [f64; 3],
    /// Quaternion as `[x, y, z, w]`.
    pub rotation: [f64; 4],
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformReference {
    pub pairs: Vec<FramePairExpectation>,
    pub epsilon: f64,
    #[serde(with = "humantime_serde", default = "default_lookup_tolerance")]
    pub lookup_tolerance: Duration,
}

/// Kind-specific golden data for one topic theme.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reference {
    Image(ImageReference),
    Imu(ImuReference),
    PointCloud(PointCloudReference),
    Transform(TransformReference),
}

impl Reference {
    pub fn kind(&self) -> MessageKind {
        match self {
            Reference::Image(_) => MessageKind::Image,
            Reference::Imu(_) => MessageKind::Imu,
            Reference::PointCloud(_) => MessageKind::PointCloud,
            Reference::Transform(_) => MessageKind::Transform,
        }
    }
}

/// One subscription target within a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicTheme {
    pub topic: String,
    pub kind: MessageKind,
    #[serde(default = "default_chunks")]
    pub expected_chunks: usize,
    #[serde(default)]
    pub reference: Option<Reference>,
}

impl TopicTheme {
    pub fn new(topic: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            topic: topic.into(),
            kind,
            expected_chunks: 1,
            reference: None,
        }
    }

    pub fn with_chunks(mut self, chunks: usize) -> Self {
        self.expected_chunks = chunks;
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// One replay scenario: source, driver options, themes, and deadlines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    /// Recorded session the driver replays; resolved against the configured
    /// bag directory when relative.
    pub source: String,
    /// Driver options passed through opaquely at launch (camera name, stream
    /// resolutions, enable flags, filter toggles).
    #[serde(default)]
    pub driver_options: BTreeMap<String, toml::Value>,
    #[serde(default)]
    pub themes: Vec<TopicTheme>,
    #[serde(with = "humantime_serde", default = "default_collect_timeout")]
    pub collect_timeout: Duration,
    #[serde(with = "humantime_serde", default = "default_ready_timeout")]
    pub ready_timeout: Duration,
    /// Hold back the driver's streams after launch; the combined point-cloud
    /// scenario uses this so early chunks are not lost to subscription setup.
    #[serde(with = "humantime_serde", default)]
    pub launch_delay: Option<Duration>,
    /// When set, the scenario passes iff the driver never becomes ready
    /// within `ready_timeout` (the non-existent-source case).
    #[serde(default)]
    pub expect_unready: bool,
}

impl Scenario {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            driver_options: BTreeMap::new(),
            themes: Vec::new(),
            collect_timeout: default_collect_timeout(),
            ready_timeout: default_ready_timeout(),
            launch_delay: None,
            expect_unready: false,
        }
    }

    pub fn with_option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.driver_options.insert(key.to_string(), value.into());
        self
    }

    pub fn with_theme(mut self, theme: TopicTheme) -> Self {
        self.themes.push(theme);
        self
    }

    /// Reject reference tables that cannot be checked as written. Called by
    /// the orchestrator before launch; a failure here is a harness defect,
    /// not a scenario verdict.
    pub fn validate(&self) -> HarnessResult<()> {
        for theme in &self.themes {
            if let Some(reference) = &theme.reference {
                if reference.kind() != theme.kind {
                    return Err(HarnessError::MalformedReference(format!(
                        "theme '{}' expects {} messages but carries a {} reference",
                        theme.topic,
                        theme.kind,
                        reference.kind()
                    )));
                }
            }
            match (theme.kind, theme.expected_chunks) {
                (MessageKind::Transform, n) if n != 0 => {
                    return Err(HarnessError::MalformedReference(format!(
                        "transform theme '{}' must use expected_chunks = 0",
                        theme.topic
                    )));
                }
                (MessageKind::Transform, _) => {}
                (_, 0) => {
                    return Err(HarnessError::MalformedReference(format!(
                        "theme '{}' expects zero chunks but is not a transform theme",
                        theme.topic
                    )));
                }
                _ => {}
            }
            if let Some(Reference::Image(image)) = &theme.reference {
                if image.average.is_empty() {
                    return Err(HarnessError::MalformedReference(format!(
                        "image reference for '{}' has no channel averages",
                        theme.topic
                    )));
                }
            }
            if let Some(Reference::PointCloud(cloud)) = &theme.reference {
                if cloud.acceptable_counts.is_empty() {
                    return Err(HarnessError::MalformedReference(format!(
                        "point cloud reference for '{}' has an empty acceptable-count list",
                        theme.topic
                    )));
                }
                if cloud.average.len() != 3 && cloud.average.len() != 6 {
                    return Err(HarnessError::MalformedReference(format!(
                        "point cloud reference for '{}' must average 3 or 6 fields, got {}",
                        theme.topic,
                        cloud.average.len()
                    )));
                }
                if cloud.average.len() == 6 && cloud.color_epsilon.is_none() {
                    return Err(HarnessError::MalformedReference(format!(
                        "point cloud reference for '{}' averages color but sets no color epsilon",
                        theme.topic
                    )));
                }
            }
        }
        Ok(())
    }
}

/// A whole run's worth of scenarios, executed sequentially.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    #[serde(rename = "scenario", default)]
    pub scenarios: Vec<Scenario>,
}

impl Suite {
    pub fn from_toml(text: &str) -> HarnessResult<Self> {
        let suite: Suite = toml::from_str(text)?;
        for scenario in &suite.scenarios {
            scenario.validate()?;
        }
        Ok(suite)
    }

    pub async fn load(path: &Path) -> HarnessResult<Self> {
        let text = tokio::fs::read_to_string(path).await?;
        Self::from_toml(&text)
    }
}
