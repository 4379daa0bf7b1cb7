//! Statistical verification of collected samples.
//!
//! Each message kind has its own checker that turns raw samples into
//! comparable statistics and differences them against the reference, yielding
//! a flat list of structured [`FieldCheck`]s. A topic passes iff all of its
//! field checks pass; a scenario passes iff all of its topics pass.

pub mod image;
pub mod imu;
pub mod pointcloud;
pub mod transform;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::HarnessResult;
use crate::messages::{MessageKind, SampleMessage};
use crate::scenario::{Reference, TopicTheme};
use crate::transport::Transport;

/// One observed-vs-expected comparison.
#[derive(Debug, Clone, Serialize)]
pub struct FieldCheck {
    pub field: String,
    pub observed: serde_json::Value,
    pub expected: serde_json::Value,
    pub epsilon: f64,
    pub passed: bool,
}

impl FieldCheck {
    /// Scalar comparison under epsilon.
    pub fn scalar(field: impl Into<String>, observed: f64, expected: f64, epsilon: f64) -> Self {
        Self {
            field: field.into(),
            observed: json_f64(observed),
            expected: json_f64(expected),
            epsilon,
            passed: (observed - expected).abs() <= epsilon,
        }
    }

    /// Exact comparison, rendered with epsilon 0.
    pub fn exact<T: Serialize + PartialEq>(
        field: impl Into<String>,
        observed: T,
        expected: T,
    ) -> Self {
        let passed = observed == expected;
        Self {
            field: field.into(),
            observed: serde_json::to_value(observed).unwrap_or(serde_json::Value::Null),
            expected: serde_json::to_value(expected).unwrap_or(serde_json::Value::Null),
            epsilon: 0.0,
            passed,
        }
    }

    /// A check that failed before any value could be observed.
    pub fn missing(field: impl Into<String>, reason: &str) -> Self {
        Self {
            field: field.into(),
            observed: serde_json::Value::String(reason.to_string()),
            expected: serde_json::Value::Null,
            epsilon: 0.0,
            passed: false,
        }
    }
}

impl std::fmt::Display for FieldCheck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = if self.passed { "ok" } else { "FAIL" };
        write!(
            f,
            "[{status}] {}: observed {} expected {} (epsilon {})",
            self.field, self.observed, self.expected, self.epsilon
        )
    }
}

fn json_f64(value: f64) -> serde_json::Value {
    serde_json::Number::from_f64(value)
        .map(serde_json::Value::Number)
        .unwrap_or(serde_json::Value::Null)
}

/// All field checks for one topic theme.
#[derive(Debug, Clone, Serialize)]
pub struct TopicReport {
    pub topic: String,
    pub kind: MessageKind,
    pub checks: Vec<FieldCheck>,
}

impl TopicReport {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|c| c.passed)
    }

    pub fn failures(&self) -> impl Iterator<Item = &FieldCheck> {
        self.checks.iter().filter(|c| !c.passed)
    }
}

/// Terminal state a scenario run ends in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScenarioOutcome {
    Passed,
    Failed,
}

/// The scenario-level verdict: pass/fail plus everything a human needs to
/// see why.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub scenario: String,
    pub outcome: ScenarioOutcome,
    pub reports: Vec<TopicReport>,
    /// Failure text not tied to a single field check (timeouts, launch
    /// problems, readiness expectations).
    pub diagnostics: Vec<String>,
    pub finished_at: DateTime<Utc>,
}

impl Verdict {
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Passed
    }

    pub fn summary(&self) -> String {
        let status = match self.outcome {
            ScenarioOutcome::Passed => "PASSED",
            ScenarioOutcome::Failed => "FAILED",
        };
        let mut lines = vec![format!("{}: {status}", self.scenario)];
        for diag in &self.diagnostics {
            lines.push(format!("  - {diag}"));
        }
        for report in &self.reports {
            for check in report.failures() {
                lines.push(format!("  - {}: {check}", report.topic));
            }
        }
        lines.join("\n")
    }
}

/// Run the kind-appropriate checker for one theme over its collected
/// samples. Themes without a reference only assert that collection reached
/// its cap, which the waiter already guaranteed.
pub async fn verify_topic<T: Transport + ?Sized>(
    theme: &TopicTheme,
    samples: &[SampleMessage],
    transport: &T,
) -> HarnessResult<TopicReport> {
    let checks = match &theme.reference {
        None => Vec::new(),
        Some(Reference::Image(reference)) => image::check(&theme.topic, reference, samples)?,
        Some(Reference::Imu(reference)) => imu::check(reference, samples),
        Some(Reference::PointCloud(reference)) => {
            pointcloud::check(&theme.topic, reference, samples)?
        }
        Some(Reference::Transform(reference)) => transform::check(reference, transport).await?,
    };
    Ok(TopicReport {
        topic: theme.topic.clone(),
        kind: theme.kind,
        checks,
    })
}
