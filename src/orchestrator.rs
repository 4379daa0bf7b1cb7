//! Per-scenario orchestration.
//!
//! A scenario moves through `Init -> Launched -> Collecting -> Verifying`
//! and terminates in `Passed` or `Failed`. The driver handle is released on
//! every exit path from `Launched` onward; timeouts and comparison
//! mismatches become verdict diagnostics rather than errors, while malformed
//! reference tables abort the scenario as harness defects. Scenarios run
//! sequentially — topic names are reused across scenarios against fresh
//! driver instances.

use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::error::HarnessResult;
use crate::scenario::Scenario;
use crate::transport::{DriverConfig, DriverLauncher, Transport};
use crate::verify::{self, ScenarioOutcome, TopicReport, Verdict};
use crate::waiter::{TopicWaiter, WaitOutcome};

/// Progress of one scenario run, for logging and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    Init,
    Launched,
    Collecting,
    Verifying,
    Passed,
    Failed,
}

/// Drives scenarios against a launcher/transport pair.
pub struct ScenarioRunner<L, T> {
    launcher: L,
    transport: T,
    poll_quantum: Duration,
}

impl<L, T> ScenarioRunner<L, T>
where
    L: DriverLauncher,
    T: Transport,
{
    pub fn new(launcher: L, transport: T, poll_quantum: Duration) -> Self {
        Self {
            launcher,
            transport,
            poll_quantum,
        }
    }

    /// Run one scenario to a verdict.
    ///
    /// Returns `Err` only for harness defects (malformed references, broken
    /// payload layouts, transport faults); every test-level failure is a
    /// `Failed` verdict with diagnostics.
    pub async fn run(&self, scenario: &Scenario) -> HarnessResult<Verdict> {
        scenario.validate()?;
        info!(scenario = %scenario.name, source = %scenario.source, "scenario starting");

        let config = DriverConfig {
            name: scenario.name.clone(),
            source: scenario.source.clone(),
            options: scenario.driver_options.clone(),
            launch_delay: scenario.launch_delay,
        };

        let handle = match self.launcher.launch(&config).await {
            Ok(handle) => handle,
            Err(e) if scenario.expect_unready => {
                // The driver refusing to come up is exactly what this
                // scenario asserts.
                info!(scenario = %scenario.name, error = %e, "launch refused as expected");
                return Ok(self.verdict(scenario, ScenarioOutcome::Passed, vec![], vec![
                    format!("driver launch refused: {e}"),
                ]));
            }
            Err(e) => {
                warn!(scenario = %scenario.name, error = %e, "driver launch failed");
                return Ok(self.verdict(scenario, ScenarioOutcome::Failed, vec![], vec![
                    format!("driver launch failed: {e}"),
                ]));
            }
        };
        debug!(scenario = %scenario.name, "state: {:?}", ScenarioState::Launched);

        // From here on the handle must be released whatever happens.
        let result = self.drive(scenario, &handle).await;
        self.launcher.shutdown(handle).await;
        debug!(scenario = %scenario.name, "driver shut down");
        result
    }

    /// Everything between launch and teardown.
    async fn drive(&self, scenario: &Scenario, handle: &L::Handle) -> HarnessResult<Verdict> {
        if scenario.expect_unready {
            let ready = self
                .launcher
                .wait_until_ready(handle, scenario.ready_timeout)
                .await;
            let (outcome, diagnostic) = if ready {
                (
                    ScenarioOutcome::Failed,
                    format!(
                        "driver became ready within {:?} but was expected not to",
                        scenario.ready_timeout
                    ),
                )
            } else {
                (
                    ScenarioOutcome::Passed,
                    format!("driver not ready within {:?}, as expected", scenario.ready_timeout),
                )
            };
            return Ok(self.verdict(scenario, outcome, vec![], vec![diagnostic]));
        }

        // Subscribe before the readiness gate so the first frames out of the
        // driver are not lost to setup.
        let mut waiter =
            TopicWaiter::subscribe(&self.transport, &scenario.themes, self.poll_quantum).await?;

        if !self
            .launcher
            .wait_until_ready(handle, scenario.ready_timeout)
            .await
        {
            return Ok(self.verdict(scenario, ScenarioOutcome::Failed, vec![], vec![format!(
                "driver never became ready within {:?}",
                scenario.ready_timeout
            )]));
        }

        debug!(scenario = %scenario.name, "state: {:?}", ScenarioState::Collecting);
        match waiter.wait(scenario.collect_timeout).await {
            WaitOutcome::Complete => {}
            WaitOutcome::TimedOut { incomplete } => {
                let diagnostics = incomplete
                    .iter()
                    .map(|t| format!("collection timed out: {t}"))
                    .collect();
                return Ok(self.verdict(scenario, ScenarioOutcome::Failed, vec![], diagnostics));
            }
        }

        debug!(scenario = %scenario.name, "state: {:?}", ScenarioState::Verifying);
        let mut reports = Vec::with_capacity(scenario.themes.len());
        for theme in &scenario.themes {
            let samples = waiter.samples_for(&theme.topic).unwrap_or_default();
            let report = verify::verify_topic(theme, &samples, &self.transport).await?;
            for check in report.failures() {
                warn!(scenario = %scenario.name, topic = %theme.topic, "{check}");
            }
            reports.push(report);
        }

        let outcome = if reports.iter().all(TopicReport::passed) {
            ScenarioOutcome::Passed
        } else {
            ScenarioOutcome::Failed
        };
        Ok(self.verdict(scenario, outcome, reports, vec![]))
    }

    fn verdict(
        &self,
        scenario: &Scenario,
        outcome: ScenarioOutcome,
        reports: Vec<TopicReport>,
        diagnostics: Vec<String>,
    ) -> Verdict {
        match outcome {
            ScenarioOutcome::Passed => info!(scenario = %scenario.name, "scenario passed"),
            ScenarioOutcome::Failed => warn!(scenario = %scenario.name, "scenario failed"),
        }
        Verdict {
            scenario: scenario.name.clone(),
            outcome,
            reports,
            diagnostics,
            finished_at: Utc::now(),
        }
    }

    /// Run a suite in order, one scenario at a time.
    pub async fn run_suite(&self, scenarios: &[Scenario]) -> HarnessResult<Vec<Verdict>> {
        let mut verdicts = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            verdicts.push(self.run(scenario).await?);
        }
        Ok(verdicts)
    }
}
