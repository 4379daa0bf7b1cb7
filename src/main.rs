//! CLI entry point for the replay verification harness.
//!
//! Runs a scenario suite — the built-in demo catalog or one loaded from a
//! TOML file — against the scripted playback driver and reports one verdict
//! per scenario. Exits nonzero when any scenario fails, which is all a CI
//! job needs.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;

use depthcam_verify::config::Settings;
use depthcam_verify::demo;
use depthcam_verify::logging;
use depthcam_verify::orchestrator::ScenarioRunner;
use depthcam_verify::scenario::{Scenario, Suite};
use depthcam_verify::transport::PlaybackDriver;

#[derive(Parser)]
#[command(name = "depthcam_verify")]
#[command(about = "Replay recorded depth-camera sessions and verify driver output", long_about = None)]
struct Cli {
    /// Settings file name under config/ (without extension).
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run scenarios and report verdicts.
    Run {
        /// Scenario suite TOML; defaults to the built-in demo catalog.
        #[arg(long)]
        suite: Option<PathBuf>,

        /// Only run scenarios whose name contains this substring.
        #[arg(long)]
        filter: Option<String>,
    },

    /// List the scenarios that would run.
    List {
        #[arg(long)]
        suite: Option<PathBuf>,
    },
}

async fn load_scenarios(suite: Option<PathBuf>, settings: &Settings) -> Result<Vec<Scenario>> {
    match suite {
        None => Ok(demo::scenarios()),
        Some(path) => {
            let mut suite = Suite::load(&path).await?;
            if let Some(bag_dir) = &settings.bag_dir {
                for scenario in &mut suite.scenarios {
                    scenario.source = bag_dir.join(&scenario.source).to_string_lossy().to_string();
                }
            }
            Ok(suite.scenarios)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let settings = Settings::new(cli.config.as_deref())?;
    logging::init(&settings.log_level)?;

    match cli.command {
        Commands::List { suite } => {
            let scenarios = load_scenarios(suite, &settings).await?;
            for scenario in &scenarios {
                println!(
                    "{:<28} source={} themes={}",
                    scenario.name,
                    scenario.source,
                    scenario.themes.len()
                );
            }
            Ok(())
        }
        Commands::Run { suite, filter } => {
            let mut scenarios = load_scenarios(suite, &settings).await?;
            if let Some(filter) = filter {
                scenarios.retain(|s| s.name.contains(&filter));
            }
            info!(count = scenarios.len(), "running scenario suite");

            let driver = PlaybackDriver::new(demo::session_library());
            let runner =
                ScenarioRunner::new(driver.clone(), driver, settings.poll_quantum);
            let verdicts = runner.run_suite(&scenarios).await?;

            let mut failed = 0usize;
            for verdict in &verdicts {
                println!("{}", verdict.summary());
                if !verdict.passed() {
                    failed += 1;
                }
            }
            println!("{} scenarios, {} failed", verdicts.len(), failed);

            if failed > 0 {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}
