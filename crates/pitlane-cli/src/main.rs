//! pitlane - replay a session scenario through the completion engine.
//!
//! The scenario file names drivers, events, task definitions (raw form) and
//! a list of session lifecycle transitions. Each transition is applied to the
//! in-memory catalog, dispatched to the engine, and the resulting completion
//! rows are printed as JSON.
//!
//! The engine runs on a replay clock: before each transition it is moved to
//! the step's `at`, or to the session's own timestamp when the step has none.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use pitlane_core::app::{CompletionEngine, EngineBuilder, EngineConfig, load_definitions_from_values};
use pitlane_core::domain::{
    Driver, Event, LifecycleState, OutcomeStatus, Participation, ParticipationId,
    TaskCompletion,
};
use pitlane_core::impls::{InMemoryCatalog, InMemoryCompletionStore};
use pitlane_core::ports::FixedClock;
use serde::Deserialize;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "pitlane")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Scenario file (JSON)
    #[arg(long, env = "PITLANE_SCENARIO")]
    scenario: PathBuf,

    /// Engine config file (JSON); defaults apply when omitted
    #[arg(long, env = "PITLANE_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Deserialize)]
struct Scenario {
    drivers: Vec<Driver>,
    events: Vec<Event>,
    /// Raw task definitions; malformed entries are skipped with a warning.
    tasks: Vec<serde_json::Value>,
    #[serde(default)]
    sessions: Vec<Participation>,
    #[serde(default)]
    steps: Vec<Step>,
}

/// One lifecycle transition of a session, with the result data it carries.
#[derive(Deserialize)]
struct Step {
    session: ParticipationId,
    state: LifecycleState,
    #[serde(default)]
    outcome: Option<OutcomeStatus>,
    #[serde(default)]
    incidents: Option<u32>,
    #[serde(default)]
    penalties: Option<u32>,
    #[serde(default)]
    laps_completed: Option<u32>,
    #[serde(default)]
    finishing_position: Option<u32>,
    #[serde(default)]
    at: Option<chrono::DateTime<chrono::Utc>>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let config = match &cli.config {
        Some(path) => read_json::<EngineConfig>(path)?,
        None => EngineConfig::default(),
    };
    let scenario: Scenario = read_json(&cli.scenario)?;

    let rows = run(&scenario, config).await?;
    info!(completions = rows.len(), "scenario finished");
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

/// Replay every step and return the resulting completion rows.
async fn run(scenario: &Scenario, config: EngineConfig) -> Result<Vec<TaskCompletion>> {
    let catalog = InMemoryCatalog::new();
    let store = InMemoryCompletionStore::new();
    seed(&catalog, scenario).await;

    let start = scenario
        .sessions
        .iter()
        .map(|s| s.created_at)
        .min()
        .unwrap_or_else(chrono::Utc::now);
    let clock = Arc::new(FixedClock::new(start));
    let engine = EngineBuilder::new(Arc::new(store.clone()), Arc::new(catalog.clone()))
        .clock(clock.clone())
        .config(config)
        .build()?;

    for step in &scenario.steps {
        replay(&engine, &catalog, &clock, step).await?;
    }
    for driver in &scenario.drivers {
        engine.evaluate_readiness(driver.id).await?;
    }

    Ok(store.all().await)
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))
}

async fn seed(catalog: &InMemoryCatalog, scenario: &Scenario) {
    for driver in &scenario.drivers {
        catalog.put_driver(driver.clone()).await;
    }
    for event in &scenario.events {
        catalog.put_event(event.clone()).await;
    }
    for session in &scenario.sessions {
        catalog.put_participation(session.clone()).await;
    }

    let loaded = load_definitions_from_values(scenario.tasks.iter().cloned());
    if !loaded.rejected.is_empty() {
        warn!(skipped = loaded.rejected.len(), "some task definitions were skipped");
    }
    for task in loaded.loaded {
        catalog.put_task(task).await;
    }
}

async fn replay(
    engine: &CompletionEngine,
    catalog: &InMemoryCatalog,
    clock: &FixedClock,
    step: &Step,
) -> Result<()> {
    use pitlane_core::ports::Catalog;

    let Some(mut session) = catalog.participation(step.session).await? else {
        bail!("step refers to unknown session {}", step.session);
    };

    session.state = step.state;
    if let Some(outcome) = step.outcome {
        session.outcome = Some(outcome);
    }
    if let Some(incidents) = step.incidents {
        session.incidents = incidents;
    }
    if let Some(penalties) = step.penalties {
        session.penalties = penalties;
    }
    if let Some(laps) = step.laps_completed {
        session.laps_completed = laps;
    }
    if step.finishing_position.is_some() {
        session.finishing_position = step.finishing_position;
    }
    match (step.state, step.at) {
        (LifecycleState::Started, Some(at)) => session.started_at = Some(at),
        (LifecycleState::Completed, Some(at)) => session.finished_at = Some(at),
        _ => {}
    }
    clock.set(step.at.unwrap_or_else(|| session.reference_time()));
    catalog.put_participation(session).await;

    let report = engine.on_session_transition(step.session, step.state).await?;
    info!(
        session = %step.session, state = %step.state,
        report = %serde_json::to_string(&report)?,
        "transition applied"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEMO: &str = include_str!("../../../demos/scenario.json");

    #[tokio::test]
    async fn demo_replays_on_step_time() {
        let scenario: Scenario = serde_json::from_str(DEMO).unwrap();
        let rows = run(&scenario, EngineConfig::default()).await.unwrap();

        // One daily completion per race day, keyed by the day the race ran.
        let mut days: Vec<String> = rows
            .iter()
            .filter(|c| c.is_completed())
            .filter_map(|c| c.period_key.clone())
            .collect();
        days.sort();
        assert_eq!(days, vec!["2026-03-02", "2026-03-03", "2026-03-04"]);

        let stamps: Vec<_> = rows
            .iter()
            .filter(|c| c.is_completed())
            .map(TaskCompletion::completed_time)
            .collect();
        assert!(stamps.iter().all(|at| at.format("%Y-%m").to_string() == "2026-03"));
    }
}
