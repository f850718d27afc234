//! `roomtrack` CLI: scenario runs, replay evaluation, debug frame export.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sim::replay::{load_replay, replay, replay_with_sink, save_replay, ReplayLog, ReplayOutcome};
use sim::scenarios::{Scenario, ScenarioKind};
use sim::JsonFrameSink;
use std::path::{Path, PathBuf};
use tracker_core::TrackerConfig;

/// Debug frames kept on disk when `--debug-dir` is set
const DEBUG_FRAMES_RETAINED: usize = 500;

#[derive(Parser)]
#[command(name = "roomtrack", about = "Room-level occupant tracker CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Simulate a named scenario, track it and report accuracy.
    RunScenario {
        #[arg(value_enum)]
        scenario: ScenarioKind,
        /// Random seed for reproducibility
        #[arg(long, default_value_t = 42)]
        seed: u64,
        /// Tracker configuration (JSON); defaults apply to missing fields
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Also save the recorded sensor log
        #[arg(long)]
        save_replay: Option<PathBuf>,
        /// Write debug frames into this directory
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
    /// Track a previously recorded sensor log.
    Replay {
        /// Path to replay JSON file
        input: PathBuf,
        /// Tracker configuration (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output metrics to a JSON file
        #[arg(long)]
        output: Option<PathBuf>,
        /// Write debug frames into this directory
        #[arg(long)]
        debug_dir: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::RunScenario {
            scenario,
            seed,
            config,
            output,
            save_replay: save_path,
            debug_dir,
        } => {
            let config = load_config(config.as_deref())?;
            run_scenario(
                scenario,
                seed,
                config,
                output.as_deref(),
                save_path.as_deref(),
                debug_dir.as_deref(),
            )?;
        }
        Commands::Replay {
            input,
            config,
            output,
            debug_dir,
        } => {
            let config = load_config(config.as_deref())?;
            run_replay(&input, config, output.as_deref(), debug_dir.as_deref())?;
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<TrackerConfig> {
    let Some(path) = path else {
        return Ok(TrackerConfig::default());
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    let config: TrackerConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing config {}", path.display()))?;
    config.validate()?;
    tracing::debug!(path = %path.display(), ?config, "loaded tracker config");
    Ok(config)
}

fn run_scenario(
    kind: ScenarioKind,
    seed: u64,
    config: TrackerConfig,
    output_path: Option<&Path>,
    replay_path: Option<&Path>,
    debug_dir: Option<&Path>,
) -> Result<()> {
    let scenario = Scenario::build(kind, seed);
    println!(
        "Running scenario '{}' (seed={}, duration={:.0}s)...",
        scenario.name, seed, scenario.duration
    );

    let log = scenario.record()?;
    println!(
        "Recorded {} events, {} ground-truth frames",
        log.events.len(),
        log.ground_truth.len()
    );

    if let Some(rpath) = replay_path {
        save_replay(&log, rpath)?;
        println!("Replay saved to {}", rpath.display());
    }

    evaluate(&log, config, output_path, debug_dir)
}

fn run_replay(
    input: &Path,
    config: TrackerConfig,
    output_path: Option<&Path>,
    debug_dir: Option<&Path>,
) -> Result<()> {
    let log = load_replay(input)?;
    println!(
        "Replaying '{}' ({} events)...",
        log.scenario_name,
        log.events.len()
    );
    evaluate(&log, config, output_path, debug_dir)
}

fn evaluate(
    log: &ReplayLog,
    config: TrackerConfig,
    output_path: Option<&Path>,
    debug_dir: Option<&Path>,
) -> Result<()> {
    let start = std::time::Instant::now();
    let outcome = match debug_dir {
        Some(dir) => replay_with_sink(log, config, JsonFrameSink::new(dir, DEBUG_FRAMES_RETAINED)?)?,
        None => replay(log, config)?,
    };
    let elapsed = start.elapsed();

    print_summary(&outcome, elapsed.as_secs_f64());

    if let Some(opath) = output_path {
        let json = serde_json::json!({
            "scenario": log.scenario_name,
            "seed": log.seed,
            "elapsed_s": elapsed.as_secs_f64(),
            "events_processed": outcome.events_processed,
            "events_rejected": outcome.events_rejected,
            "accuracy": outcome.metrics.accuracy(),
            "metrics": outcome.metrics,
            "final_estimates": outcome.estimates,
        });
        std::fs::write(opath, serde_json::to_string_pretty(&json)?)?;
        println!("Metrics saved to {}", opath.display());
    }

    Ok(())
}

fn percent(ratio: Option<f64>) -> String {
    ratio.map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", r * 100.0))
}

fn print_summary(outcome: &ReplayOutcome, elapsed_s: f64) {
    let m = &outcome.metrics;
    println!(
        "Done: {} events ({} rejected), {} frames, elapsed={:.2}s",
        outcome.events_processed, outcome.events_rejected, m.frames, elapsed_s,
    );
    println!(
        "Accuracy: {} over {} pairs, {} missing, {} flips",
        percent(m.accuracy()),
        m.pairs,
        m.missing,
        m.flips,
    );
    for (person, acc) in &m.per_person {
        println!("  {:<12} {}", person.as_str(), percent(acc.accuracy()));
    }
    for (person, room) in &outcome.estimates {
        let generic = outcome
            .snapshot
            .persons
            .get(person)
            .is_some_and(|p| p.generic);
        println!(
            "  {:<12} -> {}{}",
            person.as_str(),
            room,
            if generic { " (generic)" } else { "" }
        );
    }
    if let Some(stats) = outcome.sink {
        println!(
            "Debug frames: {} queued, {} dropped, {} failed",
            stats.frames_sent, stats.frames_dropped, stats.sink_failures
        );
    }
}
