//! FluMap Simulator CLI
//!
//! Runs the deterministic view scenarios, or renders one frame against a
//! live backend.

use clap::Parser;
use flumap_core::{ChoroplethView, MapConfig, RefreshOutcome, Selection, ViewportClass};
use flumap_env::{HttpTransport, TokioContext};
use flumap_sim::scenarios::ScenarioId;
use flumap_sim::{ScenarioResult, ScenarioRunner};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// FluMap choropleth view simulator
#[derive(Parser, Debug)]
#[command(name = "flumap-sim")]
#[command(about = "Run deterministic simulation tests for the FluMap view", long_about = None)]
struct Args {
    /// Master seed for determinism (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Scenario to run (nation_view, state_zoom, county_zoom, flaky_backend,
    /// backend_down, rapid_reselect, malformed_body, chaos, all)
    #[arg(short = 'S', long, default_value = "all")]
    scenario: String,

    /// Number of consecutive seeds to test (for CI mode)
    #[arg(long, default_value = "1")]
    seeds: usize,

    /// Render for a compact (narrow) viewport
    #[arg(long)]
    compact: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for CI parsing
    #[arg(long)]
    json: bool,

    /// Write the final frame of a single scenario to this file
    #[arg(long)]
    export: Option<String>,

    /// Fetch one frame from a live backend instead of simulating
    /// (defaults to FLUMAP_BACKEND_URL)
    #[arg(long, num_args = 0..=1, default_missing_value = "")]
    live: Option<String>,

    /// State for --live
    #[arg(long)]
    state: Option<String>,

    /// County for --live
    #[arg(long)]
    county: Option<String>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Renders one frame against a real backend and prints it as JSON.
fn run_live(args: &Args, viewport: ViewportClass) -> ExitCode {
    let mut config = MapConfig::from_env().with_viewport(viewport);
    if let Some(url) = args.live.as_deref().filter(|u| !u.is_empty()) {
        config = config.with_backend_url(url);
    }
    let selection = Selection::new(args.state.as_deref(), args.county.as_deref());

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Fetching {} from {}", selection, config.backend_url);
    let view = ChoroplethView::new(
        TokioContext::shared(),
        Arc::new(HttpTransport::new(config.backend_url.clone())),
        &config,
    );
    match runtime.block_on(view.refresh(selection)) {
        RefreshOutcome::Committed { .. } => {}
        RefreshOutcome::Failed { error, .. } => {
            error!("{}", flumap_core::view::failure_message(&error));
            return ExitCode::FAILURE;
        }
        RefreshOutcome::Discarded { .. } => return ExitCode::FAILURE,
    }

    let Some(spec) = view.current_spec() else {
        return ExitCode::FAILURE;
    };
    match spec.to_json_pretty() {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Failed to serialize frame: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn export(result: &ScenarioResult, path: &str) -> Result<(), String> {
    let spec = result
        .final_spec
        .as_ref()
        .ok_or_else(|| "scenario ended without a frame".to_string())?;
    let json = spec.to_json_pretty().map_err(|e| e.to_string())?;
    std::fs::write(path, json).map_err(|e| e.to_string())
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    let viewport = ViewportClass::from_compact(args.compact);
    if args.live.is_some() {
        return run_live(&args, viewport);
    }

    if !args.json {
        info!("FluMap Simulator v0.1.0");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let scenarios: Vec<ScenarioId> = if args.scenario == "all" {
        ScenarioId::all()
    } else {
        match args.scenario.parse() {
            Ok(scenario) => vec![scenario],
            Err(e) => {
                eprintln!("Error: {}", e);
                let names: Vec<_> = ScenarioId::all().iter().map(|s| s.name()).collect();
                eprintln!("Available scenarios: {}, all", names.join(", "));
                return ExitCode::FAILURE;
            }
        }
    };

    if args.export.is_some() && (scenarios.len() > 1 || args.seeds > 1) {
        eprintln!("Error: --export only supports a single scenario and seed");
        return ExitCode::FAILURE;
    }

    let base_seed = if args.seed == 0 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(1)
    } else {
        args.seed
    };

    let mut all_results: Vec<ScenarioResult> = Vec::new();
    let mut failed_count = 0;

    for seed_offset in 0..args.seeds {
        let seed = base_seed.wrapping_add(seed_offset as u64);
        let runner = ScenarioRunner::new(seed).with_viewport(viewport);

        for scenario in &scenarios {
            let result = runner.run(*scenario);

            if !args.json {
                if result.passed {
                    info!("✓ {} (seed={}) PASSED", scenario.name(), seed);
                } else {
                    error!(
                        "✗ {} (seed={}) FAILED: {}",
                        scenario.name(),
                        seed,
                        result.failure_reason.as_deref().unwrap_or("unknown")
                    );
                }
            }

            if !result.passed {
                failed_count += 1;
            }

            all_results.push(result);
        }
    }

    if let (Some(path), Some(result)) = (&args.export, all_results.first()) {
        match export(result, path) {
            Ok(()) => info!("Exported final frame to {}", path),
            Err(e) => {
                error!("Failed to write export: {}", e);
                return ExitCode::FAILURE;
            }
        }
    }

    let total = all_results.len();
    let passed = total - failed_count;

    if args.json {
        let summary = serde_json::json!({
            "total": total,
            "passed": passed,
            "failed": failed_count,
            "results": all_results.iter().map(|r| {
                serde_json::json!({
                    "scenario": r.scenario.name(),
                    "seed": r.seed,
                    "passed": r.passed,
                    "virtual_time_secs": r.virtual_time_secs,
                    "metrics": r.metrics,
                    "failure_reason": r.failure_reason,
                })
            }).collect::<Vec<_>>(),
        });
        match serde_json::to_string_pretty(&summary) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize summary: {}", e),
        }
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

        if failed_count == 0 {
            info!("✅ All {} scenario runs passed!", total);
        } else {
            error!("❌ {}/{} scenario runs failed!", failed_count, total);
            for result in all_results.iter().filter(|r| !r.passed) {
                error!(
                    "  - {} seed={}: {}",
                    result.scenario.name(),
                    result.seed,
                    result.failure_reason.as_deref().unwrap_or("unknown")
                );
            }
        }
    }

    if failed_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
