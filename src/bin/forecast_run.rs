//! Forecast Runner CLI
//!
//! Entrypoint for producing scenario staking forecasts from recorded or
//! synthetic history.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin forecast_run -- --synthetic-days 90 --months 6 --pretty
//!
//! cargo run --bin forecast_run -- \
//!   --history history.json \
//!   --execution fees.json \
//!   --months 12 \
//!   --output forecast.json
//! ```
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 2: Configuration or validation error
//! - 3: Runtime error (I/O, serialization)

use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::process::ExitCode;

use stakecast::engine::protocol::{self, RealisticAprParams};
use stakecast::engine::RegimeWindowStats;
use stakecast::synthetic::{self, SyntheticHistoryParams};
use stakecast::{
    ExecutionDataPoint, ForecastError, HistoricalDataPoint, ProtocolState, RegimeConfig,
    RegimeDetection, RegimeDetector, ScenarioEngine, ScenarioForecasts, ScenarioSummary,
};

/// Fraction of duties assumed performed for the realistic APR readout.
const DEFAULT_PARTICIPATION: f64 = 0.995;

// =============================================================================
// CLI ARGUMENTS
// =============================================================================

/// Scenario staking forecaster
#[derive(Parser, Debug)]
#[command(name = "forecast_run")]
#[command(about = "Generate baseline/bullish/bearish staking forecasts")]
struct Cli {
    /// Path to historical stake data (JSON array)
    #[arg(long)]
    history: Option<PathBuf>,

    /// Path to execution-layer fee data (JSON array)
    #[arg(long)]
    execution: Option<PathBuf>,

    /// Generate a synthetic history of this many days instead of loading files
    #[arg(long)]
    synthetic_days: Option<u32>,

    /// Seed for synthetic generation
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Forecast horizon in months (1-12)
    #[arg(long, short, default_value = "6")]
    months: u32,

    /// Regime table overrides (TOML); falls back to STAKECAST_REGIME_CONFIG
    #[arg(long)]
    regime_config: Option<PathBuf>,

    /// Output JSON path (stdout if not specified)
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Pretty-print the output JSON
    #[arg(long)]
    pretty: bool,

    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

// =============================================================================
// RESULT OUTPUT
// =============================================================================

#[derive(Debug, Clone, Serialize)]
struct ForecastRunOutput {
    config: ConfigSummary,
    current: CurrentStateReport,
    regime: RegimeReport,
    forecasts: ScenarioForecasts,
}

#[derive(Debug, Clone, Serialize)]
struct ConfigSummary {
    months_ahead: u32,
    data_source: String,
    regime_config_path: Option<String>,
}

/// Protocol readout at the forecast anchor.
#[derive(Debug, Clone, Serialize)]
struct CurrentStateReport {
    total_staked: f64,
    stake_ratio: f64,
    active_validators: u64,
    theoretical_apr: f64,
    realistic_apr: f64,
    churn_limit: u64,
    entry_queue_length: u64,
    entry_wait_days: f64,
    exit_queue_length: u64,
    exit_wait_days: f64,
}

impl CurrentStateReport {
    fn from_state(state: &ProtocolState) -> Self {
        Self {
            total_staked: state.total_staked,
            stake_ratio: state.stake_ratio(),
            active_validators: state.active_validators,
            theoretical_apr: state.theoretical_apr(),
            realistic_apr: state.realistic_apr(RealisticAprParams::default()),
            churn_limit: state.churn_limit(),
            entry_queue_length: state.entry_queue_length,
            entry_wait_days: protocol::epochs_to_days(state.activation_wait_epochs()),
            exit_queue_length: state.exit_queue_length,
            exit_wait_days: protocol::epochs_to_days(state.exit_wait_epochs()),
        }
    }
}

/// Fee-regime readout over the trailing execution window.
#[derive(Debug, Clone, Serialize)]
struct RegimeReport {
    detection: RegimeDetection,
    window: RegimeWindowStats,
}

// =============================================================================
// DATA LOADING
// =============================================================================

fn load_history(path: &PathBuf) -> Result<Vec<HistoricalDataPoint>> {
    let file =
        File::open(path).with_context(|| format!("opening history file {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing history file {}", path.display()))
}

fn load_execution(path: &PathBuf) -> Result<Vec<ExecutionDataPoint>> {
    let file =
        File::open(path).with_context(|| format!("opening execution file {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing execution file {}", path.display()))
}

fn gather_data(cli: &Cli) -> Result<(Vec<HistoricalDataPoint>, Vec<ExecutionDataPoint>, String)> {
    if let Some(days) = cli.synthetic_days {
        let params = SyntheticHistoryParams {
            days,
            seed: cli.seed,
            ..SyntheticHistoryParams::default()
        };
        let (history, execution) = synthetic::generate(&params);
        let label = format!("synthetic (days={}, seed={})", days, cli.seed);
        return Ok((history, execution, label));
    }

    let Some(history_path) = &cli.history else {
        bail!("either --history or --synthetic-days is required");
    };
    let history = load_history(history_path)?;
    let (execution, exec_label) = match &cli.execution {
        Some(path) => (load_execution(path)?, path.display().to_string()),
        None => (Vec::new(), "none".to_string()),
    };
    let label = format!(
        "files (history={}, execution={})",
        history_path.display(),
        exec_label
    );
    Ok((history, execution, label))
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    let cli = Cli::parse();

    let directive = if cli.verbose {
        "forecast_run=debug,stakecast=debug"
    } else {
        "forecast_run=info,stakecast=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(directive.parse().unwrap()),
        )
        .init();

    // Configuration stage: anything wrong here is the caller's fault.
    let config = match validate_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {:#}", e);
            return ExitCode::from(2);
        }
    };

    match run(&cli, config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            if e.downcast_ref::<ForecastError>().is_some() {
                ExitCode::from(2)
            } else {
                ExitCode::from(3)
            }
        }
    }
}

fn validate_config(cli: &Cli) -> Result<RegimeConfig> {
    if !(1..=12).contains(&cli.months) {
        bail!("--months must lie in 1..=12, got {}", cli.months);
    }
    if cli.synthetic_days.is_some() && cli.history.is_some() {
        bail!("--synthetic-days and --history are mutually exclusive");
    }
    if cli.history.is_none() && cli.execution.is_some() {
        bail!("--execution requires --history");
    }

    let config = match &cli.regime_config {
        Some(path) => RegimeConfig::load(path)?,
        None => RegimeConfig::from_env(),
    };
    config.validate()?;
    Ok(config)
}

fn run(cli: &Cli, config: RegimeConfig) -> Result<()> {
    let (history, execution, data_source) = gather_data(cli)?;

    let latest = history
        .iter()
        .max_by_key(|p| p.timestamp)
        .ok_or(ForecastError::EmptyHistory)?;
    let state = ProtocolState::from_history_point(latest, DEFAULT_PARTICIPATION);
    let current = CurrentStateReport::from_state(&state);
    print_current_state(&current);

    let detector = RegimeDetector::new(config);
    let regime = RegimeReport {
        detection: detector.detect(&execution, state.active_validators),
        window: detector.window_stats(&execution, state.active_validators),
    };
    print_regime(&regime);

    let engine = ScenarioEngine::new(config)?;
    let forecasts = engine.run(&history, &execution, cli.months)?;
    print_scenario_table(&forecasts);

    let output = ForecastRunOutput {
        config: ConfigSummary {
            months_ahead: cli.months,
            data_source,
            regime_config_path: cli.regime_config.as_ref().map(|p| p.display().to_string()),
        },
        current,
        regime,
        forecasts,
    };
    write_output(cli, &output)
}

fn write_output(cli: &Cli, output: &ForecastRunOutput) -> Result<()> {
    match &cli.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("creating output file {}", path.display()))?;
            let writer = BufWriter::new(file);
            if cli.pretty {
                serde_json::to_writer_pretty(writer, output).context("writing forecast JSON")?;
            } else {
                serde_json::to_writer(writer, output).context("writing forecast JSON")?;
            }
            eprintln!("Forecast written to: {}", path.display());
        }
        None => {
            let json = if cli.pretty {
                serde_json::to_string_pretty(output)?
            } else {
                serde_json::to_string(output)?
            };
            println!("{}", json);
        }
    }
    Ok(())
}

// =============================================================================
// REPORT PRINTING
// =============================================================================

fn print_current_state(current: &CurrentStateReport) {
    eprintln!("Current protocol state");
    eprintln!(
        "  Total staked:    {:>14.0} ETH  ({:.2}% of supply)",
        current.total_staked, current.stake_ratio
    );
    eprintln!("  Validators:      {:>14}", current.active_validators);
    eprintln!("  Theoretical APR: {:>13.2}%", current.theoretical_apr);
    eprintln!("  Realistic APR:   {:>13.2}%", current.realistic_apr);
    eprintln!(
        "  Churn limit:     {:>14}  validators/epoch",
        current.churn_limit
    );
    eprintln!(
        "  Entry queue:     {:>14}  (~{:.1} days)",
        current.entry_queue_length, current.entry_wait_days
    );
    eprintln!(
        "  Exit queue:      {:>14}  (~{:.1} days)",
        current.exit_queue_length, current.exit_wait_days
    );
}

fn print_regime(regime: &RegimeReport) {
    let d = &regime.detection;
    let w = &regime.window;
    eprintln!(
        "  Fee regime:      {:>14}  (confidence {:.2}, {} days, mean {:.5} ETH/validator/day over {} samples)",
        d.current_regime.as_str(),
        d.confidence,
        d.days_in_regime,
        w.mean_yield,
        w.samples
    );
}

fn print_scenario_table(forecasts: &ScenarioForecasts) {
    eprintln!();
    eprintln!(
        "  {:<10} {:>7} {:>16} {:>9} {:>8} {:>8}",
        "scenario", "months", "final stake", "ratio", "APR", "max APR"
    );
    for (name, points) in forecasts.named() {
        let summary = ScenarioSummary::from_points(points);
        eprintln!(
            "  {:<10} {:>7} {:>12.0} ETH {:>8.2}% {:>7.2}% {:>7.2}%",
            name,
            summary.points,
            summary.final_total_staked,
            summary.final_stake_ratio,
            summary.final_apr,
            summary.max_apr
        );
    }
}
