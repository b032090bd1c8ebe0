//! Confluence CLI — simulate, optimize, walk-forward and sensitivity commands.
//!
//! Commands:
//! - `simulate` — run one parameter set over a CSV series
//! - `optimize` — random search on a train series, evaluate on a test series
//! - `walk-forward` — rolling or split walk-forward validation
//! - `sensitivity` — ±20% take-profit / stop-loss robustness table
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use confluence_core::domain::StrategyParams;
use confluence_core::engine::IndicatorSettings;
use confluence_runner::data_loader::parse_timestamp;
use confluence_runner::export::{to_json, write_artifacts, Artifacts};
use confluence_runner::period_returns::ReturnTables;
use confluence_runner::sensitivity::DEFAULT_FACTORS;
use confluence_runner::{
    load_csv, run_sensitivity, run_walk_forward, simulate_bars, train_test, Dataset, LoadOptions,
    LoadedData, Optimizer, PerformanceMetrics, RunConfig, SeriesData, WalkForwardPartitioner,
};

#[derive(Parser)]
#[command(
    name = "confluence",
    about = "Confluence — long/short RSI/MACD/Bollinger backtester with walk-forward optimization"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Common {
    /// CSV series: `timestamp,close` or with precomputed indicator columns.
    #[arg(long)]
    data: PathBuf,

    /// TOML run configuration. Defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Earliest timestamp to load (inclusive).
    #[arg(long)]
    start: Option<String>,

    /// Latest timestamp to load (inclusive).
    #[arg(long)]
    end: Option<String>,

    /// Output directory for artifacts.
    #[arg(long, default_value = "results")]
    out: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one parameter set and write the equity curve.
    Simulate {
        #[command(flatten)]
        common: Common,

        /// JSON parameter set (e.g. a `best_params.json`). Defaults to `[params]` from the config.
        #[arg(long)]
        params: Option<PathBuf>,
    },
    /// Optimize on `--data`, then evaluate the winner on `--test-data`.
    Optimize {
        #[command(flatten)]
        common: Common,

        /// Unseen series for out-of-sample evaluation.
        #[arg(long)]
        test_data: PathBuf,
    },
    /// Walk-forward validation over `--data`.
    WalkForward {
        #[command(flatten)]
        common: Common,
    },
    /// Perturb take-profit and stop-loss by ±20% and re-measure.
    Sensitivity {
        #[command(flatten)]
        common: Common,

        /// JSON parameter set. Defaults to `[params]` from the config.
        #[arg(long)]
        params: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Simulate { common, params } => run_simulate_cmd(&common, params.as_deref()),
        Commands::Optimize { common, test_data } => run_optimize_cmd(&common, &test_data),
        Commands::WalkForward { common } => run_walk_forward_cmd(&common),
        Commands::Sensitivity { common, params } => run_sensitivity_cmd(&common, params.as_deref()),
    }
}

// ─── Shared setup ───────────────────────────────────────────────────

fn load_config(common: &Common) -> Result<RunConfig> {
    match &common.config {
        Some(path) => RunConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => Ok(RunConfig::default()),
    }
}

fn parse_bound(raw: Option<&str>, flag: &str) -> Result<Option<NaiveDateTime>> {
    raw.map(|s| parse_timestamp(s).with_context(|| format!("invalid {flag} timestamp: {s}")))
        .transpose()
}

fn load_options(common: &Common) -> Result<LoadOptions> {
    Ok(LoadOptions {
        start: parse_bound(common.start.as_deref(), "--start")?,
        end: parse_bound(common.end.as_deref(), "--end")?,
    })
}

fn load_series(path: &Path, opts: &LoadOptions) -> Result<LoadedData> {
    let data = load_csv(path, opts).with_context(|| format!("failed to load {}", path.display()))?;
    info!(
        path = %path.display(),
        rows = data.len(),
        dataset_hash = %data.dataset_hash,
        "series loaded"
    );
    Ok(data)
}

fn load_params(path: Option<&Path>, config: &RunConfig) -> Result<StrategyParams> {
    let Some(path) = path else {
        return Ok(config.params);
    };
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let params: StrategyParams = serde_json::from_str(&text)
        .with_context(|| format!("failed to parse parameters in {}", path.display()))?;
    params
        .validate()
        .with_context(|| format!("invalid parameters in {}", path.display()))?;
    Ok(params)
}

/// Directory name: command plus a prefix of the config hash.
fn run_name(command: &str, config: &RunConfig) -> String {
    let id = config.run_id();
    format!("{command}_{}", &id[..12.min(id.len())])
}

// ─── Commands ───────────────────────────────────────────────────────

fn run_simulate_cmd(common: &Common, params_path: Option<&Path>) -> Result<()> {
    let config = load_config(common)?;
    let params = load_params(params_path, &config)?;
    let data = load_series(&common.data, &load_options(common)?)?;
    let bars = data.to_bars(&IndicatorSettings::from_params(&params))?;

    let run = simulate_bars(&bars, &params, &config.objective());
    print_metrics("Simulation", &run.metrics);
    println!("Fees paid:      {:.2}", run.result.total_fees);
    println!(
        "Still open:     {} long / {} short",
        run.result.open_longs, run.result.open_shorts
    );
    print_period_returns(&run.period_returns);

    let run_dir = write_artifacts(
        &common.out,
        &run_name("simulate", &config),
        &Artifacts {
            equity: Some(&run.equity),
            trades: Some(&run.result.trades),
            metrics: Some(&run.metrics),
            period_returns: Some(&run.period_returns),
            ..Artifacts::default()
        },
    )?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_optimize_cmd(common: &Common, test_path: &Path) -> Result<()> {
    let config = load_config(common)?;
    let opts = load_options(common)?;
    let train = load_series(&common.data, &opts)?;
    let test = load_series(test_path, &opts)?;

    let optimizer = config.final_search();
    info!(
        optimizer = optimizer.name(),
        trials = optimizer.trials(),
        policy = config.objective.policy.label(),
        "optimizing"
    );
    let outcome = train_test(
        train.dataset(),
        test.dataset(),
        &config.objective(),
        &optimizer,
        &config.search_space(),
    )?;

    println!();
    println!("=== Best Parameters ({} trials) ===", outcome.trials);
    println!("{}", to_json(&outcome.best_params)?);
    println!("Train score:    {:.4}", outcome.train_score);
    print_metrics("Out-of-sample", &outcome.test.metrics);
    print_period_returns(&outcome.test.period_returns);

    let run_dir = write_artifacts(
        &common.out,
        &run_name("optimize", &config),
        &Artifacts {
            equity: Some(&outcome.test.equity),
            trades: Some(&outcome.test.result.trades),
            metrics: Some(&outcome.test.metrics),
            period_returns: Some(&outcome.test.period_returns),
            ..Artifacts::default()
        },
    )?;
    let params_path = run_dir.join("best_params.json");
    std::fs::write(&params_path, to_json(&outcome.best_params)?)
        .with_context(|| format!("failed to write {}", params_path.display()))?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_walk_forward_cmd(common: &Common) -> Result<()> {
    let config = load_config(common)?;
    let space = config.search_space();
    let loaded = load_series(&common.data, &load_options(common)?)?;

    // Raw prices are enriched per trial only when the search moves indicator windows.
    let bars;
    let data = match &loaded.series {
        SeriesData::Prices(prices) if space.varies_indicators() => {
            Dataset::Prices(prices)
        }
        _ => {
            bars = loaded.to_bars(&IndicatorSettings::from_params(&config.params))?;
            Dataset::Bars(&bars)
        }
    };

    let partitioner = WalkForwardPartitioner::with_policy(
        data.len(),
        config.walk_forward.lengths()?,
        config.walk_forward.policy,
    )?;
    let report = run_walk_forward(
        data,
        &partitioner,
        &config.objective(),
        &config.window_search(),
        &space,
    );

    println!();
    println!("=== Walk-Forward ({} windows) ===", report.windows.len());
    for w in &report.windows {
        println!(
            "#{:<3} train {:>7}..{:<7} test {:>7}..{:<7} score {:>12.4}  test return {:>8.2}%  calmar {:>8.3}",
            w.index,
            w.train.start,
            w.train.end,
            w.test.start,
            w.test.end,
            w.train_score,
            w.test_metrics.total_return * 100.0,
            w.test_metrics.calmar,
        );
    }
    println!("Mean test Calmar:   {:.3}", report.mean_test_calmar);
    println!("Mean test Sharpe:   {:.3}", report.mean_test_sharpe);
    println!(
        "Compounded return:  {:.2}%",
        report.compounded_test_return * 100.0
    );

    let run_dir = write_artifacts(
        &common.out,
        &run_name("walk_forward", &config),
        &Artifacts {
            walk_forward: Some(&report),
            ..Artifacts::default()
        },
    )?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

fn run_sensitivity_cmd(common: &Common, params_path: Option<&Path>) -> Result<()> {
    let config = load_config(common)?;
    let params = load_params(params_path, &config)?;
    let data = load_series(&common.data, &load_options(common)?)?;
    let bars = data.to_bars(&IndicatorSettings::from_params(&params))?;

    let rows = run_sensitivity(&bars, &params, &config.objective(), &DEFAULT_FACTORS);

    println!();
    println!("=== Sensitivity (±20%) ===");
    println!(
        "{:<4} {:<10} {:>10} {:>12} {:>12} {:>8}",
        "Par", "Variation", "Value", "Return", "Max DD", "Sharpe"
    );
    for r in &rows {
        println!(
            "{:<4} {:<10} {:>10.4} {:>11.2}% {:>11.2}% {:>8.3}",
            r.parameter.label(),
            r.variation,
            r.value,
            r.total_return * 100.0,
            r.max_drawdown * 100.0,
            r.sharpe,
        );
    }

    let run_dir = write_artifacts(
        &common.out,
        &run_name("sensitivity", &config),
        &Artifacts {
            sensitivity: Some(&rows),
            ..Artifacts::default()
        },
    )?;
    println!("Artifacts saved to: {}", run_dir.display());
    Ok(())
}

// ─── Output ─────────────────────────────────────────────────────────

fn print_metrics(title: &str, m: &PerformanceMetrics) {
    println!();
    println!("=== {title} ===");
    println!("Final Value:    {:.2}", m.final_value);
    println!("Total Return:   {:.2}%", m.total_return * 100.0);
    println!("Annualized:     {:.2}%", m.annualized_return * 100.0);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown * 100.0);
    println!("Sharpe:         {:.3}", m.sharpe);
    println!("Sortino:        {:.3}", m.sortino);
    println!("Calmar:         {:.3}", m.calmar);
    println!("Win Rate:       {:.1}%", m.win_rate);
    println!("Trades:         {}", m.trade_count);
}

fn print_period_returns(tables: &ReturnTables) {
    println!();
    println!("--- Monthly ---");
    for r in &tables.monthly {
        println!("{}: {:+.4}%", r.period, r.return_pct);
    }
    println!("--- Quarterly ---");
    for r in &tables.quarterly {
        println!("{}: {:+.4}%", r.period, r.return_pct);
    }
    println!("--- Annual ---");
    for r in &tables.annual {
        println!("{}: {:+.4}%", r.period, r.return_pct);
    }
    println!("Total over period: {:+.4}%", tables.total_pct);
}
