mod data;

use anyhow::{bail, Context};
use backtester::{BacktestError, BacktestStrategy, ResultSummary, StrategyHandle};
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{init_tracing, load_config, load_grid_config, Config};
use core_types::{ParamEntry, PriceSeries, StrategyParams, TargetParams};
use indicatif::{ProgressBar, ProgressStyle};
use market::SimulatedMarket;
use optimizer::{generate_parameter_sets, trial_channel, BayesianSearch, GridSearch};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use strategies::ComponentRegistry;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

/// The main entry point for the trading simulator.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Execute the appropriate command
    match cli.command {
        Commands::Backtest(args) => handle_backtest(args),
        Commands::Optimize(args) => handle_optimize(args).await,
        Commands::Grid(args) => handle_grid(args).await,
        Commands::Components => {
            print_components(&ComponentRegistry::with_builtins());
            Ok(())
        }
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Backtest and optimize trading strategies against historical prices.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one backtest with the configured parameters.
    Backtest(BacktestArgs),
    /// Search the configured target parameters for the highest final value.
    Optimize(RunArgs),
    /// Run every parameter combination of a grid file.
    Grid(GridArgs),
    /// List the available signal generators and trade executors.
    Components,
}

#[derive(Parser)]
struct RunArgs {
    /// Path to the TOML configuration file.
    #[arg(long, default_value = "config.toml")]
    config: String,

    /// CSV file with `timestamp,price` rows.
    #[arg(long)]
    prices: PathBuf,

    /// Write a JSON result summary into this directory.
    #[arg(long)]
    summary_dir: Option<PathBuf>,
}

#[derive(Parser)]
struct BacktestArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Diagnostic state key to record at every step; repeatable. Adds to the configured list.
    #[arg(long = "hold")]
    hold: Vec<String>,
}

#[derive(Parser)]
struct GridArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Grid definition in TOML.
    #[arg(long, default_value = "grid.toml")]
    grid: String,
}

// ==============================================================================
// Shared setup
// ==============================================================================

struct Session {
    config: Config,
    series: Arc<PriceSeries>,
    registry: ComponentRegistry,
}

impl Session {
    /// Loads the configuration and prices and installs logging.
    ///
    /// The returned guard flushes the log file when dropped.
    fn open(args: &RunArgs) -> anyhow::Result<(Self, Option<WorkerGuard>)> {
        let config = load_config(&args.config)
            .with_context(|| format!("Failed to load configuration from {}", args.config))?;
        let log_guard = init_tracing(&config.logging).context("Failed to initialize logging")?;
        let series = Arc::new(data::load_prices(&args.prices)?);
        let session = Self {
            config,
            series,
            registry: ComponentRegistry::with_builtins(),
        };
        Ok((session, log_guard))
    }

    fn build_strategy(&self) -> Result<BacktestStrategy, BacktestError> {
        build_strategy(&self.registry, &self.config, &self.series)
    }

    /// Component defaults overlaid by the configured `[backtest.params]`.
    fn base_params(&self) -> anyhow::Result<StrategyParams> {
        let strategy = self.build_strategy()?;
        Ok(strategy.default_params().merged(&self.config.backtest.params))
    }

    fn save_summary(
        &self,
        dir: &Path,
        params: StrategyParams,
        portfolio: market::Portfolio,
    ) -> anyhow::Result<()> {
        let summary = ResultSummary::new(
            &self.series,
            self.config.backtest.data_interval.clone(),
            &self.config.backtest.signal_generator,
            &self.config.backtest.trade_executor,
            params,
            portfolio,
        );
        let path = summary.save(dir).context("Failed to save result summary")?;
        println!("Result summary written to {}", path.display());
        Ok(())
    }
}

fn build_strategy(
    registry: &ComponentRegistry,
    config: &Config,
    series: &Arc<PriceSeries>,
) -> Result<BacktestStrategy, BacktestError> {
    let market = SimulatedMarket::new(series.clone(), config.market.clone());
    BacktestStrategy::from_registry(
        registry,
        &config.backtest.signal_generator,
        &config.backtest.trade_executor,
        Box::new(market),
    )
}

/// Sets the returned flag on the first Ctrl-C.
fn cancel_on_ctrl_c() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let signal_flag = flag.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current step.");
            signal_flag.store(true, Ordering::Relaxed);
        }
    });
    flag
}

fn progress_bar(len: u64) -> anyhow::Result<ProgressBar> {
    let progress_bar = ProgressBar::new(len);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
            .progress_chars("=>-"),
    );
    Ok(progress_bar)
}

// ==============================================================================
// Command Logic
// ==============================================================================

fn handle_backtest(args: BacktestArgs) -> anyhow::Result<()> {
    let (session, _log_guard) = Session::open(&args.run)?;
    let params = session.base_params()?;
    let mut hold = session.config.backtest.hold_params.clone();
    hold.extend(args.hold);

    let mut strategy = session.build_strategy()?;
    strategy.reset_all(&params, session.config.backtest.start_cash, session.config.backtest.start_coin)?;
    let result = strategy.backtest(&session.config.run, &hold)?;

    let mut table = Table::new();
    table.set_header(vec!["Metric", "Value"]);
    table.add_row(vec!["Generator".to_string(), strategy.generator_name().to_string()]);
    table.add_row(vec!["Executor".to_string(), strategy.executor_name().to_string()]);
    table.add_row(vec!["Parameters".to_string(), params.to_string()]);
    table.add_row(vec!["Total value".to_string(), result.total_value().to_string()]);
    table.add_row(vec!["Profit rate".to_string(), format!("{:.4}", result.portfolio.profit_rate)]);
    table.add_row(vec!["Cash".to_string(), result.portfolio.cash.to_string()]);
    table.add_row(vec!["Position".to_string(), result.portfolio.position.to_string()]);
    table.add_row(vec!["Open lots".to_string(), result.portfolio.positions_fx.len().to_string()]);
    table.add_row(vec!["Trades".to_string(), result.trade_count().to_string()]);
    println!("{table}");

    for (key, series) in &result.held {
        let defined = series.iter().flatten().count();
        let last = series.iter().rev().flatten().next();
        println!("held {key}: {defined}/{} steps defined, last = {last:?}", series.len());
    }

    if let Some(dir) = &args.run.summary_dir {
        session.save_summary(dir, params, result.portfolio)?;
    }
    Ok(())
}

async fn handle_optimize(args: RunArgs) -> anyhow::Result<()> {
    let (session, _log_guard) = Session::open(&args)?;

    // Unlisted keys fall back to the configured and default parameters.
    let mut target = TargetParams::from(session.base_params()?);
    for (key, entry) in session.config.optimizer.target.iter() {
        target = match entry {
            ParamEntry::Fixed(v) => target.fixed(key.clone(), v.clone()),
            ParamEntry::Tunable(spec) => target.tunable(key.clone(), spec.clone()),
        };
    }
    let mut config = session.config.clone();
    config.optimizer.target = target;
    let search = BayesianSearch::from_config(&config);
    if search.space()?.is_empty() {
        bail!("[optimizer.target] declares no tunable parameter");
    }

    let cancel = cancel_on_ctrl_c();
    let (tx, mut rx) = trial_channel(config.optimizer.channel_capacity);
    let progress = progress_bar(search.n_calls() as u64)?;

    let ui = progress.clone();
    let observer = tokio::spawn(async move {
        while let Some(trial) = rx.recv().await {
            ui.set_position(trial.index as u64 + 1);
            ui.set_message(format!("best {}", trial.best_value.round_dp(2)));
        }
    });

    let handle = StrategyHandle::new(session.build_strategy()?);
    let worker_cancel = cancel.clone();
    let outcome = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let mut strategy = handle.try_acquire()?;
        let outcome = search.backtest(&mut *strategy, Some(&tx), &worker_cancel);
        drop(tx);
        outcome.map_err(anyhow::Error::from)
    })
    .await
    .context("Optimization task panicked")??;

    observer.await.context("Progress task panicked")?;
    progress.finish_with_message("Optimization runs complete.");

    if outcome.cancelled {
        println!("Search cancelled after {} trials.", outcome.trials.len());
    }
    for failure in &outcome.failures {
        println!("Trial {} failed: {}", failure.index + 1, failure.reason);
    }

    let mut table = Table::new();
    table.set_header(vec!["", "Value", "Parameters"]);
    if let (Some(value), Some(params)) = (outcome.best_value, &outcome.best_params) {
        table.add_row(vec!["Oracle best".to_string(), format!("{value:.2}"), params.to_string()]);
    }
    if let Some(best) = &outcome.best {
        table.add_row(vec![
            format!("Best trial #{}", best.index + 1),
            best.value.to_string(),
            best.params.to_string(),
        ]);
    }
    println!("{table}");
    info!(trials = outcome.trials.len(), failures = outcome.failures.len(), "optimization finished");

    if let (Some(dir), Some(best)) = (&args.summary_dir, outcome.best) {
        session.save_summary(dir, best.params, best.portfolio)?;
    }
    Ok(())
}

async fn handle_grid(args: GridArgs) -> anyhow::Result<()> {
    let (session, _log_guard) = Session::open(&args.run)?;
    let session = Arc::new(session);
    let grid_config = load_grid_config(&args.grid)
        .with_context(|| format!("Failed to load grid from {}", args.grid))?;
    let sets = generate_parameter_sets(&grid_config, &session.base_params()?)?;
    println!("Running {} parameter sets.", sets.len());

    let grid = GridSearch::new(
        sets,
        session.config.backtest.start_cash,
        session.config.backtest.start_coin,
    )
    .with_run_config(session.config.run);
    let cancel = cancel_on_ctrl_c();

    let worker = session.clone();
    let runs = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        if grid_config.parallel {
            Ok(grid.run_parallel(|| worker.build_strategy(), &cancel))
        } else {
            let mut strategy = worker.build_strategy()?;
            Ok(grid.run(&mut strategy, &cancel))
        }
    })
    .await
    .context("Grid task panicked")??;

    let mut table = Table::new();
    table.set_header(vec!["#", "Parameters", "Total value", "Trades"]);
    for (i, run) in runs.iter().enumerate() {
        let (value, trades) = match &run.outcome {
            Ok(result) => (result.total_value().to_string(), result.trade_count().to_string()),
            Err(failure) => (format!("failed: {}", failure.error), "-".to_string()),
        };
        table.add_row(vec![(i + 1).to_string(), run.params.to_string(), value, trades]);
    }
    println!("{table}");
    Ok(())
}

fn print_components(registry: &ComponentRegistry) {
    let mut table = Table::new();
    table.set_header(vec!["Kind", "Name", "Default parameters"]);
    for name in registry.generator_names() {
        let defaults = registry
            .create_generator(name)
            .map(|g| g.default_params().to_string())
            .unwrap_or_else(|e| format!("unavailable: {e}"));
        table.add_row(vec!["generator", name, defaults.as_str()]);
    }
    for name in registry.executor_names() {
        let defaults = registry
            .create_executor(name)
            .map(|e| e.default_params().to_string())
            .unwrap_or_else(|e| format!("unavailable: {e}"));
        table.add_row(vec!["executor", name, defaults.as_str()]);
    }
    println!("{table}");
}
