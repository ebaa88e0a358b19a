use backtester::{BacktestError, BacktestResult, BacktestStrategy, RunFailure};
use configuration::RunConfig;
use core_types::StrategyParams;
use rayon::prelude::*;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// One parameter set and what running it produced.
#[derive(Debug)]
pub struct GridRun {
    pub params: StrategyParams,
    pub outcome: Result<BacktestResult, RunFailure>,
}

/// Runs an explicit, ordered list of parameter sets. Results keep the input order and
/// are not ranked.
#[derive(Debug, Clone)]
pub struct GridSearch {
    param_sets: Vec<StrategyParams>,
    start_cash: Decimal,
    start_coin: Decimal,
    run: RunConfig,
}

impl GridSearch {
    pub fn new(param_sets: Vec<StrategyParams>, start_cash: Decimal, start_coin: Decimal) -> Self {
        Self {
            param_sets,
            start_cash,
            start_coin,
            run: RunConfig::default(),
        }
    }

    pub fn with_run_config(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    pub fn param_sets(&self) -> &[StrategyParams] {
        &self.param_sets
    }

    pub fn len(&self) -> usize {
        self.param_sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.param_sets.is_empty()
    }

    /// Runs every set on `strategy`, one after another.
    ///
    /// A failing set is recorded and the grid moves on. Cancellation stops the grid
    /// before the next set; sets not reached are absent from the output.
    pub fn run(&self, strategy: &mut BacktestStrategy, cancel: &AtomicBool) -> Vec<GridRun> {
        let total = self.param_sets.len();
        let mut runs = Vec::with_capacity(total);
        for (i, params) in self.param_sets.iter().enumerate() {
            if cancel.load(Ordering::Relaxed) {
                info!(completed = i, total, "grid search cancelled");
                break;
            }
            info!("Running test {}/{}", i + 1, total);
            let outcome = self.evaluate(strategy, params, cancel);
            runs.push(self.record(i, params, outcome));
        }
        runs
    }

    /// Runs the sets on the rayon pool, one freshly built strategy per set.
    ///
    /// Output order matches input order. Sets not started before cancellation are
    /// absent from the output.
    pub fn run_parallel<F>(&self, build: F, cancel: &AtomicBool) -> Vec<GridRun>
    where
        F: Fn() -> Result<BacktestStrategy, BacktestError> + Sync,
    {
        info!(
            sets = self.param_sets.len(),
            threads = rayon::current_num_threads(),
            "starting parallel grid search"
        );
        self.param_sets
            .par_iter()
            .enumerate()
            .filter_map(|(i, params)| {
                if cancel.load(Ordering::Relaxed) {
                    return None;
                }
                let outcome = match build() {
                    Ok(mut strategy) => self.evaluate(&mut strategy, params, cancel),
                    Err(error) => Err(RunFailure {
                        step: 0,
                        portfolio: Default::default(),
                        error,
                    }),
                };
                Some(self.record(i, params, outcome))
            })
            .collect()
    }

    fn evaluate(
        &self,
        strategy: &mut BacktestStrategy,
        params: &StrategyParams,
        cancel: &AtomicBool,
    ) -> Result<BacktestResult, RunFailure> {
        if let Err(error) = strategy.reset_all(params, self.start_cash, self.start_coin) {
            return Err(RunFailure {
                step: 0,
                portfolio: strategy.market().portfolio().clone(),
                error,
            });
        }
        strategy.backtest_with_cancel(&self.run, &[], cancel)
    }

    fn record(
        &self,
        index: usize,
        params: &StrategyParams,
        outcome: Result<BacktestResult, RunFailure>,
    ) -> GridRun {
        match &outcome {
            Ok(result) => info!(
                index,
                %params,
                total_value = %result.total_value(),
                trade_count = result.trade_count(),
                "grid set finished"
            ),
            Err(failure) => warn!(index, %params, error = %failure, "grid set failed"),
        }
        GridRun {
            params: params.clone(),
            outcome,
        }
    }
}
