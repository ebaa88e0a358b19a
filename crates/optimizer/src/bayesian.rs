use crate::error::{OptimizerError, OracleError};
use crate::oracle::{Oracle, RandomSearchOracle, TpeOracle};
use crate::progress::{Trial, TrialSender};
use crate::space::{Candidate, SearchSpace};
use backtester::{BacktestError, BacktestResult, BacktestStrategy, RunFailure};
use configuration::{Config, OracleKind, RunConfig};
use core_types::{CoreError, StrategyParams, TargetParams};
use market::Portfolio;
use rayon::prelude::*;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// The highest-value trial seen during a search.
#[derive(Debug, Clone, PartialEq)]
pub struct BestTrial {
    pub index: usize,
    pub value: Decimal,
    pub params: StrategyParams,
    pub portfolio: Portfolio,
}

/// A trial that produced no usable result. The search continued past it.
#[derive(Debug, Clone)]
pub struct TrialFailure {
    pub index: usize,
    /// The oracle's proposal, if it got that far.
    pub candidate: Option<Candidate>,
    pub reason: String,
    /// Account state when the backtest stopped, if it started.
    pub portfolio: Option<Portfolio>,
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    /// Negated objective of the oracle's best point.
    pub best_value: Option<f64>,
    /// The oracle's best point merged with the fixed constants.
    pub best_params: Option<StrategyParams>,
    /// Tracked maximum of `total_value` over the completed trials. Usually the same
    /// trial as `best_params`, but derived independently.
    pub best: Option<BestTrial>,
    /// Completed trials, in index order. A trial index appears here or in
    /// `failures`, never in both.
    pub trials: Vec<Trial>,
    pub failures: Vec<TrialFailure>,
    pub cancelled: bool,
}

/// Sequential model-based search over a strategy's parameters.
///
/// Every trial merges the oracle's proposal with the fixed constants, runs
/// `reset_all` + `backtest`, and reports `-total_value` back to the oracle.
#[derive(Debug, Clone)]
pub struct BayesianSearch {
    target: TargetParams,
    start_cash: Decimal,
    start_coin: Decimal,
    n_calls: usize,
    random_state: u64,
    oracle: OracleKind,
    n_initial_points: usize,
    gamma: f64,
    run: RunConfig,
}

impl BayesianSearch {
    pub fn new(
        target: TargetParams,
        start_cash: Decimal,
        start_coin: Decimal,
        n_calls: usize,
        random_state: u64,
    ) -> Self {
        Self {
            target,
            start_cash,
            start_coin,
            n_calls,
            random_state,
            oracle: OracleKind::default(),
            n_initial_points: 10,
            gamma: 0.25,
            run: RunConfig::default(),
        }
    }

    /// Everything from the `[backtest]`, `[optimizer]` and `[run]` tables.
    pub fn from_config(config: &Config) -> Self {
        let opt = &config.optimizer;
        Self::new(
            opt.target.clone(),
            config.backtest.start_cash,
            config.backtest.start_coin,
            opt.n_calls,
            opt.random_state,
        )
        .with_oracle(opt.oracle)
        .with_initial_points(opt.n_initial_points)
        .with_gamma(opt.gamma)
        .with_run_config(config.run)
    }

    pub fn with_oracle(mut self, oracle: OracleKind) -> Self {
        self.oracle = oracle;
        self
    }

    pub fn with_initial_points(mut self, n: usize) -> Self {
        self.n_initial_points = n;
        self
    }

    /// Good-trial share for the TPE oracle.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    pub fn with_run_config(mut self, run: RunConfig) -> Self {
        self.run = run;
        self
    }

    pub fn n_calls(&self) -> usize {
        self.n_calls
    }

    pub fn space(&self) -> Result<SearchSpace, OptimizerError> {
        Ok(SearchSpace::from_target(&self.target)?)
    }

    /// The configured oracle, seeded with `random_state`.
    pub fn build_oracle(&self, space: &SearchSpace) -> Box<dyn Oracle> {
        match self.oracle {
            OracleKind::Tpe => Box::new(
                TpeOracle::new(space, self.random_state, self.n_initial_points).with_gamma(self.gamma),
            ),
            OracleKind::Random => Box::new(RandomSearchOracle::new(space, self.random_state)),
        }
    }

    /// Runs `n_calls` trials on `strategy` with the configured oracle.
    pub fn backtest(
        &self,
        strategy: &mut BacktestStrategy,
        observer: Option<&TrialSender>,
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome, OptimizerError> {
        let space = self.space()?;
        let mut oracle = self.build_oracle(&space);
        self.backtest_with_oracle(strategy, oracle.as_mut(), &space, observer, cancel)
    }

    /// Runs `n_calls` trials on `strategy`, proposing candidates with `oracle`.
    ///
    /// Fails before the first trial if the target leaves a required key unset.
    /// Afterwards, a failing trial is recorded and the search continues.
    pub fn backtest_with_oracle(
        &self,
        strategy: &mut BacktestStrategy,
        oracle: &mut dyn Oracle,
        space: &SearchSpace,
        observer: Option<&TrialSender>,
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome, OptimizerError> {
        self.validate(strategy, space)?;
        info!(
            generator = strategy.generator_name(),
            executor = strategy.executor_name(),
            oracle = oracle.name(),
            n_calls = self.n_calls,
            dimensions = space.len(),
            "starting bayesian search"
        );

        let mut tracker = Tracker::new(observer);
        for index in 0..self.n_calls {
            if cancel.load(Ordering::Relaxed) {
                tracker.cancelled = true;
                break;
            }
            info!("Running test {}/{}", index + 1, self.n_calls);

            let candidate = match oracle.ask() {
                Ok(c) => c,
                Err(e) => {
                    tracker.fail(index, None, e.to_string(), None);
                    continue;
                }
            };
            let params = match space.merge(&candidate) {
                Ok(p) => p,
                Err(e) => {
                    tracker.fail(index, Some(candidate), e.to_string(), None);
                    continue;
                }
            };
            let outcome = evaluate(strategy, &params, self.start_cash, self.start_coin, &self.run, cancel);
            if !tracker.complete(index, candidate, params, outcome, oracle) {
                break;
            }
        }
        Ok(tracker.finish(oracle, space))
    }

    /// Runs the search in rounds of `batch` candidates evaluated in parallel, each on a
    /// freshly built strategy. Results are told to the oracle in trial order.
    pub fn backtest_parallel<F>(
        &self,
        build: F,
        batch: usize,
        observer: Option<&TrialSender>,
        cancel: &AtomicBool,
    ) -> Result<SearchOutcome, OptimizerError>
    where
        F: Fn() -> Result<BacktestStrategy, BacktestError> + Sync,
    {
        let space = self.space()?;
        self.validate(&build()?, &space)?;
        let mut oracle = self.build_oracle(&space);
        let batch = batch.max(1);
        let mut tracker = Tracker::new(observer);
        let mut index = 0;

        while index < self.n_calls && !tracker.cancelled {
            if cancel.load(Ordering::Relaxed) {
                tracker.cancelled = true;
                break;
            }
            let k = batch.min(self.n_calls - index);
            let candidates = match oracle.ask_batch(k) {
                Ok(c) => c,
                Err(e) => {
                    for i in index..index + k {
                        tracker.fail(i, None, e.to_string(), None);
                    }
                    index += k;
                    continue;
                }
            };

            let mut jobs = Vec::with_capacity(k);
            for (offset, candidate) in candidates.into_iter().enumerate() {
                match space.merge(&candidate) {
                    Ok(params) => jobs.push((index + offset, candidate, params)),
                    Err(e) => tracker.fail(index + offset, Some(candidate), e.to_string(), None),
                }
            }

            let outcomes: Vec<Result<BacktestResult, RunFailure>> = jobs
                .par_iter()
                .map(|(_, _, params)| match build() {
                    Ok(mut strategy) => {
                        evaluate(&mut strategy, params, self.start_cash, self.start_coin, &self.run, cancel)
                    }
                    Err(error) => Err(RunFailure {
                        step: 0,
                        portfolio: Portfolio::default(),
                        error,
                    }),
                })
                .collect();

            for ((i, candidate, params), outcome) in jobs.into_iter().zip(outcomes) {
                if !tracker.complete(i, candidate, params, outcome, oracle.as_mut()) {
                    break;
                }
            }
            index += k;
        }
        Ok(tracker.finish(oracle.as_ref(), &space))
    }

    fn validate(&self, strategy: &BacktestStrategy, space: &SearchSpace) -> Result<(), OptimizerError> {
        if self.n_calls == 0 {
            return Err(CoreError::invalid_parameter("n_calls", "must be at least 1").into());
        }
        let missing: Vec<String> = strategy
            .default_params()
            .keys()
            .filter(|k| !space.covers(k))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(CoreError::invalid_parameter(
                missing.join(", "),
                "optimization target does not supply this parameter",
            )
            .into());
        }
        Ok(())
    }
}

fn evaluate(
    strategy: &mut BacktestStrategy,
    params: &StrategyParams,
    start_cash: Decimal,
    start_coin: Decimal,
    run: &RunConfig,
    cancel: &AtomicBool,
) -> Result<BacktestResult, RunFailure> {
    if let Err(error) = strategy.reset_all(params, start_cash, start_coin) {
        return Err(RunFailure {
            step: 0,
            portfolio: strategy.market().portfolio().clone(),
            error,
        });
    }
    strategy.backtest_with_cancel(run, &[], cancel)
}

/// Bookkeeping shared by the sequential and the batched search.
struct Tracker<'a> {
    observer: Option<&'a TrialSender>,
    best: Option<BestTrial>,
    trials: Vec<Trial>,
    failures: Vec<TrialFailure>,
    cancelled: bool,
}

impl<'a> Tracker<'a> {
    fn new(observer: Option<&'a TrialSender>) -> Self {
        Self {
            observer,
            best: None,
            trials: Vec::new(),
            failures: Vec::new(),
            cancelled: false,
        }
    }

    fn fail(&mut self, index: usize, candidate: Option<Candidate>, reason: String, portfolio: Option<Portfolio>) {
        warn!(index, ?candidate, reason = %reason, "trial failed");
        self.failures.push(TrialFailure {
            index,
            candidate,
            reason,
            portfolio,
        });
    }

    /// Records one evaluated trial. Returns `false` once the search was cancelled.
    fn complete(
        &mut self,
        index: usize,
        candidate: Candidate,
        params: StrategyParams,
        outcome: Result<BacktestResult, RunFailure>,
        oracle: &mut dyn Oracle,
    ) -> bool {
        let result = match outcome {
            Ok(r) => r,
            Err(failure) if matches!(failure.error, BacktestError::Cancelled) => {
                self.cancelled = true;
                return false;
            }
            Err(failure) => {
                self.fail(index, Some(candidate), failure.to_string(), Some(failure.portfolio));
                return true;
            }
        };

        // A trial the oracle did not accept is a failure only, never a completed trial.
        let total_value = result.total_value();
        let told = match total_value.to_f64() {
            Some(v) => oracle.tell(candidate.clone(), -v),
            None => Err(OracleError::NonFiniteObjective(f64::NAN)),
        };
        if let Err(e) = told {
            self.fail(index, Some(candidate), e.to_string(), Some(result.portfolio));
            return true;
        }

        if self.best.as_ref().is_none_or(|b| total_value > b.value) {
            self.best = Some(BestTrial {
                index,
                value: total_value,
                params: params.clone(),
                portfolio: result.portfolio.clone(),
            });
        }
        let best_value = self.best.as_ref().map_or(total_value, |b| b.value);

        let trial = Trial {
            index,
            params,
            total_value,
            trade_count: result.trade_count(),
            best_value,
        };
        info!(
            index,
            params = %trial.params,
            total_value = %trial.total_value,
            trade_count = trial.trade_count,
            best_value = %trial.best_value,
            "trial finished"
        );
        if let Some(observer) = self.observer {
            observer.send(trial.clone());
        }
        self.trials.push(trial);
        true
    }

    fn finish(self, oracle: &dyn Oracle, space: &SearchSpace) -> SearchOutcome {
        let (best_value, best_params) = match oracle.best() {
            Some((point, objective)) => match space.merge(point) {
                Ok(params) => (Some(-objective), Some(params)),
                Err(e) => {
                    warn!(error = %e, "oracle best point does not fit the search space");
                    (Some(-objective), None)
                }
            },
            None => (None, None),
        };
        if let Some(value) = best_value {
            info!(best_value = value, "search finished");
        }
        SearchOutcome {
            best_value,
            best_params,
            best: self.best,
            trials: self.trials,
            failures: self.failures,
            cancelled: self.cancelled,
        }
    }
}
