use backtester::{BacktestError, BacktestStrategy};
use configuration::{MarketSettings, OracleKind};
use core_types::{CoreError, ParamSpec, ParamValue, PriceSeries, StrategyParams, TargetParams};
use market::SimulatedMarket;
use optimizer::{
    trial_channel, BayesianSearch, Candidate, GridSearch, Oracle, OracleError, OptimizerError,
    SearchSpace,
};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use strategies::{ComponentRegistry, MovingAverageCrossover, NormalExecutor};

fn wave_series() -> Arc<PriceSeries> {
    let prices = (0..150).map(|i| {
        let p = 100.0 + 10.0 * (i as f64 / 6.0).sin() + i as f64 * 0.05;
        Decimal::from_f64(p).unwrap().round_dp(2)
    });
    Arc::new(PriceSeries::from_prices(prices).unwrap())
}

fn build(series: &Arc<PriceSeries>) -> Result<BacktestStrategy, BacktestError> {
    BacktestStrategy::from_registry(
        &ComponentRegistry::with_builtins(),
        MovingAverageCrossover::NAME,
        NormalExecutor::NAME,
        Box::new(SimulatedMarket::new(series.clone(), MarketSettings::default())),
    )
}

fn target() -> TargetParams {
    TargetParams::new()
        .tunable("short_window", ParamSpec::Integer { low: 2, high: 5 })
        .tunable("long_window", ParamSpec::Integer { low: 6, high: 12 })
        .fixed("one_order_quantity", 1)
}

fn search(n_calls: usize, seed: u64) -> BayesianSearch {
    BayesianSearch::new(target(), dec!(10000), Decimal::ZERO, n_calls, seed).with_initial_points(4)
}

fn window_set(short: i64, long: i64) -> StrategyParams {
    StrategyParams::new()
        .with("short_window", short)
        .with("long_window", long)
        .with("one_order_quantity", 1)
}

/// Proposes a fixed list of candidates in order.
struct ListOracle {
    queue: Vec<Candidate>,
    told: Vec<(Candidate, f64)>,
    /// Candidates `tell` refuses.
    refused: Vec<Candidate>,
}

impl ListOracle {
    fn new(queue: Vec<Candidate>) -> Self {
        Self { queue, told: Vec::new(), refused: Vec::new() }
    }
}

impl Oracle for ListOracle {
    fn name(&self) -> &'static str {
        "list"
    }

    fn ask(&mut self) -> Result<Candidate, OracleError> {
        if self.queue.is_empty() {
            return Err(OracleError::Sampling("list exhausted".to_string()));
        }
        Ok(self.queue.remove(0))
    }

    fn tell(&mut self, candidate: Candidate, objective: f64) -> Result<(), OracleError> {
        if self.refused.contains(&candidate) {
            return Err(OracleError::Sampling("refused".to_string()));
        }
        self.told.push((candidate, objective));
        Ok(())
    }

    fn best(&self) -> Option<(&[ParamValue], f64)> {
        self.told
            .iter()
            .fold(None, |best: Option<&(Candidate, f64)>, p| match best {
                Some(b) if b.1 <= p.1 => Some(b),
                _ => Some(p),
            })
            .map(|(c, v)| (c.as_slice(), *v))
    }

    fn observed(&self) -> usize {
        self.told.len()
    }
}

#[test]
fn grid_results_keep_input_order_and_isolate_failures() {
    let series = wave_series();
    let sets = vec![window_set(2, 6), window_set(0, 6), window_set(3, 9)];
    let grid = GridSearch::new(sets.clone(), dec!(10000), Decimal::ZERO);

    let mut strategy = build(&series).unwrap();
    let runs = grid.run(&mut strategy, &AtomicBool::new(false));

    assert_eq!(runs.len(), 3);
    for (run, params) in runs.iter().zip(&sets) {
        assert_eq!(&run.params, params);
    }
    assert!(runs[0].outcome.is_ok());
    assert!(matches!(
        runs[1].outcome.as_ref().unwrap_err().error,
        BacktestError::Strategy(_)
    ));
    assert!(runs[2].outcome.is_ok());
}

#[test]
fn parallel_grid_matches_sequential_grid() {
    let series = wave_series();
    let sets: Vec<StrategyParams> = (2..=4)
        .flat_map(|s| (6..=9).map(move |l| window_set(s, l)))
        .collect();
    let grid = GridSearch::new(sets, dec!(10000), Decimal::ZERO);
    let never = AtomicBool::new(false);

    let mut strategy = build(&series).unwrap();
    let sequential = grid.run(&mut strategy, &never);
    let parallel = grid.run_parallel(|| build(&series), &never);

    assert_eq!(sequential.len(), parallel.len());
    for (a, b) in sequential.iter().zip(&parallel) {
        assert_eq!(a.params, b.params);
        assert_eq!(a.outcome.as_ref().unwrap(), b.outcome.as_ref().unwrap());
    }
}

#[test]
fn cancelled_grid_stops_early() {
    let series = wave_series();
    let grid = GridSearch::new(vec![window_set(2, 6); 3], dec!(10000), Decimal::ZERO);
    let mut strategy = build(&series).unwrap();
    assert!(grid.run(&mut strategy, &AtomicBool::new(true)).is_empty());
}

#[test]
fn tracked_best_never_decreases() {
    let series = wave_series();
    let mut strategy = build(&series).unwrap();
    let outcome = search(20, 777)
        .backtest(&mut strategy, None, &AtomicBool::new(false))
        .unwrap();

    assert_eq!(outcome.trials.len(), 20);
    assert!(outcome.failures.is_empty());
    for pair in outcome.trials.windows(2) {
        assert!(pair[1].best_value >= pair[0].best_value);
    }
    let max = outcome.trials.iter().map(|t| t.total_value).max().unwrap();
    let best = outcome.best.unwrap();
    assert_eq!(best.value, max);
    assert_eq!(outcome.trials[best.index].total_value, max);

    // The oracle's optimum is the same value, reached through -objective.
    let oracle_best = Decimal::from_f64(outcome.best_value.unwrap()).unwrap();
    assert!((oracle_best - max).abs() < dec!(0.000001));
    let params = outcome.best_params.unwrap();
    assert_eq!(params.get("one_order_quantity"), Some(&ParamValue::Int(1)));
}

#[test]
fn same_seed_reproduces_the_search() {
    let series = wave_series();
    let run = || {
        let mut strategy = build(&series).unwrap();
        search(12, 42)
            .with_oracle(OracleKind::Random)
            .backtest(&mut strategy, None, &AtomicBool::new(false))
            .unwrap()
    };
    let a = run();
    let b = run();
    assert_eq!(a.trials, b.trials);
    assert_eq!(a.best_params, b.best_params);
}

#[test]
fn missing_parameter_fails_before_any_trial() {
    let series = wave_series();
    let mut strategy = build(&series).unwrap();
    let target = TargetParams::new()
        .tunable("short_window", ParamSpec::Integer { low: 2, high: 5 })
        .fixed("long_window", 10);
    let (tx, mut rx) = trial_channel(4);

    let err = BayesianSearch::new(target, dec!(10000), Decimal::ZERO, 5, 0)
        .backtest(&mut strategy, Some(&tx), &AtomicBool::new(false))
        .unwrap_err();

    assert!(matches!(
        err,
        OptimizerError::InvalidParameter(CoreError::InvalidParameter { ref name, .. })
            if name == "one_order_quantity"
    ));
    assert!(rx.try_recv().is_err());
}

#[test]
fn failing_trial_is_recorded_and_skipped() {
    let series = wave_series();
    let mut strategy = build(&series).unwrap();
    let target = TargetParams::new()
        .tunable("short_window", ParamSpec::Integer { low: 0, high: 5 })
        .fixed("long_window", 8)
        .fixed("one_order_quantity", 1);
    let space = SearchSpace::from_target(&target).unwrap();
    let mut oracle = ListOracle::new(vec![
        vec![ParamValue::Int(2)],
        vec![ParamValue::Int(0)],
        vec![ParamValue::Int(9)],
        vec![ParamValue::Int(4)],
    ]);
    let (tx, mut rx) = trial_channel(16);

    let outcome = BayesianSearch::new(target, dec!(10000), Decimal::ZERO, 5, 0)
        .backtest_with_oracle(&mut strategy, &mut oracle, &space, Some(&tx), &AtomicBool::new(false))
        .unwrap();

    // Window 0 fails in reset_all, 9 is outside the space, the fifth ask finds the list empty.
    let failed: Vec<usize> = outcome.failures.iter().map(|f| f.index).collect();
    assert_eq!(failed, vec![1, 2, 4]);
    assert_eq!(outcome.failures[1].candidate, Some(vec![ParamValue::Int(9)]));
    assert!(outcome.failures[2].candidate.is_none());

    let indices: Vec<usize> = outcome.trials.iter().map(|t| t.index).collect();
    assert_eq!(indices, vec![0, 3]);
    assert_eq!(oracle.observed(), 2);

    let mut streamed = Vec::new();
    while let Ok(trial) = rx.try_recv() {
        streamed.push(trial.index);
    }
    assert_eq!(streamed, vec![0, 3]);
}

#[test]
fn trial_the_oracle_refuses_is_only_a_failure() {
    let series = wave_series();
    let mut strategy = build(&series).unwrap();
    let target = TargetParams::new()
        .tunable("short_window", ParamSpec::Integer { low: 2, high: 5 })
        .fixed("long_window", 8)
        .fixed("one_order_quantity", 1);
    let space = SearchSpace::from_target(&target).unwrap();
    let mut oracle = ListOracle::new(vec![
        vec![ParamValue::Int(2)],
        vec![ParamValue::Int(3)],
        vec![ParamValue::Int(4)],
    ]);
    oracle.refused.push(vec![ParamValue::Int(3)]);
    let (tx, mut rx) = trial_channel(16);

    let outcome = BayesianSearch::new(target, dec!(10000), Decimal::ZERO, 3, 0)
        .backtest_with_oracle(&mut strategy, &mut oracle, &space, Some(&tx), &AtomicBool::new(false))
        .unwrap();

    let failed: Vec<usize> = outcome.failures.iter().map(|f| f.index).collect();
    let completed: Vec<usize> = outcome.trials.iter().map(|t| t.index).collect();
    assert_eq!(failed, vec![1]);
    assert_eq!(completed, vec![0, 2]);
    assert!(outcome.failures[0].portfolio.is_some());
    assert_ne!(outcome.best.unwrap().index, 1);

    let mut streamed = Vec::new();
    while let Ok(trial) = rx.try_recv() {
        streamed.push(trial.index);
    }
    assert_eq!(streamed, vec![0, 2]);
}

#[test]
fn cancelled_search_returns_what_it_has() {
    let series = wave_series();
    let mut strategy = build(&series).unwrap();
    let outcome = search(10, 1)
        .backtest(&mut strategy, None, &AtomicBool::new(true))
        .unwrap();
    assert!(outcome.cancelled);
    assert!(outcome.trials.is_empty());
    assert!(outcome.best.is_none());
    assert!(outcome.best_params.is_none());
}

#[test]
fn batched_search_reports_every_trial_in_order() {
    let series = wave_series();
    let outcome = search(10, 9)
        .backtest_parallel(|| build(&series), 4, None, &AtomicBool::new(false))
        .unwrap();

    let indices: Vec<usize> = outcome.trials.iter().map(|t| t.index).collect();
    assert_eq!(indices, (0..10).collect::<Vec<_>>());
    for pair in outcome.trials.windows(2) {
        assert!(pair[1].best_value >= pair[0].best_value);
    }
}
