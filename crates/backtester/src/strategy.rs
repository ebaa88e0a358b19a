use crate::error::{BacktestError, RunFailure};
use crate::result::{BacktestResult, StrategyDynamic};
use configuration::RunConfig;
use core_types::{CoreError, StrategyParams, TradeSignal};
use market::{BacktestMarket, MarketHistory};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use strategies::{ComponentRegistry, SignalGenerator, TradeExecutor};
use tracing::{debug, info, warn};

/// A signal generator and a trade executor bound to a simulated market.
///
/// Every run is `reset_all` followed by one `backtest`. The loop is sequential and
/// deterministic: the same prices, parameters and configuration give the same result.
pub struct BacktestStrategy {
    market: Box<dyn BacktestMarket>,
    generator: Box<dyn SignalGenerator>,
    executor: Box<dyn TradeExecutor>,
    params: StrategyParams,
    count: usize,
    ready: bool,
}

impl BacktestStrategy {
    pub fn new(
        market: Box<dyn BacktestMarket>,
        generator: Box<dyn SignalGenerator>,
        executor: Box<dyn TradeExecutor>,
    ) -> Self {
        Self {
            market,
            generator,
            executor,
            params: StrategyParams::new(),
            count: 0,
            ready: false,
        }
    }

    /// Builds the components by their registered names.
    pub fn from_registry(
        registry: &ComponentRegistry,
        generator: &str,
        executor: &str,
        market: Box<dyn BacktestMarket>,
    ) -> Result<Self, BacktestError> {
        let generator = registry.create_generator(generator)?;
        let executor = registry.create_executor(executor)?;
        Ok(Self::new(market, generator, executor))
    }

    pub fn generator_name(&self) -> &'static str {
        self.generator.name()
    }

    pub fn executor_name(&self) -> &'static str {
        self.executor.name()
    }

    /// Generator defaults overlaid by executor defaults.
    pub fn default_params(&self) -> StrategyParams {
        self.generator
            .default_params()
            .merged(&self.executor.default_params())
    }

    /// Parameters of the current run.
    pub fn params(&self) -> &StrategyParams {
        &self.params
    }

    pub fn market(&self) -> &dyn BacktestMarket {
        self.market.as_ref()
    }

    pub fn history(&self) -> &MarketHistory {
        self.market.history()
    }

    pub fn dynamic(&self) -> StrategyDynamic {
        StrategyDynamic {
            count: self.count,
            generator: self.generator.state(),
            executor: self.executor.state(),
        }
    }

    /// Prepares a run: both components adopt `params` and the account restarts.
    ///
    /// Every key the components declare in their defaults must be present.
    pub fn reset_all(
        &mut self,
        params: &StrategyParams,
        start_cash: Decimal,
        start_coin: Decimal,
    ) -> Result<(), BacktestError> {
        self.ready = false;
        let required = self.default_params();
        let missing = params.missing_keys(required.keys());
        if !missing.is_empty() {
            return Err(CoreError::invalid_parameter(
                missing.join(", "),
                format!(
                    "missing required parameter for {}/{}",
                    self.generator.name(),
                    self.executor.name()
                ),
            )
            .into());
        }

        self.generator.reset_params(params)?;
        self.executor.reset_params(params)?;
        self.market.reset_portfolio(start_cash, start_coin);
        self.params = params.clone();
        self.count = 0;
        self.ready = true;
        Ok(())
    }

    /// Runs the whole series once.
    pub fn backtest(
        &mut self,
        run: &RunConfig,
        hold_params: &[String],
    ) -> Result<BacktestResult, RunFailure> {
        let never = AtomicBool::new(false);
        self.backtest_with_cancel(run, hold_params, &never)
    }

    /// Runs the whole series once, checking `cancel` before every step.
    pub fn backtest_with_cancel(
        &mut self,
        run: &RunConfig,
        hold_params: &[String],
        cancel: &AtomicBool,
    ) -> Result<BacktestResult, RunFailure> {
        if !self.ready {
            return Err(self.failure(0, BacktestError::NotReset));
        }
        self.ready = false;
        self.count = 0;
        self.market.set_current_index(0);

        let dynamic = self.dynamic();
        let mut held: BTreeMap<String, Vec<Option<f64>>> = BTreeMap::new();
        for key in hold_params {
            if dynamic.lookup(key).is_some() {
                held.insert(key.clone(), Vec::with_capacity(self.market.len()));
            } else {
                warn!(key = %key, "held parameter is not exposed by either component; ignoring");
            }
        }

        let len = self.market.len();
        info!(
            generator = self.generator.name(),
            executor = self.executor.name(),
            steps = len,
            params = %self.params,
            "starting backtest"
        );

        for i in 0..len {
            if cancel.load(Ordering::Relaxed) {
                info!(step = i, "backtest cancelled");
                return Err(self.failure(i, BacktestError::Cancelled));
            }
            if let Err(error) = self.step(i, run) {
                return Err(self.failure(i, error));
            }
            if !held.is_empty() {
                let dynamic = self.dynamic();
                for (key, series) in held.iter_mut() {
                    series.push(dynamic.lookup(key).flatten());
                }
            }
        }

        let portfolio = self.market.portfolio().clone();
        info!(
            total_value = %portfolio.total_value,
            trade_count = portfolio.trade_count,
            "backtest finished"
        );
        Ok(BacktestResult { portfolio, held })
    }

    /// One tick: signal, optional trade, pending-order sweep, bookkeeping.
    fn step(&mut self, index: usize, run: &RunConfig) -> Result<TradeSignal, BacktestError> {
        self.count = index + 1;
        self.market.set_current_index(index);
        let price = self.market.current_price()?;
        let signal = self.generator.generate_signal(price)?;

        if run.allows_trading(self.market.open_order_count()) {
            self.executor
                .execute_trade(self.market.as_market(), price, signal)?;
        } else if signal != TradeSignal::Hold {
            debug!(step = index, %signal, "signal suppressed by trade limiter");
        }

        self.market.check_order()?;
        self.market.save_history(price);
        Ok(signal)
    }

    fn failure(&self, step: usize, error: BacktestError) -> RunFailure {
        RunFailure {
            step,
            portfolio: self.market.portfolio().clone(),
            error,
        }
    }
}
