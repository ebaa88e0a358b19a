use crate::error::{BacktestError, RunFailure};
use crate::result::BacktestResult;
use crate::strategy::BacktestStrategy;
use configuration::RunConfig;
use core_types::StrategyParams;
use rust_decimal::Decimal;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use tracing::warn;

/// Shared ownership of a strategy with a single-permit run guard.
///
/// At most one run holds the strategy at a time; a second caller gets
/// [`BacktestError::RunInProgress`] immediately instead of waiting.
#[derive(Clone)]
pub struct StrategyHandle {
    inner: Arc<Mutex<BacktestStrategy>>,
}

impl StrategyHandle {
    pub fn new(strategy: BacktestStrategy) -> Self {
        Self {
            inner: Arc::new(Mutex::new(strategy)),
        }
    }

    /// Takes the run permit, or fails if another run holds it.
    pub fn try_acquire(&self) -> Result<MutexGuard<'_, BacktestStrategy>, BacktestError> {
        match self.inner.try_lock() {
            Ok(guard) => Ok(guard),
            Err(TryLockError::WouldBlock) => Err(BacktestError::RunInProgress),
            Err(TryLockError::Poisoned(poisoned)) => {
                // The next reset_all rebuilds every piece of run state.
                warn!("previous run panicked; recovering strategy");
                Ok(poisoned.into_inner())
            }
        }
    }

    /// `reset_all` followed by `backtest`, under the run guard.
    pub fn run(
        &self,
        params: &StrategyParams,
        start_cash: Decimal,
        start_coin: Decimal,
        run: &RunConfig,
        hold_params: &[String],
        cancel: &AtomicBool,
    ) -> Result<BacktestResult, RunFailure> {
        let mut strategy = self.try_acquire().map_err(|error| RunFailure {
            step: 0,
            portfolio: Default::default(),
            error,
        })?;
        if let Err(error) = strategy.reset_all(params, start_cash, start_coin) {
            return Err(RunFailure {
                step: 0,
                portfolio: strategy.market().portfolio().clone(),
                error,
            });
        }
        strategy.backtest_with_cancel(run, hold_params, cancel)
    }
}
