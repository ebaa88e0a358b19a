use core_types::CoreError;
use market::{MarketError, Portfolio};
use strategies::StrategyError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BacktestError {
    #[error("Invalid strategy parameters: {0}")]
    InvalidParameter(#[from] CoreError),

    #[error("Strategy execution error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Market simulation error: {0}")]
    Market(#[from] MarketError),

    #[error("reset_all must be called before every backtest run")]
    NotReset,

    #[error("Another backtest is already running on this strategy")]
    RunInProgress,

    #[error("Backtest was cancelled")]
    Cancelled,
}

/// A backtest that stopped early, with the account as it stood when it did.
#[derive(Error, Debug)]
#[error("backtest stopped at step {step}: {error}")]
pub struct RunFailure {
    pub step: usize,
    pub portfolio: Portfolio,
    #[source]
    pub error: BacktestError,
}

#[derive(Error, Debug)]
pub enum SummaryError {
    #[error("Failed to access result summary file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode or decode result summary: {0}")]
    Json(#[from] serde_json::Error),
}
