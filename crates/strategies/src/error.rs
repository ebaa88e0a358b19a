use core_types::CoreError;
use market::MarketError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error(transparent)]
    InvalidParameters(#[from] CoreError),

    #[error("An error occurred during indicator calculation: {0}")]
    IndicatorError(String),

    #[error("Component '{0}' not found in the registry")]
    NotFound(String),

    #[error("Component '{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("Market failure while executing trade: {0}")]
    Market(#[from] MarketError),
}
