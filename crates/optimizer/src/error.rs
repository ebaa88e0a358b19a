use backtester::BacktestError;
use configuration::error::ConfigError;
use core_types::{CoreError, ParamValue};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizerError {
    #[error("Invalid optimization target: {0}")]
    InvalidParameter(#[from] CoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Could not prepare strategy for search: {0}")]
    Backtest(#[from] BacktestError),

    #[error("Parameter generation failed: {0}")]
    ParameterGeneration(String),
}

/// Failures of the candidate-proposing oracle. They are isolated to one trial.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OracleError {
    #[error("candidate has {got} values but the search space has {expected} dimensions")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("value {value} is outside dimension '{name}'")]
    OutOfSpace { name: String, value: ParamValue },

    #[error("objective {0} is not finite")]
    NonFiniteObjective(f64),

    #[error("sampling failed: {0}")]
    Sampling(String),
}
