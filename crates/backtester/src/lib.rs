//! # Backtester Crate
//!
//! Drives a signal generator and a trade executor across a historical price series
//! on a simulated market.
//!
//! ## Run lifecycle
//!
//! A run is always `reset_all` followed by exactly one `backtest`. The reset validates
//! the parameters against the components' declared defaults, hands them to both
//! components and restarts the account. `backtest` then walks every sample in order:
//!
//! 1. move the market cursor and read the price;
//! 2. ask the generator for a signal;
//! 3. hand the signal to the executor, unless the run's trade limiter forbids it;
//! 4. sweep pending limit orders;
//! 5. mark the account and record the step.
//!
//! A run that stops early returns a [`RunFailure`] carrying the account as it stood.
//! [`StrategyHandle`] shares a strategy between threads while allowing only one run
//! at a time, and [`ResultSummary`] persists a finished run as JSON.

pub mod error;
pub mod guard;
pub mod result;
pub mod strategy;
pub mod summary;

pub use error::{BacktestError, RunFailure, SummaryError};
pub use guard::StrategyHandle;
pub use result::{BacktestResult, StrategyDynamic};
pub use strategy::BacktestStrategy;
pub use summary::{DataRange, ResultSummary};
