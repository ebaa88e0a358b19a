//! # Optimizer Crate
//!
//! Searches strategy-parameter space by re-running the deterministic backtest.
//!
//! - [`GridSearch`] runs an explicit list of parameter sets, sequentially or on the
//!   rayon pool. [`generate_parameter_sets`] builds that list from a grid file.
//! - [`BayesianSearch`] asks an [`Oracle`] for candidates, one trial at a time or in
//!   parallel batches, and reports `-total_value` back to it.
//! - Every completed trial is pushed to an optional [`TrialSender`] without blocking.

pub mod bayesian;
pub mod error;
pub mod generator;
pub mod grid;
pub mod oracle;
pub mod progress;
pub mod space;

pub use bayesian::{BayesianSearch, BestTrial, SearchOutcome, TrialFailure};
pub use error::{OptimizerError, OracleError};
pub use generator::generate_parameter_sets;
pub use grid::{GridRun, GridSearch};
pub use oracle::{Oracle, RandomSearchOracle, TpeOracle};
pub use progress::{trial_channel, Trial, TrialSender};
pub use space::{Candidate, SearchSpace};
