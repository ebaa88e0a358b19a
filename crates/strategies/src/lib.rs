//! # Strategy Component Library
//!
//! This crate contains the pluggable trading logic of the simulator. A strategy is a
//! pair of components: a `SignalGenerator` that turns prices into Buy/Sell/Hold, and a
//! `TradeExecutor` that turns signals into orders under a sizing policy.
//!
//! ## Architectural Principles
//!
//! - **Pure Logic:** Generators never see a market. Executors only see the narrow
//!   `Market` contract passed into each call, never a stored reference.
//! - **Explicit State:** Every component keeps its working memory in a typed state
//!   struct, reset by `reset_params` at the start of every run.
//! - **Extensibility:** Adding a component means implementing the trait and registering
//!   a factory under a stable name in the `ComponentRegistry`.
//!
//! ## Public API
//!
//! - `SignalGenerator`, `TradeExecutor`: the component traits.
//! - `ComponentRegistry`: name → factory lookup, with `with_builtins()`.
//! - The concrete components (e.g., `BollingerBands`, `SpreadOrderExecutor`).

pub mod bollinger;
pub mod error;
pub mod executors;
pub mod factory;
pub mod ma_crossover;
pub mod macd;
pub mod state;

pub use bollinger::BollingerBands;
pub use error::StrategyError;
pub use executors::{NormalExecutor, SpreadOrderExecutor};
pub use factory::ComponentRegistry;
pub use ma_crossover::MovingAverageCrossover;
pub use macd::Macd;
pub use state::{ExecutorState, GeneratorState};

use core_types::{StrategyParams, TradeSignal};
use market::Market;
use rust_decimal::prelude::*;

/// Produces trade signals from a stream of prices.
///
/// The `&mut self` in `generate_signal` is crucial, as every generator keeps a price
/// buffer or indicator accumulators between calls. `Send` lets a strategy move onto a
/// worker thread for parallel grid evaluation.
pub trait SignalGenerator: Send {
    /// Stable registry name.
    fn name(&self) -> &'static str;

    /// Every parameter this generator reads, with its default value.
    fn default_params(&self) -> StrategyParams;

    /// Adopts `params` and clears all working state. Unknown keys are ignored.
    fn reset_params(&mut self, params: &StrategyParams) -> Result<(), StrategyError>;

    /// Consumes one price and returns the signal for it.
    fn generate_signal(&mut self, price: Decimal) -> Result<TradeSignal, StrategyError>;

    fn state(&self) -> GeneratorState;
}

/// Turns signals into orders against a market.
pub trait TradeExecutor: Send {
    fn name(&self) -> &'static str;

    fn default_params(&self) -> StrategyParams;

    fn reset_params(&mut self, params: &StrategyParams) -> Result<(), StrategyError>;

    /// Places zero or one order for `signal`. Refused orders are not errors; only
    /// failures that end the run are returned as `Err`.
    fn execute_trade(
        &mut self,
        market: &mut dyn Market,
        price: Decimal,
        signal: TradeSignal,
    ) -> Result<(), StrategyError>;

    fn state(&self) -> ExecutorState;
}

/// `ta` and the indicator math work in `f64`.
pub(crate) fn price_to_f64(price: Decimal) -> Result<f64, StrategyError> {
    price
        .to_f64()
        .ok_or_else(|| StrategyError::IndicatorError(format!("price {price} is not representable as f64")))
}
