//! # Market Crate
//!
//! This crate provides the venue side of a trading strategy: order placement, pending
//! limit orders and account bookkeeping. It defines the `Market` trait shared by every
//! venue, the `BacktestMarket` extension that a step-driven simulation needs, and the
//! `SimulatedMarket` that replays a historical price series.
//!
//! ## Architectural Principles
//!
//! - **Execution Abstraction:** Trade executors only ever see `&mut dyn Market`, so they are
//!   completely agnostic about whether they are trading against a simulation or a live venue.
//! - **Exact Accounting:** All money is `Decimal`. Spot accounts move cash and coin; margin
//!   accounts net orders against a FIFO ledger of open lots (see [`ledger`]).
//! - **Rejections are not errors:** an order refused for lack of funds returns `Ok(false)`
//!   and leaves the account untouched. `Err` is reserved for conditions that end a run.
//!
//! ## Public API
//!
//! - `Market` / `BacktestMarket`: the venue contracts.
//! - `SimulatedMarket`: the "virtual exchange" for backtesting.
//! - `LiveMarket` / `ExchangeClient`: the adapter for a real venue.
//! - `Portfolio`, `MarketHistory`: account state and its recorded time series.
//! - `MarketError`, `ExchangeError`: the specific error types of this crate.

pub mod error;
pub mod history;
pub mod ledger;
pub mod live;
pub mod portfolio;
pub mod simulated;

pub use error::{ExchangeError, MarketError};
pub use history::{MarketHistory, SideLog};
pub use ledger::{checkout, Fill};
pub use live::{ExchangeClient, LiveMarket};
pub use portfolio::Portfolio;
pub use simulated::SimulatedMarket;

use core_types::{OrderId, OrderSide, OrderType, PendingOrder};
use rust_decimal::Decimal;

/// The order-placement contract shared by simulated and live venues.
pub trait Market: Send {
    /// Price at the current cursor (simulation) or the venue's last traded price.
    fn current_price(&self) -> Result<Decimal, MarketError>;

    /// Executes immediately at the current price. `Ok(false)` means the venue refused it.
    fn place_market_order(&mut self, side: OrderSide, quantity: Decimal) -> Result<bool, MarketError>;

    /// Queues a resting order. It does not execute until the price crosses `price`.
    fn place_limit_order(
        &mut self,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<bool, MarketError>;

    /// Dispatches on order type. A limit order without a positive price is refused.
    fn place_order(
        &mut self,
        kind: OrderType,
        side: OrderSide,
        quantity: Decimal,
        price: Option<Decimal>,
    ) -> Result<bool, MarketError> {
        match (kind, price) {
            (OrderType::Limit, Some(p)) if p > Decimal::ZERO => self.place_limit_order(side, quantity, p),
            (OrderType::Market, _) => self.place_market_order(side, quantity),
            _ => Ok(false),
        }
    }

    fn open_orders(&self) -> Result<Vec<PendingOrder>, MarketError>;

    /// Removes a resting order. `Ok(false)` if no order has this id.
    fn cancel_order(&mut self, id: OrderId) -> Result<bool, MarketError>;
}

/// The extra surface a step-driven backtest needs from its market.
pub trait BacktestMarket: Market {
    /// Reinitializes the account and clears history, pending orders and the cursor.
    fn reset_portfolio(&mut self, start_cash: Decimal, start_coin: Decimal);

    fn set_current_index(&mut self, index: usize);

    fn current_index(&self) -> usize;

    /// Number of samples in the underlying price series.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open_order_count(&self) -> usize;

    /// Fills every resting order whose limit the current price has crossed.
    /// Returns the number of orders filled; refused fills stay queued.
    fn check_order(&mut self) -> Result<usize, MarketError>;

    /// Marks the account to `price` and appends one step to the history.
    fn save_history(&mut self, price: Decimal);

    fn portfolio(&self) -> &Portfolio;

    fn history(&self) -> &MarketHistory;

    /// The same market seen through the narrower contract handed to trade executors.
    fn as_market(&mut self) -> &mut dyn Market;
}
