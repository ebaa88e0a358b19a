use crate::ledger;
use core_types::Lot;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Manages the state of a simulated trading account.
///
/// Only the owning market mutates it; everything else sees snapshots. Spot accounts
/// use `cash` and `position`, margin accounts use `cash` and the `positions_fx` ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Portfolio {
    pub cash: Decimal,
    pub position: Decimal,
    pub positions_fx: Vec<Lot>,
    pub total_value: Decimal,
    /// `total_value / start_cash` as of the last recorded step; zero before the first one.
    pub profit_rate: Decimal,
    pub trade_count: u64,
    pub start_cash: Decimal,
}

impl Portfolio {
    /// Creates a new `Portfolio` with a given amount of starting capital.
    pub fn new(start_cash: Decimal, start_coin: Decimal) -> Self {
        Self {
            cash: start_cash,
            position: start_coin,
            positions_fx: Vec::new(),
            total_value: start_cash,
            profit_rate: Decimal::ZERO,
            trade_count: 0,
            start_cash,
        }
    }

    /// Spot valuation: cash plus the position marked at `price`.
    pub fn spot_value(&self, price: Decimal) -> Decimal {
        self.cash + self.position * price
    }

    /// Margin valuation: cash plus the unrealized P&L of every open lot at `price`.
    pub fn margin_value(&self, price: Decimal) -> Decimal {
        self.cash + ledger::unrealized_pnl(&self.positions_fx, price)
    }

    pub fn net_fx_position(&self) -> Decimal {
        ledger::net_position(&self.positions_fx)
    }

    /// Records a new valuation and the profit rate that goes with it.
    pub(crate) fn mark(&mut self, total_value: Decimal) {
        self.total_value = total_value;
        self.profit_rate = total_value
            .checked_div(self.start_cash)
            .unwrap_or(Decimal::ZERO);
    }
}

impl Default for Portfolio {
    fn default() -> Self {
        Self::new(Decimal::ZERO, Decimal::ZERO)
    }
}
