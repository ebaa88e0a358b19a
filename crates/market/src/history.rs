use core_types::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// `(step index, price)` pairs recorded per order side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SideLog {
    pub buy: Vec<(usize, Decimal)>,
    pub sell: Vec<(usize, Decimal)>,
}

impl SideLog {
    pub fn push(&mut self, side: OrderSide, index: usize, price: Decimal) {
        match side {
            OrderSide::Buy => self.buy.push((index, price)),
            OrderSide::Sell => self.sell.push((index, price)),
        }
    }

    pub fn get(&self, side: OrderSide) -> &[(usize, Decimal)] {
        match side {
            OrderSide::Buy => &self.buy,
            OrderSide::Sell => &self.sell,
        }
    }

    pub fn len(&self) -> usize {
        self.buy.len() + self.sell.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Everything a simulated market records during a run, for plotting and auditing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketHistory {
    /// Every market order attempt, accepted or not.
    pub signals: SideLog,
    /// Market orders that actually filled.
    pub executed: SideLog,
    pub total_value: Vec<Decimal>,
    pub position: Vec<Decimal>,
}
