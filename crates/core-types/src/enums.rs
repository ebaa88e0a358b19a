use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "Buy"),
            OrderSide::Sell => write!(f, "Sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
}

/// The output of a signal generator for a single price observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TradeSignal {
    Buy,
    Sell,
    #[default]
    Hold,
}

impl TradeSignal {
    /// The order side this signal asks for, or `None` for `Hold`.
    pub fn side(&self) -> Option<OrderSide> {
        match self {
            TradeSignal::Buy => Some(OrderSide::Buy),
            TradeSignal::Sell => Some(OrderSide::Sell),
            TradeSignal::Hold => None,
        }
    }

    /// Swaps `Buy` and `Sell`; `Hold` is unchanged.
    pub fn inverted(&self) -> Self {
        match self {
            TradeSignal::Buy => TradeSignal::Sell,
            TradeSignal::Sell => TradeSignal::Buy,
            TradeSignal::Hold => TradeSignal::Hold,
        }
    }
}

impl fmt::Display for TradeSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradeSignal::Buy => write!(f, "Buy"),
            TradeSignal::Sell => write!(f, "Sell"),
            TradeSignal::Hold => write!(f, "Hold"),
        }
    }
}
