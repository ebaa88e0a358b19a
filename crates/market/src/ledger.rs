//! FIFO lot netting for margin accounts.
//!
//! The ledger is an insertion-ordered list of open [`Lot`]s. An incoming order first
//! closes opposing lots, oldest first, realizing profit on every closed quantity; any
//! remainder opens a new lot on the order's own side.

use chrono::{DateTime, Utc};
use core_types::{Lot, OrderSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Nets `order` against `lots` and returns the realized profit.
///
/// Profit on each closed slice is exit price minus entry price, oriented to the side
/// being closed. Lots on the order's own side are skipped, not merged.
pub fn checkout(order: Lot, lots: &mut Vec<Lot>) -> Decimal {
    let mut remaining = order.size;
    let mut realized = Decimal::ZERO;
    let mut i = 0;

    while i < lots.len() && remaining > Decimal::ZERO {
        let lot = &mut lots[i];
        if lot.side == order.side {
            i += 1;
            continue;
        }

        let diff = match order.side {
            OrderSide::Buy => lot.price - order.price,
            OrderSide::Sell => order.price - lot.price,
        };

        if lot.size > remaining {
            lot.size -= remaining;
            realized += diff * remaining;
            remaining = Decimal::ZERO;
        } else {
            realized += diff * lot.size;
            remaining -= lot.size;
            lots.remove(i);
        }
    }

    if remaining > Decimal::ZERO {
        lots.push(Lot::new(order.side, remaining, order.price));
    }
    realized
}

/// Signed open position: long lots count positive, short lots negative.
pub fn net_position(lots: &[Lot]) -> Decimal {
    lots.iter()
        .map(|lot| match lot.side {
            OrderSide::Buy => lot.size,
            OrderSide::Sell => -lot.size,
        })
        .sum()
}

/// Sum of every open lot's profit if it were closed at `price`.
pub fn unrealized_pnl(lots: &[Lot], price: Decimal) -> Decimal {
    lots.iter().map(|lot| lot.unrealized_pnl(price)).sum()
}

/// Cash that must be held against a position of `position` units at `price`.
pub fn margin_required(position: Decimal, price: Decimal, lot_size: Decimal, leverage: Decimal) -> Decimal {
    position.abs() * lot_size * price / leverage
}

/// A completed fill as reported by a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: DateTime<Utc>,
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
}

/// Replays fills in time order through a fresh ledger and returns, for each fill,
/// its timestamp and the profit it realized.
pub fn replay_profits(fills: &[Fill]) -> Vec<(DateTime<Utc>, Decimal)> {
    let mut ordered: Vec<&Fill> = fills.iter().collect();
    ordered.sort_by_key(|f| f.timestamp);

    let mut lots = Vec::new();
    ordered
        .into_iter()
        .map(|f| {
            let profit = checkout(Lot::new(f.side, f.size, f.price), &mut lots);
            (f.timestamp, profit)
        })
        .collect()
}
