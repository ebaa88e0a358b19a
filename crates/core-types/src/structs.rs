use crate::enums::OrderSide;
use crate::error::CoreError;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// An unclosed slice of a margin position at a specific entry price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub side: OrderSide,
    pub size: Decimal,
    pub price: Decimal,
}

impl Lot {
    pub fn new(side: OrderSide, size: Decimal, price: Decimal) -> Self {
        Self { side, size, price }
    }

    /// Unrealized profit of this lot if it were closed at `price`.
    pub fn unrealized_pnl(&self, price: Decimal) -> Decimal {
        match self.side {
            OrderSide::Buy => (price - self.price) * self.size,
            OrderSide::Sell => (self.price - price) * self.size,
        }
    }
}

/// Opaque identifier of a pending order. Ids are timestamp-ordered (UUIDv7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resting limit order. Never mutated once queued; only removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    pub id: OrderId,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub price: Decimal,
}

impl PendingOrder {
    pub fn new(side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            id: OrderId::new(),
            side,
            quantity,
            price,
        }
    }

    /// Whether `current_price` has crossed this order's limit.
    pub fn is_triggered(&self, current_price: Decimal) -> bool {
        match self.side {
            OrderSide::Sell => current_price >= self.price,
            OrderSide::Buy => current_price <= self.price,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
}

/// An ordered, non-empty sequence of prices with non-decreasing timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, CoreError> {
        if points.is_empty() {
            return Err(CoreError::InvalidSeries(
                "price series must contain at least one sample".to_string(),
            ));
        }
        if let Some(pos) = points
            .windows(2)
            .position(|w| w[1].timestamp < w[0].timestamp)
        {
            return Err(CoreError::InvalidSeries(format!(
                "timestamps decrease at index {}",
                pos + 1
            )));
        }
        Ok(Self { points })
    }

    /// Builds a series from bare prices, stamping them one minute apart from the Unix epoch.
    pub fn from_prices(prices: impl IntoIterator<Item = Decimal>) -> Result<Self, CoreError> {
        let points = prices
            .into_iter()
            .enumerate()
            .map(|(i, price)| PricePoint {
                timestamp: DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(i as i64),
                price,
            })
            .collect();
        Self::new(points)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PricePoint> {
        self.points.get(index)
    }

    pub fn price_at(&self, index: usize) -> Option<Decimal> {
        self.points.get(index).map(|p| p.price)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    /// First and last timestamp of the series.
    pub fn range(&self) -> (DateTime<Utc>, DateTime<Utc>) {
        // `new` guarantees at least one point.
        let first = self.points[0].timestamp;
        let last = self.points[self.points.len() - 1].timestamp;
        (first, last)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn lot_pnl_is_oriented_to_its_side() {
        let long = Lot::new(OrderSide::Buy, dec!(2), dec!(100));
        let short = Lot::new(OrderSide::Sell, dec!(2), dec!(100));
        assert_eq!(long.unrealized_pnl(dec!(110)), dec!(20));
        assert_eq!(short.unrealized_pnl(dec!(110)), dec!(-20));
    }

    #[test]
    fn pending_order_trigger_direction() {
        let sell = PendingOrder::new(OrderSide::Sell, dec!(1), dec!(105));
        assert!(!sell.is_triggered(dec!(104)));
        assert!(sell.is_triggered(dec!(105)));

        let buy = PendingOrder::new(OrderSide::Buy, dec!(1), dec!(95));
        assert!(!buy.is_triggered(dec!(96)));
        assert!(buy.is_triggered(dec!(95)));
    }

    #[test]
    fn order_ids_are_unique() {
        let a = OrderId::new();
        let b = OrderId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_series_is_rejected() {
        assert!(PriceSeries::from_prices(Vec::<Decimal>::new()).is_err());
    }

    #[test]
    fn decreasing_timestamps_are_rejected() {
        let t0 = DateTime::<Utc>::UNIX_EPOCH;
        let points = vec![
            PricePoint { timestamp: t0 + Duration::minutes(1), price: dec!(1) },
            PricePoint { timestamp: t0, price: dec!(1) },
        ];
        assert!(matches!(
            PriceSeries::new(points),
            Err(CoreError::InvalidSeries(_))
        ));
    }

    #[test]
    fn series_range_spans_first_and_last_sample() {
        let series = PriceSeries::from_prices([dec!(1), dec!(2), dec!(3)]).unwrap();
        let (start, end) = series.range();
        assert_eq!(end - start, Duration::minutes(2));
        assert_eq!(series.price_at(1), Some(dec!(2)));
        assert_eq!(series.price_at(3), None);
    }
}
