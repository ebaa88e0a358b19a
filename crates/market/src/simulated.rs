use crate::error::MarketError;
use crate::history::MarketHistory;
use crate::ledger;
use crate::portfolio::Portfolio;
use crate::{BacktestMarket, Market};
use configuration::MarketSettings;
use core_types::{Lot, OrderId, OrderSide, PendingOrder, PricePoint, PriceSeries};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, warn};

/// The "virtual exchange" for backtesting.
///
/// It owns the account state and replays a shared price series. The caller drives the
/// cursor with `set_current_index`; the market never advances on its own.
#[derive(Debug, Clone)]
pub struct SimulatedMarket {
    series: Arc<PriceSeries>,
    settings: MarketSettings,
    index: usize,
    portfolio: Portfolio,
    history: MarketHistory,
    orders: Vec<PendingOrder>,
}

impl SimulatedMarket {
    pub fn new(series: Arc<PriceSeries>, settings: MarketSettings) -> Self {
        Self {
            series,
            settings,
            index: 0,
            portfolio: Portfolio::default(),
            history: MarketHistory::default(),
            orders: Vec::new(),
        }
    }

    /// Samples strictly before the cursor.
    pub fn price_history(&self) -> &[PricePoint] {
        let points = self.series.points();
        &points[..self.index.min(points.len())]
    }

    /// Applies a fill at `price` if the account can afford it; records the attempt either way.
    fn submit(&mut self, side: OrderSide, quantity: Decimal, price: Decimal) -> bool {
        self.history.signals.push(side, self.index, price);

        let outcome = if quantity <= Decimal::ZERO {
            Err(MarketError::InvalidQuantity(quantity))
        } else if self.settings.is_margin_mode {
            self.execute_margin(side, quantity, price)
        } else {
            match side {
                OrderSide::Buy => self.execute_spot_buy(quantity, price),
                OrderSide::Sell => self.execute_spot_sell(quantity, price),
            }
        };

        match outcome {
            Ok(()) => {
                self.portfolio.trade_count += 1;
                self.history.executed.push(side, self.index, price);
                debug!(index = self.index, %side, %quantity, %price, "order filled");
                true
            }
            Err(e) if e.is_rejection() => {
                debug!(index = self.index, %side, %quantity, %price, reason = %e, "order rejected");
                false
            }
            Err(e) => {
                warn!(index = self.index, %side, %quantity, %price, error = %e, "order failed");
                false
            }
        }
    }

    fn execute_spot_buy(&mut self, quantity: Decimal, price: Decimal) -> Result<(), MarketError> {
        let cost = quantity * price;
        if self.portfolio.cash < cost {
            return Err(MarketError::InsufficientFunds {
                required: cost,
                available: self.portfolio.cash,
            });
        }
        self.portfolio.cash -= cost;
        self.portfolio.position += quantity;
        self.portfolio.position -= quantity * self.settings.fee_rate;
        Ok(())
    }

    fn execute_spot_sell(&mut self, quantity: Decimal, price: Decimal) -> Result<(), MarketError> {
        if self.portfolio.position < quantity {
            return Err(MarketError::InsufficientPosition {
                requested: quantity,
                available: self.portfolio.position,
            });
        }
        self.portfolio.cash += quantity * price;
        self.portfolio.position -= quantity;
        self.portfolio.position -= quantity * self.settings.fee_rate;
        Ok(())
    }

    /// Margin fills: the account must cover the margin of the position it would hold
    /// after the order, then the order is netted FIFO and realized profit hits cash.
    fn execute_margin(&mut self, side: OrderSide, quantity: Decimal, price: Decimal) -> Result<(), MarketError> {
        let signed = match side {
            OrderSide::Buy => quantity,
            OrderSide::Sell => -quantity,
        };
        let prospective = self.portfolio.net_fx_position() + signed;
        let margin = ledger::margin_required(
            prospective,
            price,
            self.settings.lot_size,
            self.settings.leverage,
        );
        if self.portfolio.cash < margin {
            return Err(MarketError::InsufficientMargin {
                required: margin,
                available: self.portfolio.cash,
            });
        }
        let realized = ledger::checkout(
            Lot::new(side, quantity, price),
            &mut self.portfolio.positions_fx,
        );
        self.portfolio.cash += realized;
        Ok(())
    }
}

impl Market for SimulatedMarket {
    fn current_price(&self) -> Result<Decimal, MarketError> {
        self.series
            .price_at(self.index)
            .ok_or(MarketError::OutOfRange {
                index: self.index,
                len: self.series.len(),
            })
    }

    fn place_market_order(&mut self, side: OrderSide, quantity: Decimal) -> Result<bool, MarketError> {
        let price = self.current_price()?;
        Ok(self.submit(side, quantity, price))
    }

    fn place_limit_order(
        &mut self,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<bool, MarketError> {
        let order = PendingOrder::new(side, quantity, price);
        debug!(id = %order.id, %side, %quantity, %price, "limit order queued");
        self.orders.push(order);
        Ok(true)
    }

    fn open_orders(&self) -> Result<Vec<PendingOrder>, MarketError> {
        Ok(self.orders.clone())
    }

    fn cancel_order(&mut self, id: OrderId) -> Result<bool, MarketError> {
        match self.orders.iter().position(|o| o.id == id) {
            Some(pos) => {
                self.orders.remove(pos);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

impl BacktestMarket for SimulatedMarket {
    fn reset_portfolio(&mut self, start_cash: Decimal, start_coin: Decimal) {
        self.portfolio = Portfolio::new(start_cash, start_coin);
        self.history = MarketHistory::default();
        self.orders.clear();
        self.index = 0;
    }

    fn set_current_index(&mut self, index: usize) {
        self.index = index;
    }

    fn current_index(&self) -> usize {
        self.index
    }

    fn len(&self) -> usize {
        self.series.len()
    }

    fn open_order_count(&self) -> usize {
        self.orders.len()
    }

    fn check_order(&mut self) -> Result<usize, MarketError> {
        if self.orders.is_empty() {
            return Ok(0);
        }
        let price = self.current_price()?;
        let pending = std::mem::take(&mut self.orders);
        let mut filled = 0;
        for order in pending {
            if order.is_triggered(price) && self.submit(order.side, order.quantity, price) {
                debug!(id = %order.id, %price, "limit order filled");
                filled += 1;
            } else {
                self.orders.push(order);
            }
        }
        Ok(filled)
    }

    fn save_history(&mut self, price: Decimal) {
        let (value, position) = if self.settings.is_margin_mode {
            (self.portfolio.margin_value(price), self.portfolio.net_fx_position())
        } else {
            (self.portfolio.spot_value(price), self.portfolio.position)
        };
        self.portfolio.mark(value);
        self.history.total_value.push(value);
        self.history.position.push(position);
    }

    fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    fn history(&self) -> &MarketHistory {
        &self.history
    }

    fn as_market(&mut self) -> &mut dyn Market {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::OrderType;
    use rust_decimal_macros::dec;

    fn market(prices: &[Decimal], settings: MarketSettings) -> SimulatedMarket {
        let series = PriceSeries::from_prices(prices.iter().copied()).unwrap();
        let mut m = SimulatedMarket::new(Arc::new(series), settings);
        m.reset_portfolio(dec!(1000), Decimal::ZERO);
        m
    }

    fn margin_settings() -> MarketSettings {
        MarketSettings { is_margin_mode: true, ..MarketSettings::default() }
    }

    #[test]
    fn cursor_past_the_end_is_out_of_range() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        m.set_current_index(1);
        assert_eq!(
            m.current_price(),
            Err(MarketError::OutOfRange { index: 1, len: 1 })
        );
        assert!(m.place_market_order(OrderSide::Buy, dec!(1)).is_err());
    }

    #[test]
    fn spot_buy_without_cash_is_rejected_without_side_effects() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        let before = m.portfolio().clone();
        assert!(!m.place_market_order(OrderSide::Buy, dec!(11)).unwrap());
        assert_eq!(m.portfolio(), &before);
        assert_eq!(m.history().signals.buy.len(), 1);
        assert!(m.history().executed.is_empty());
    }

    #[test]
    fn spot_sell_without_position_is_rejected() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        assert!(!m.place_market_order(OrderSide::Sell, dec!(1)).unwrap());
        assert_eq!(m.portfolio().trade_count, 0);
    }

    #[test]
    fn spot_fee_is_taken_from_position() {
        let settings = MarketSettings { fee_rate: dec!(0.01), ..MarketSettings::default() };
        let mut m = market(&[dec!(100)], settings);
        assert!(m.place_market_order(OrderSide::Buy, dec!(2)).unwrap());
        assert_eq!(m.portfolio().cash, dec!(800));
        assert_eq!(m.portfolio().position, dec!(1.98));
    }

    #[test]
    fn non_positive_quantity_is_rejected() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        assert!(!m.place_market_order(OrderSide::Buy, Decimal::ZERO).unwrap());
    }

    #[test]
    fn margin_check_uses_prospective_position() {
        let mut m = market(&[dec!(100)], margin_settings());
        // 10 units at 100 need exactly 1000 of margin.
        assert!(m.place_market_order(OrderSide::Buy, dec!(10)).unwrap());
        assert!(!m.place_market_order(OrderSide::Buy, dec!(1)).unwrap());
        // Reducing the position always fits.
        assert!(m.place_market_order(OrderSide::Sell, dec!(4)).unwrap());
        assert_eq!(m.portfolio().net_fx_position(), dec!(6));
    }

    #[test]
    fn leverage_reduces_margin() {
        let settings = MarketSettings { leverage: dec!(10), ..margin_settings() };
        let mut m = market(&[dec!(100)], settings);
        assert!(m.place_market_order(OrderSide::Sell, dec!(100)).unwrap());
        assert_eq!(m.portfolio().positions_fx.len(), 1);
    }

    #[test]
    fn limit_orders_fill_when_price_crosses() {
        let mut m = market(&[dec!(100), dec!(98), dec!(95)], MarketSettings::default());
        assert!(m.place_limit_order(OrderSide::Buy, dec!(1), dec!(96)).unwrap());
        assert_eq!(m.check_order().unwrap(), 0);
        m.set_current_index(1);
        assert_eq!(m.check_order().unwrap(), 0);
        m.set_current_index(2);
        assert_eq!(m.check_order().unwrap(), 1);
        assert_eq!(m.open_order_count(), 0);
        assert_eq!(m.portfolio().cash, dec!(905));
        assert_eq!(m.history().executed.buy, vec![(2, dec!(95))]);
    }

    #[test]
    fn unaffordable_limit_fill_stays_queued() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        m.place_limit_order(OrderSide::Buy, dec!(50), dec!(100)).unwrap();
        assert_eq!(m.check_order().unwrap(), 0);
        assert_eq!(m.open_order_count(), 1);
    }

    #[test]
    fn every_triggered_order_is_swept_in_one_pass() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        for _ in 0..3 {
            m.place_limit_order(OrderSide::Buy, dec!(1), dec!(100)).unwrap();
        }
        m.place_limit_order(OrderSide::Buy, dec!(1), dec!(90)).unwrap();
        assert_eq!(m.check_order().unwrap(), 3);
        assert_eq!(m.open_order_count(), 1);
    }

    #[test]
    fn cancel_removes_only_the_matching_order() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        m.place_limit_order(OrderSide::Sell, dec!(1), dec!(120)).unwrap();
        m.place_limit_order(OrderSide::Sell, dec!(1), dec!(130)).unwrap();
        let first = m.open_orders().unwrap()[0].id;
        assert!(m.cancel_order(first).unwrap());
        assert!(!m.cancel_order(first).unwrap());
        let left = m.open_orders().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].price, dec!(130));
    }

    #[test]
    fn place_order_dispatches_on_kind_and_price() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        assert!(!m.place_order(OrderType::Limit, OrderSide::Buy, dec!(1), None).unwrap());
        assert!(!m.place_order(OrderType::Limit, OrderSide::Buy, dec!(1), Some(dec!(-1))).unwrap());
        assert!(m.place_order(OrderType::Limit, OrderSide::Buy, dec!(1), Some(dec!(90))).unwrap());
        assert!(m.place_order(OrderType::Market, OrderSide::Buy, dec!(1), None).unwrap());
        assert_eq!(m.open_order_count(), 1);
        assert_eq!(m.portfolio().trade_count, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let mut m = market(&[dec!(100), dec!(101)], MarketSettings::default());
        m.place_market_order(OrderSide::Buy, dec!(1)).unwrap();
        m.place_limit_order(OrderSide::Sell, dec!(1), dec!(200)).unwrap();
        m.set_current_index(1);
        m.save_history(dec!(101));
        m.reset_portfolio(dec!(500), dec!(2));
        assert_eq!(m.current_index(), 0);
        assert_eq!(m.open_order_count(), 0);
        assert_eq!(m.history(), &MarketHistory::default());
        assert_eq!(m.portfolio(), &Portfolio::new(dec!(500), dec!(2)));
    }

    #[test]
    fn price_history_excludes_the_current_sample() {
        let mut m = market(&[dec!(1), dec!(2), dec!(3)], MarketSettings::default());
        assert!(m.price_history().is_empty());
        m.set_current_index(2);
        let seen: Vec<_> = m.price_history().iter().map(|p| p.price).collect();
        assert_eq!(seen, vec![dec!(1), dec!(2)]);
    }

    #[test]
    fn save_history_marks_profit_rate() {
        let mut m = market(&[dec!(100)], MarketSettings::default());
        m.place_market_order(OrderSide::Buy, dec!(1)).unwrap();
        m.save_history(dec!(200));
        assert_eq!(m.portfolio().total_value, dec!(1100));
        assert_eq!(m.portfolio().profit_rate, dec!(1.1));
        assert_eq!(m.history().total_value, vec![dec!(1100)]);
        assert_eq!(m.history().position, vec![dec!(1)]);
    }
}
