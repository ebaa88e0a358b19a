use crate::error::StrategyError;
use crate::state::{ExecutorState, NormalState, SpreadOrderState};
use crate::TradeExecutor;
use core_types::{StrategyParams, TradeSignal};
use market::Market;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;

/// Places one fixed-size market order for every Buy or Sell signal.
pub struct NormalExecutor {
    one_order_quantity: Decimal,
    state: NormalState,
}

impl NormalExecutor {
    pub const NAME: &'static str = "normal";

    pub fn new() -> Self {
        Self {
            one_order_quantity: dec!(0.001),
            state: NormalState::default(),
        }
    }

    pub fn with_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let mut executor = Self::new();
        executor.reset_params(params)?;
        Ok(executor)
    }
}

impl Default for NormalExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeExecutor for NormalExecutor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_params(&self) -> StrategyParams {
        StrategyParams::new().with("one_order_quantity", 0.001)
    }

    fn reset_params(&mut self, params: &StrategyParams) -> Result<(), StrategyError> {
        self.one_order_quantity = params.require_decimal("one_order_quantity")?;
        self.state = NormalState::default();
        Ok(())
    }

    fn execute_trade(
        &mut self,
        market: &mut dyn Market,
        _price: Decimal,
        signal: TradeSignal,
    ) -> Result<(), StrategyError> {
        let Some(side) = signal.side() else {
            return Ok(());
        };
        let accepted = market.place_market_order(side, self.one_order_quantity)?;
        self.state.counts.record(accepted);
        Ok(())
    }

    fn state(&self) -> ExecutorState {
        ExecutorState::Normal(self.state.clone())
    }
}

/// Scales into a position one rung at a time.
///
/// Each accepted Buy adds a rung, up to `buy_count_limit`; each accepted Sell removes
/// one. Sells are ignored while no rung is held.
pub struct SpreadOrderExecutor {
    one_order_quantity: Decimal,
    buy_count_limit: u64,
    state: SpreadOrderState,
}

impl SpreadOrderExecutor {
    pub const NAME: &'static str = "spread_order";

    pub fn new() -> Self {
        Self {
            one_order_quantity: dec!(0.001),
            buy_count_limit: 10,
            state: SpreadOrderState::default(),
        }
    }

    pub fn with_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let mut executor = Self::new();
        executor.reset_params(params)?;
        Ok(executor)
    }

    pub fn buy_count(&self) -> u64 {
        self.state.buy_count
    }
}

impl Default for SpreadOrderExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl TradeExecutor for SpreadOrderExecutor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("one_order_quantity", 0.001)
            .with("buy_count_limit", 10)
    }

    fn reset_params(&mut self, params: &StrategyParams) -> Result<(), StrategyError> {
        self.one_order_quantity = params.require_decimal("one_order_quantity")?;
        self.buy_count_limit = params.require_count("buy_count_limit")?;
        self.state = SpreadOrderState::default();
        Ok(())
    }

    fn execute_trade(
        &mut self,
        market: &mut dyn Market,
        _price: Decimal,
        signal: TradeSignal,
    ) -> Result<(), StrategyError> {
        let allowed = match signal {
            TradeSignal::Buy => self.state.buy_count < self.buy_count_limit,
            TradeSignal::Sell => self.state.buy_count > 0,
            TradeSignal::Hold => false,
        };
        let Some(side) = signal.side().filter(|_| allowed) else {
            return Ok(());
        };

        let accepted = market.place_market_order(side, self.one_order_quantity)?;
        if accepted {
            match signal {
                TradeSignal::Buy => self.state.buy_count += 1,
                TradeSignal::Sell => self.state.buy_count -= 1,
                TradeSignal::Hold => {}
            }
        }
        self.state.counts.record(accepted);
        debug!(%signal, accepted, buy_count = self.state.buy_count, "spread order");
        Ok(())
    }

    fn state(&self) -> ExecutorState {
        ExecutorState::SpreadOrder(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::MarketSettings;
    use core_types::PriceSeries;
    use market::{BacktestMarket, SimulatedMarket};
    use proptest::prelude::*;
    use std::sync::Arc;

    fn market(cash: Decimal) -> SimulatedMarket {
        let series = PriceSeries::from_prices([dec!(100)]).unwrap();
        let mut m = SimulatedMarket::new(Arc::new(series), MarketSettings::default());
        m.reset_portfolio(cash, Decimal::ZERO);
        m
    }

    #[test]
    fn normal_executor_ignores_hold() {
        let mut m = market(dec!(1000));
        let mut ex = NormalExecutor::with_params(&StrategyParams::new().with("one_order_quantity", 1)).unwrap();
        ex.execute_trade(&mut m, dec!(100), TradeSignal::Hold).unwrap();
        assert!(m.history().signals.is_empty());
        ex.execute_trade(&mut m, dec!(100), TradeSignal::Buy).unwrap();
        assert_eq!(m.portfolio().position, dec!(1));
    }

    #[test]
    fn normal_executor_counts_refusals() {
        let mut m = market(dec!(50));
        let mut ex = NormalExecutor::with_params(&StrategyParams::new().with("one_order_quantity", 1)).unwrap();
        ex.execute_trade(&mut m, dec!(100), TradeSignal::Buy).unwrap();
        assert_eq!(ex.state().value("trade_count_ng"), Some(1.0));
    }

    #[test]
    fn ladder_stops_at_limit_and_sells_only_held_rungs() {
        let mut m = market(dec!(100000));
        let params = StrategyParams::new()
            .with("one_order_quantity", 1)
            .with("buy_count_limit", 2);
        let mut ex = SpreadOrderExecutor::with_params(&params).unwrap();

        for _ in 0..5 {
            ex.execute_trade(&mut m, dec!(100), TradeSignal::Buy).unwrap();
        }
        assert_eq!(ex.buy_count(), 2);
        assert_eq!(m.portfolio().trade_count, 2);

        for _ in 0..5 {
            ex.execute_trade(&mut m, dec!(100), TradeSignal::Sell).unwrap();
        }
        assert_eq!(ex.buy_count(), 0);
        assert_eq!(m.portfolio().trade_count, 4);
    }

    #[test]
    fn refused_buy_does_not_climb_the_ladder() {
        let mut m = market(dec!(50));
        let params = StrategyParams::new()
            .with("one_order_quantity", 1)
            .with("buy_count_limit", 3);
        let mut ex = SpreadOrderExecutor::with_params(&params).unwrap();
        ex.execute_trade(&mut m, dec!(100), TradeSignal::Buy).unwrap();
        assert_eq!(ex.buy_count(), 0);
        assert_eq!(ex.state().value("trade_count_ng"), Some(1.0));
    }

    fn signal() -> impl Strategy<Value = TradeSignal> {
        prop_oneof![Just(TradeSignal::Buy), Just(TradeSignal::Sell), Just(TradeSignal::Hold)]
    }

    proptest! {
        #[test]
        fn ladder_depth_stays_within_bounds(
            signals in prop::collection::vec(signal(), 0..200),
            limit in 0u64..6,
            cash in 0u32..2000,
        ) {
            let mut m = market(Decimal::from(cash));
            let params = StrategyParams::new()
                .with("one_order_quantity", 1)
                .with("buy_count_limit", limit as i64);
            let mut ex = SpreadOrderExecutor::with_params(&params).unwrap();
            for s in signals {
                ex.execute_trade(&mut m, dec!(100), s).unwrap();
                prop_assert!(ex.buy_count() <= limit);
            }
        }
    }
}
