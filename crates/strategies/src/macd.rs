use crate::error::StrategyError;
use crate::state::{GeneratorState, MacdState};
use crate::{price_to_f64, SignalGenerator};
use core_types::{StrategyParams, TradeSignal};
use rust_decimal::Decimal;
use ta::indicators::ExponentialMovingAverage as Ema;
use ta::{Next, Reset};
use tracing::debug;

/// Moving average convergence/divergence.
///
/// `macd = ema_short - ema_long`, and the signal line is an EMA of `macd`. The first
/// price seeds both EMAs, with `macd` and the signal line at zero. Whenever the previous
/// `macd` was exactly zero the signal line restarts from the current `macd`.
pub struct Macd {
    short_window: usize,
    long_window: usize,
    signal_window: usize,
    ema_short: Ema,
    ema_long: Ema,
    ema_signal: Ema,
    previous: Option<(f64, f64)>,
    state: MacdState,
}

fn ema(name: &str, window: usize) -> Result<Ema, StrategyError> {
    Ema::new(window).map_err(|e| StrategyError::IndicatorError(format!("{name}: {e:?}")))
}

impl Macd {
    pub const NAME: &'static str = "macd";

    pub fn new() -> Result<Self, StrategyError> {
        let mut generator = Self {
            short_window: 50,
            long_window: 100,
            signal_window: 75,
            ema_short: ema("short_window", 50)?,
            ema_long: ema("long_window", 100)?,
            ema_signal: ema("signal_window", 75)?,
            previous: None,
            state: MacdState::default(),
        };
        let defaults = generator.default_params();
        generator.reset_params(&defaults)?;
        Ok(generator)
    }

    pub fn with_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let mut generator = Self::new()?;
        generator.reset_params(params)?;
        Ok(generator)
    }
}

impl SignalGenerator for Macd {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("short_window", 50)
            .with("long_window", 100)
            .with("signal_window", 75)
    }

    fn reset_params(&mut self, params: &StrategyParams) -> Result<(), StrategyError> {
        self.short_window = params.require_window("short_window")?;
        self.long_window = params.require_window("long_window")?;
        self.signal_window = params.require_window("signal_window")?;
        self.ema_short = ema("short_window", self.short_window)?;
        self.ema_long = ema("long_window", self.long_window)?;
        self.ema_signal = ema("signal_window", self.signal_window)?;
        self.previous = None;
        self.state = MacdState::default();
        Ok(())
    }

    fn generate_signal(&mut self, price: Decimal) -> Result<TradeSignal, StrategyError> {
        let x = price_to_f64(price)?;
        let short = self.ema_short.next(x);
        let long = self.ema_long.next(x);

        let (macd, signal_line) = match self.previous {
            None => (0.0, 0.0),
            Some((macd_old, _)) => {
                let macd = short - long;
                if macd_old == 0.0 {
                    self.ema_signal.reset();
                }
                (macd, self.ema_signal.next(macd))
            }
        };

        let signal = match self.previous {
            Some((macd_old, sig_old)) if macd_old <= sig_old && macd > signal_line => TradeSignal::Buy,
            Some((macd_old, sig_old)) if macd_old >= sig_old && macd < signal_line => TradeSignal::Sell,
            _ => TradeSignal::Hold,
        };

        self.previous = Some((macd, signal_line));
        self.state = MacdState {
            count: self.state.count + 1,
            ema_short: Some(short),
            ema_long: Some(long),
            macd: Some(macd),
            signal_line: Some(signal_line),
        };

        if signal != TradeSignal::Hold {
            debug!(%signal, macd, signal_line, "macd crossover");
        }
        Ok(signal)
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::Macd(self.state.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn params(short: usize, long: usize, signal: usize) -> StrategyParams {
        StrategyParams::new()
            .with("short_window", short)
            .with("long_window", long)
            .with("signal_window", signal)
    }

    #[test]
    fn first_observation_seeds_emas_and_holds() {
        let mut g = Macd::with_params(&params(3, 6, 4)).unwrap();
        assert_eq!(g.generate_signal(dec!(100)).unwrap(), TradeSignal::Hold);
        let GeneratorState::Macd(s) = g.state() else { panic!("wrong state variant") };
        assert_eq!(s.ema_short, Some(100.0));
        assert_eq!(s.ema_long, Some(100.0));
        assert_eq!(s.macd, Some(0.0));
        assert_eq!(s.signal_line, Some(0.0));
    }

    #[test]
    fn ema_update_matches_closed_form() {
        let mut g = Macd::with_params(&params(3, 7, 4)).unwrap();
        g.generate_signal(dec!(100)).unwrap();
        g.generate_signal(dec!(110)).unwrap();
        let GeneratorState::Macd(s) = g.state() else { panic!("wrong state variant") };
        let short = 0.5 * 110.0 + 0.5 * 100.0;
        let long = 0.25 * 110.0 + 0.75 * 100.0;
        assert!((s.ema_short.unwrap() - short).abs() < 1e-12);
        assert!((s.ema_long.unwrap() - long).abs() < 1e-12);
        // The previous macd was zero, so the signal line restarts at macd.
        assert_eq!(s.signal_line, s.macd);
    }

    #[test]
    fn rally_then_selloff_produces_buy_then_sell() {
        let mut g = Macd::with_params(&params(2, 5, 3)).unwrap();
        let mut prices: Vec<Decimal> = vec![dec!(100); 5];
        prices.extend((1..=10).map(|i| Decimal::from(100 + i * 5)));
        prices.extend((1..=15).map(|i| Decimal::from(150 - i * 8)));
        let signals: Vec<TradeSignal> = prices.iter().map(|p| g.generate_signal(*p).unwrap()).collect();
        let first_buy = signals.iter().position(|s| *s == TradeSignal::Buy);
        let first_sell = signals.iter().position(|s| *s == TradeSignal::Sell);
        assert!(first_buy.is_some());
        assert!(first_sell.is_some());
        assert!(first_buy < first_sell);
    }

    #[test]
    fn fractional_window_is_rejected() {
        let p = StrategyParams::new()
            .with("short_window", 2.5)
            .with("long_window", 5)
            .with("signal_window", 3);
        assert!(Macd::with_params(&p).is_err());
    }
}
