use crate::error::StrategyError;
use crate::state::{GeneratorState, MaCrossoverState};
use crate::{price_to_f64, SignalGenerator};
use core_types::{StrategyParams, TradeSignal};
use rust_decimal::Decimal;
use ta::indicators::SimpleMovingAverage as Sma;
use ta::Next;
use tracing::debug;

/// Simple moving average crossover.
///
/// Holds for the first `long_window` prices, so that both averages can also be read
/// one tick earlier. A Buy additionally requires the long average to be rising; a Sell
/// has no slope condition.
///
/// A tie on the previous tick counts as a cross (`short_prev <= long_prev` for a Buy,
/// `>=` for a Sell). A series that sits flat and then steps moves both averages off the
/// same value at once, and a strict comparison would never see that as a cross.
pub struct MovingAverageCrossover {
    short_window: usize,
    long_window: usize,
    sma_short: Sma,
    sma_long: Sma,
    // Previous outputs of both averages, to detect the crossover event.
    short_prev: Option<f64>,
    long_prev: Option<f64>,
    state: MaCrossoverState,
}

fn sma(name: &str, window: usize) -> Result<Sma, StrategyError> {
    Sma::new(window).map_err(|e| StrategyError::IndicatorError(format!("{name}: {e:?}")))
}

impl MovingAverageCrossover {
    pub const NAME: &'static str = "moving_average_crossover";

    pub fn new() -> Result<Self, StrategyError> {
        Ok(Self {
            short_window: 50,
            long_window: 100,
            sma_short: sma("short_window", 50)?,
            sma_long: sma("long_window", 100)?,
            short_prev: None,
            long_prev: None,
            state: MaCrossoverState::default(),
        })
    }

    pub fn with_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let mut generator = Self::new()?;
        generator.reset_params(params)?;
        Ok(generator)
    }
}

impl SignalGenerator for MovingAverageCrossover {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("short_window", 50)
            .with("long_window", 100)
    }

    fn reset_params(&mut self, params: &StrategyParams) -> Result<(), StrategyError> {
        self.short_window = params.require_window("short_window")?;
        self.long_window = params.require_window("long_window")?;
        self.sma_short = sma("short_window", self.short_window)?;
        self.sma_long = sma("long_window", self.long_window)?;
        self.short_prev = None;
        self.long_prev = None;
        self.state = MaCrossoverState::default();
        Ok(())
    }

    fn generate_signal(&mut self, price: Decimal) -> Result<TradeSignal, StrategyError> {
        let x = price_to_f64(price)?;
        let short_now = self.sma_short.next(x);
        let long_now = self.sma_long.next(x);
        self.state.observations += 1;

        let short_prev = self.short_prev.replace(short_now);
        let long_prev = self.long_prev.replace(long_now);
        if self.state.observations <= self.long_window {
            return Ok(TradeSignal::Hold);
        }
        let (Some(short_prev), Some(long_prev)) = (short_prev, long_prev) else {
            return Ok(TradeSignal::Hold);
        };
        self.state.short_mavg = Some(short_now);
        self.state.long_mavg = Some(long_now);

        let signal = if short_now > long_now && short_prev <= long_prev && long_now > long_prev {
            TradeSignal::Buy
        } else if short_now < long_now && short_prev >= long_prev {
            TradeSignal::Sell
        } else {
            TradeSignal::Hold
        };

        if signal != TradeSignal::Hold {
            debug!(%signal, short_now, long_now, short_prev, long_prev, "moving average crossover");
        }
        Ok(signal)
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::MovingAverageCrossover(self.state.clone())
    }
}
