use crate::error::StrategyError;
use crate::state::{BollingerState, GeneratorState};
use crate::{price_to_f64, SignalGenerator};
use core_types::{StrategyParams, TradeSignal};
use rust_decimal::prelude::*;
use ta::indicators::{BollingerBands as Bands, StandardDeviation as Sd};
use ta::Next;
use tracing::debug;

/// Bollinger band breakout.
///
/// Prices enter the bands truncated to whole units, over a window of `window_size`.
/// Bands use the population standard deviation. With `reverse` unset, a price above
/// the upper band sells and a price below the lower band buys; `reverse` swaps the two.
/// No signal is produced until the window is full.
pub struct BollingerBands {
    window_size: usize,
    num_std_dev: f64,
    reverse: bool,
    bands: Bands,
    std_dev: Sd,
    state: BollingerState,
}

fn indicators(window_size: usize, num_std_dev: f64) -> Result<(Bands, Sd), StrategyError> {
    let bands = Bands::new(window_size, num_std_dev)
        .map_err(|e| StrategyError::IndicatorError(format!("window_size: {e:?}")))?;
    let std_dev =
        Sd::new(window_size).map_err(|e| StrategyError::IndicatorError(format!("window_size: {e:?}")))?;
    Ok((bands, std_dev))
}

impl BollingerBands {
    pub const NAME: &'static str = "bollinger_bands";

    pub fn new() -> Result<Self, StrategyError> {
        let (bands, std_dev) = indicators(300, 1.5)?;
        Ok(Self {
            window_size: 300,
            num_std_dev: 1.5,
            reverse: true,
            bands,
            std_dev,
            state: BollingerState::default(),
        })
    }

    pub fn with_params(params: &StrategyParams) -> Result<Self, StrategyError> {
        let mut generator = Self::new()?;
        generator.reset_params(params)?;
        Ok(generator)
    }
}

impl SignalGenerator for BollingerBands {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn default_params(&self) -> StrategyParams {
        StrategyParams::new()
            .with("window_size", 300)
            .with("num_std_dev", 1.5)
            .with("reverse", true)
    }

    fn reset_params(&mut self, params: &StrategyParams) -> Result<(), StrategyError> {
        self.window_size = params.require_window("window_size")?;
        self.num_std_dev = params.require_f64("num_std_dev")?;
        self.reverse = match params.get("reverse") {
            Some(_) => params.require_bool("reverse")?,
            None => false,
        };
        (self.bands, self.std_dev) = indicators(self.window_size, self.num_std_dev)?;
        self.state = BollingerState::default();
        Ok(())
    }

    fn generate_signal(&mut self, price: Decimal) -> Result<TradeSignal, StrategyError> {
        let quantized = price.trunc().to_i64().ok_or_else(|| {
            StrategyError::IndicatorError(format!("price {price} does not fit a whole-unit buffer"))
        })?;
        let quantized = quantized as f64;
        let bands = self.bands.next(quantized);
        let std_dev = self.std_dev.next(quantized);
        self.state.buffered = (self.state.buffered + 1).min(self.window_size);

        if self.state.buffered < 2 {
            return Ok(TradeSignal::Hold);
        }
        let (upper, lower) = (bands.upper, bands.lower);
        self.state.mean = Some(bands.average);
        self.state.std_dev = Some(std_dev);
        self.state.upper_band = Some(upper);
        self.state.lower_band = Some(lower);

        if self.state.buffered < self.window_size {
            return Ok(TradeSignal::Hold);
        }

        let x = price_to_f64(price)?;
        let breakout = if x > upper {
            TradeSignal::Sell
        } else if x < lower {
            TradeSignal::Buy
        } else {
            TradeSignal::Hold
        };
        let signal = if self.reverse { breakout.inverted() } else { breakout };

        if signal != TradeSignal::Hold {
            debug!(%signal, price = x, upper, lower, "bollinger breakout");
        }
        Ok(signal)
    }

    fn state(&self) -> GeneratorState {
        GeneratorState::BollingerBands(self.state.clone())
    }
}
