//! Typed working state of every component, exposed read-only for diagnostics.
//!
//! Each variant owns its own struct; [`GeneratorState::value`] and
//! [`ExecutorState::value`] give the backtest loop a uniform way to sample a named
//! scalar for held diagnostic series.

use serde::Serialize;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MaCrossoverState {
    pub observations: usize,
    pub short_mavg: Option<f64>,
    pub long_mavg: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MacdState {
    pub count: usize,
    pub ema_short: Option<f64>,
    pub ema_long: Option<f64>,
    pub macd: Option<f64>,
    pub signal_line: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BollingerState {
    pub buffered: usize,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub upper_band: Option<f64>,
    pub lower_band: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GeneratorState {
    MovingAverageCrossover(MaCrossoverState),
    Macd(MacdState),
    BollingerBands(BollingerState),
}

impl GeneratorState {
    /// The current value of a named diagnostic, or `None` if the key is unknown or the
    /// indicator has not produced it yet.
    pub fn value(&self, key: &str) -> Option<f64> {
        match self {
            GeneratorState::MovingAverageCrossover(s) => match key {
                "observations" => Some(s.observations as f64),
                "short_mavg" => s.short_mavg,
                "long_mavg" => s.long_mavg,
                _ => None,
            },
            GeneratorState::Macd(s) => match key {
                "count" => Some(s.count as f64),
                "ema_short" => s.ema_short,
                "ema_long" => s.ema_long,
                "macd" => s.macd,
                "signal_line" => s.signal_line,
                _ => None,
            },
            GeneratorState::BollingerBands(s) => match key {
                "buffered" => Some(s.buffered as f64),
                "mean" => s.mean,
                "std_dev" => s.std_dev,
                "upper_band" => s.upper_band,
                "lower_band" => s.lower_band,
                _ => None,
            },
        }
    }

    /// Whether `key` names a diagnostic of this variant, defined yet or not.
    pub fn has_key(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }

    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            GeneratorState::MovingAverageCrossover(_) => &["observations", "short_mavg", "long_mavg"],
            GeneratorState::Macd(_) => &["count", "ema_short", "ema_long", "macd", "signal_line"],
            GeneratorState::BollingerBands(_) => {
                &["buffered", "mean", "std_dev", "upper_band", "lower_band"]
            }
        }
    }
}

/// Outcome counters of the orders an executor attempted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TradeCounts {
    pub trade_count_ok: u64,
    pub trade_count_ng: u64,
}

impl TradeCounts {
    pub fn record(&mut self, accepted: bool) {
        if accepted {
            self.trade_count_ok += 1;
        } else {
            self.trade_count_ng += 1;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalState {
    pub counts: TradeCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SpreadOrderState {
    pub buy_count: u64,
    pub counts: TradeCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorState {
    Normal(NormalState),
    SpreadOrder(SpreadOrderState),
}

impl ExecutorState {
    pub fn value(&self, key: &str) -> Option<f64> {
        let counts = match self {
            ExecutorState::Normal(s) => &s.counts,
            ExecutorState::SpreadOrder(s) => {
                if key == "buy_count" {
                    return Some(s.buy_count as f64);
                }
                &s.counts
            }
        };
        match key {
            "trade_count_ok" => Some(counts.trade_count_ok as f64),
            "trade_count_ng" => Some(counts.trade_count_ng as f64),
            _ => None,
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.keys().contains(&key)
    }

    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            ExecutorState::Normal(_) => &["trade_count_ok", "trade_count_ng"],
            ExecutorState::SpreadOrder(_) => &["buy_count", "trade_count_ok", "trade_count_ng"],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_bands_read_as_none_but_are_known_keys() {
        let state = GeneratorState::BollingerBands(BollingerState::default());
        assert!(state.has_key("upper_band"));
        assert_eq!(state.value("upper_band"), None);
        assert_eq!(state.value("buffered"), Some(0.0));
        assert!(!state.has_key("macd"));
    }

    #[test]
    fn spread_state_exposes_ladder_depth() {
        let state = ExecutorState::SpreadOrder(SpreadOrderState {
            buy_count: 3,
            counts: TradeCounts { trade_count_ok: 4, trade_count_ng: 1 },
        });
        assert_eq!(state.value("buy_count"), Some(3.0));
        assert_eq!(state.value("trade_count_ng"), Some(1.0));
        assert_eq!(state.value("nope"), None);
    }
}
