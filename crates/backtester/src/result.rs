use market::Portfolio;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strategies::{ExecutorState, GeneratorState};

/// The outcome of one completed backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Final account snapshot.
    #[serde(flatten)]
    pub portfolio: Portfolio,
    /// Per-step samples of the requested diagnostics. `None` where the component had
    /// not produced the value yet.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub held: BTreeMap<String, Vec<Option<f64>>>,
}

impl BacktestResult {
    pub fn total_value(&self) -> rust_decimal::Decimal {
        self.portfolio.total_value
    }

    pub fn trade_count(&self) -> u64 {
        self.portfolio.trade_count
    }
}

/// Both components' working state plus the loop's step counter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyDynamic {
    pub count: usize,
    pub generator: GeneratorState,
    pub executor: ExecutorState,
}

impl StrategyDynamic {
    /// Looks `key` up in the generator first, then the executor. `None` for unknown keys.
    pub fn lookup(&self, key: &str) -> Option<Option<f64>> {
        if key == "count" {
            Some(Some(self.count as f64))
        } else if self.generator.has_key(key) {
            Some(self.generator.value(key))
        } else if self.executor.has_key(key) {
            Some(self.executor.value(key))
        } else {
            None
        }
    }
}
