use crate::error::SummaryError;
use chrono::{DateTime, Utc};
use core_types::{PriceSeries, StrategyParams};
use market::Portfolio;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

/// A finished run written to disk so it can be inspected or repeated later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub data_range: DataRange,
    #[serde(default)]
    pub data_interval: Option<String>,
    pub signal_generator: String,
    pub trade_executor: String,
    pub params: StrategyParams,
    pub portfolio_result: Portfolio,
}

impl ResultSummary {
    pub fn new(
        series: &PriceSeries,
        data_interval: Option<String>,
        signal_generator: impl Into<String>,
        trade_executor: impl Into<String>,
        params: StrategyParams,
        portfolio_result: Portfolio,
    ) -> Self {
        let (start, end) = series.range();
        Self {
            data_range: DataRange { start, end },
            data_interval,
            signal_generator: signal_generator.into(),
            trade_executor: trade_executor.into(),
            params,
            portfolio_result,
        }
    }

    /// `result_<stamp>_<generator>_<executor>_<profit rate>.json`
    pub fn file_name(&self, now: DateTime<Utc>) -> String {
        format!(
            "result_{}_{}_{}_{:.3}.json",
            now.format("%Y%m%d_%H%M%S"),
            self.signal_generator,
            self.trade_executor,
            self.portfolio_result.profit_rate
        )
    }

    /// Writes pretty JSON into `dir`, creating it if needed, and returns the file path.
    pub fn save(&self, dir: &Path) -> Result<PathBuf, SummaryError> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name(Utc::now()));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        info!(path = %path.display(), "result summary saved");
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self, SummaryError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// What a follow-up run needs: generator name, executor name and parameters.
    pub fn into_run_spec(self) -> (String, String, StrategyParams) {
        (self.signal_generator, self.trade_executor, self.params)
    }
}
