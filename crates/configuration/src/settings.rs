use core_types::{StrategyParams, TargetParams};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// The root configuration structure for the entire application.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub market: MarketSettings,
    #[serde(default)]
    pub run: RunConfig,
    pub backtest: BacktestSettings,
    #[serde(default)]
    pub optimizer: OptimizerSettings,
    #[serde(default)]
    pub logging: LogSettings,
}

/// Parameters of the simulated venue.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct MarketSettings {
    /// Flat fee charged on every fill, as a fraction of the filled quantity.
    /// 0.001 corresponds to 0.1%.
    #[serde(default)]
    pub fee_rate: Decimal,

    /// Switches the market from spot accounting to FIFO lot netting with margin checks.
    #[serde(default)]
    pub is_margin_mode: bool,

    #[serde(default = "default_one")]
    pub leverage: Decimal,

    #[serde(default = "default_one")]
    pub lot_size: Decimal,
}

impl Default for MarketSettings {
    fn default() -> Self {
        Self {
            fee_rate: Decimal::ZERO,
            is_margin_mode: false,
            leverage: Decimal::ONE,
            lot_size: Decimal::ONE,
        }
    }
}

/// Trade-enablement policy consulted once per step by the backtest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct RunConfig {
    #[serde(default = "default_true")]
    pub trade_enabled: bool,

    /// Signals are ignored while this many limit orders are resting.
    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: usize,
}

impl RunConfig {
    /// Whether a signal observed with `open_orders` resting orders may be acted on.
    pub fn allows_trading(&self, open_orders: usize) -> bool {
        self.trade_enabled && open_orders < self.max_open_orders
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            trade_enabled: true,
            max_open_orders: usize::MAX,
        }
    }
}

/// A single backtest run: which components, which capital, which parameters.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BacktestSettings {
    /// Registered name of the signal generator, e.g. "bollinger_bands".
    pub signal_generator: String,
    /// Registered name of the trade executor, e.g. "normal".
    pub trade_executor: String,
    pub start_cash: Decimal,
    #[serde(default)]
    pub start_coin: Decimal,
    /// Overrides on top of the components' default parameters.
    #[serde(default)]
    pub params: StrategyParams,
    /// Diagnostic state keys to record at every step.
    #[serde(default)]
    pub hold_params: Vec<String>,
    /// Human-readable sampling step of the price data, e.g. "1m". Only stored in summaries.
    #[serde(default)]
    pub data_interval: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OracleKind {
    /// Tree-structured Parzen estimator.
    #[default]
    Tpe,
    Random,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct OptimizerSettings {
    #[serde(default = "default_n_calls")]
    pub n_calls: usize,
    #[serde(default)]
    pub random_state: u64,
    #[serde(default)]
    pub oracle: OracleKind,
    /// Random candidates drawn before the TPE model takes over.
    #[serde(default = "default_n_initial_points")]
    pub n_initial_points: usize,
    /// Share of the observed trials the TPE model treats as "good", in `(0, 1]`.
    #[serde(default = "default_gamma")]
    pub gamma: f64,
    /// Capacity of the trial progress channel. Trials are dropped, never awaited, when full.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Every parameter the strategy needs; ranges are searched, scalars held constant.
    #[serde(default)]
    pub target: TargetParams,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            n_calls: default_n_calls(),
            random_state: 0,
            oracle: OracleKind::default(),
            n_initial_points: default_n_initial_points(),
            gamma: default_gamma(),
            channel_capacity: default_channel_capacity(),
            target: TargetParams::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LogSettings {
    /// Default filter directive; `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// When set, logs are also written to a daily rolling file in this directory.
    #[serde(default)]
    pub directory: Option<String>,
    #[serde(default = "default_log_file_prefix")]
    pub file_prefix: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            directory: None,
            file_prefix: default_log_file_prefix(),
        }
    }
}

fn default_one() -> Decimal {
    Decimal::ONE
}

fn default_true() -> bool {
    true
}

fn default_max_open_orders() -> usize {
    usize::MAX
}

fn default_n_calls() -> usize {
    100
}

fn default_n_initial_points() -> usize {
    10
}

fn default_gamma() -> f64 {
    0.25
}

fn default_channel_capacity() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file_prefix() -> String {
    "tradesim.log".to_string()
}
