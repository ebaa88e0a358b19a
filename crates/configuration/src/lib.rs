use crate::error::ConfigError;
use rust_decimal::Decimal;

// Declare the modules that make up this crate.
pub mod error;
pub mod grid_config;
pub mod logging;
pub mod settings;

// Re-export the core types to provide a clean public API.
pub use grid_config::{load_grid_config, GridConfig, ParameterRange};
pub use logging::init_tracing;
pub use settings::{
    BacktestSettings, Config, LogSettings, MarketSettings, OptimizerSettings, OracleKind,
    RunConfig,
};

/// Environment variables with this prefix override file values,
/// e.g. `TRADESIM__MARKET__FEE_RATE=0.001`.
pub const ENV_PREFIX: &str = "TRADESIM";

/// Loads the application configuration from a TOML file layered with environment overrides.
///
/// This function is the primary entry point for this crate. It reads the configuration file,
/// deserializes it into our strongly-typed `Config` struct, validates it, and returns it.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    let builder = config::Config::builder()
        .add_source(config::File::with_name(path))
        .add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .try_parsing(true),
        )
        .build()?;

    let config = builder.try_deserialize::<Config>()?;
    validate(&config)?;
    Ok(config)
}

/// Same as [`load_config`] but from an in-memory TOML document, without environment overrides.
pub fn load_config_from_str(toml: &str) -> Result<Config, ConfigError> {
    let config = config::Config::builder()
        .add_source(config::File::from_str(toml, config::FileFormat::Toml))
        .build()?
        .try_deserialize::<Config>()?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<(), ConfigError> {
    let market = &config.market;
    if market.fee_rate.is_sign_negative() {
        return Err(ConfigError::ValidationError(format!(
            "market.fee_rate must be >= 0, got {}",
            market.fee_rate
        )));
    }
    if market.leverage <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(format!(
            "market.leverage must be > 0, got {}",
            market.leverage
        )));
    }
    if market.lot_size <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(format!(
            "market.lot_size must be > 0, got {}",
            market.lot_size
        )));
    }
    if config.backtest.start_cash <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(format!(
            "backtest.start_cash must be > 0, got {}",
            config.backtest.start_cash
        )));
    }
    if config.backtest.start_coin.is_sign_negative() {
        return Err(ConfigError::ValidationError(format!(
            "backtest.start_coin must be >= 0, got {}",
            config.backtest.start_coin
        )));
    }
    if config.optimizer.n_calls == 0 {
        return Err(ConfigError::ValidationError(
            "optimizer.n_calls must be >= 1".to_string(),
        ));
    }
    if config.optimizer.channel_capacity == 0 {
        return Err(ConfigError::ValidationError(
            "optimizer.channel_capacity must be >= 1".to_string(),
        ));
    }
    let gamma = config.optimizer.gamma;
    if !(gamma > 0.0 && gamma <= 1.0) {
        return Err(ConfigError::ValidationError(format!(
            "optimizer.gamma must be in (0, 1], got {gamma}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::{ParamEntry, ParamSpec, ParamValue};
    use rust_decimal_macros::dec;
    use std::io::Write;

    const SAMPLE: &str = r#"
        [market]
        fee_rate = 0.001
        is_margin_mode = false

        [run]
        max_open_orders = 3

        [backtest]
        signal_generator = "bollinger_bands"
        trade_executor = "spread_order"
        start_cash = 100000
        hold_params = ["upper_band", "lower_band"]

        [backtest.params]
        window_size = 20
        num_std_dev = 2.0
        reverse = false

        [optimizer]
        n_calls = 50
        random_state = 7

        [optimizer.target]
        window_size = { kind = "integer", low = 10, high = 300 }
        num_std_dev = { kind = "real", low = 1.0, high = 5.0 }
        one_order_quantity = 0.001
    "#;

    #[test]
    fn parses_full_document() {
        let config = load_config_from_str(SAMPLE).unwrap();
        assert_eq!(config.market.fee_rate, dec!(0.001));
        assert_eq!(config.market.leverage, Decimal::ONE);
        assert!(config.run.trade_enabled);
        assert_eq!(config.run.max_open_orders, 3);
        assert_eq!(config.backtest.start_cash, dec!(100000));
        assert_eq!(config.backtest.start_coin, Decimal::ZERO);
        assert_eq!(config.backtest.params.get("window_size"), Some(&ParamValue::Int(20)));
        assert_eq!(config.optimizer.n_calls, 50);
        assert_eq!(config.optimizer.oracle, OracleKind::Tpe);
        assert_eq!(config.optimizer.gamma, 0.25);
        assert_eq!(
            config.optimizer.target.get("window_size"),
            Some(&ParamEntry::Tunable(ParamSpec::Integer { low: 10, high: 300 }))
        );
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn run_config_defaults_allow_everything() {
        let run = RunConfig::default();
        assert!(run.allows_trading(0));
        assert!(run.allows_trading(1_000_000));
        let limited = RunConfig { trade_enabled: true, max_open_orders: 2 };
        assert!(limited.allows_trading(1));
        assert!(!limited.allows_trading(2));
        let disabled = RunConfig { trade_enabled: false, ..RunConfig::default() };
        assert!(!disabled.allows_trading(0));
    }

    #[test]
    fn rejects_non_positive_leverage() {
        let doc = SAMPLE.replace("is_margin_mode = false", "leverage = 0");
        assert!(matches!(
            load_config_from_str(&doc),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn rejects_zero_trials() {
        let doc = SAMPLE.replace("n_calls = 50", "n_calls = 0");
        assert!(load_config_from_str(&doc).is_err());
    }

    #[test]
    fn gamma_must_be_a_share() {
        let doc = SAMPLE.replace("random_state = 7", "random_state = 7\ngamma = 0.4");
        assert_eq!(load_config_from_str(&doc).unwrap().optimizer.gamma, 0.4);
        for bad in ["0.0", "1.5"] {
            let doc = SAMPLE.replace("random_state = 7", &format!("random_state = 7\ngamma = {bad}"));
            assert!(matches!(
                load_config_from_str(&doc),
                Err(ConfigError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn loads_from_file_path() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let path = file.path().to_str().unwrap().to_string();
        let config = load_config(&path).unwrap();
        assert_eq!(config.backtest.signal_generator, "bollinger_bands");
    }
}
