use crate::error::ConfigError;
use core_types::ParamValue;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Defines a grid search job. This is deserialized from a `grid.toml` file.
#[derive(Debug, Clone, Deserialize)]
pub struct GridConfig {
    pub parameter_space: BTreeMap<String, ParameterRange>,
    /// Evaluate parameter sets on the rayon pool instead of one after another.
    #[serde(default)]
    pub parallel: bool,
}

/// Represents a range of values for a single parameter to be tested.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ParameterRange {
    DiscreteInt(Vec<i64>),
    DiscreteDecimal(Vec<Decimal>),
    LinearInt { start: i64, end: i64, step: i64 },
    LinearDecimal { start: Decimal, end: Decimal, step: Decimal },
    /// Anything else: booleans, names.
    Values(Vec<ParamValue>),
}

impl ParameterRange {
    /// Expands the range into the concrete values it covers, in ascending order for
    /// linear ranges and declaration order otherwise.
    pub fn values(&self, name: &str) -> Result<Vec<ParamValue>, ConfigError> {
        let values: Vec<ParamValue> = match self {
            ParameterRange::DiscreteInt(vals) => vals.iter().map(|&v| v.into()).collect(),
            ParameterRange::DiscreteDecimal(vals) => vals.iter().map(|&v| v.into()).collect(),
            ParameterRange::LinearInt { start, end, step } => {
                if *step <= 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "Step for '{name}' must be positive."
                    )));
                }
                (*start..=*end).step_by(*step as usize).map(Into::into).collect()
            }
            ParameterRange::LinearDecimal { start, end, step } => {
                if step.is_sign_negative() || step.is_zero() {
                    return Err(ConfigError::ValidationError(format!(
                        "Step for '{name}' must be positive."
                    )));
                }
                let mut vals = Vec::new();
                let mut current = *start;
                while current <= *end {
                    vals.push(current.into());
                    current += *step;
                }
                vals
            }
            ParameterRange::Values(vals) => vals.clone(),
        };
        if values.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Parameter '{name}' expands to no values."
            )));
        }
        Ok(values)
    }
}

pub fn load_grid_config(path: &str) -> Result<GridConfig, ConfigError> {
    let grid = config::Config::builder()
        .add_source(config::File::with_name(path))
        .build()?
        .try_deserialize::<GridConfig>()?;
    if grid.parameter_space.is_empty() {
        return Err(ConfigError::ValidationError(
            "grid parameter_space must declare at least one parameter".to_string(),
        ));
    }
    Ok(grid)
}
