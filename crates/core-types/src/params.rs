//! Strategy parameter vocabulary.
//!
//! A backtest run is configured by a flat [`StrategyParams`] map shared by the signal
//! generator and the trade executor. The optimizer works on [`TargetParams`], where
//! every key is either a fixed [`ParamValue`] or a tunable [`ParamSpec`] dimension.

use crate::error::CoreError;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single scalar parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Real(f64),
    Text(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Int(v) => Some(*v as f64),
            ParamValue::Real(v) => Some(*v),
            ParamValue::Bool(_) | ParamValue::Text(_) => None,
        }
    }

    /// Integer view; reals are accepted only when they carry no fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            ParamValue::Real(v) if v.is_finite() && v.fract() == 0.0 => Some(*v as i64),
            _ => None,
        }
    }

    /// Boolean view. Besides real booleans, the integer flags `0` and `1` are accepted
    /// so that an `Integer(0, 1)` search dimension can drive a switch.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            ParamValue::Int(0) => Some(false),
            ParamValue::Int(1) => Some(true),
            ParamValue::Text(s) => match s.as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            ParamValue::Int(v) => Some(Decimal::from(*v)),
            ParamValue::Real(v) => Decimal::from_f64(*v),
            ParamValue::Text(s) => s.parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Real(v) => write!(f, "{v}"),
            ParamValue::Text(v) => write!(f, "{v}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<i32> for ParamValue {
    fn from(v: i32) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<usize> for ParamValue {
    fn from(v: usize) -> Self {
        ParamValue::Int(v as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Real(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

impl From<Decimal> for ParamValue {
    fn from(v: Decimal) -> Self {
        match v.to_f64() {
            Some(f) => ParamValue::Real(f),
            None => ParamValue::Text(v.to_string()),
        }
    }
}

/// The concrete parameter map handed to a strategy for one run.
///
/// Keys are kept sorted so that iteration order (and anything derived from it) is
/// deterministic. Unknown keys are carried along and ignored by components.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyParams(BTreeMap<String, ParamValue>);

impl StrategyParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    /// Returns a copy of `self` with every entry of `other` laid over it.
    pub fn merged(&self, other: &StrategyParams) -> StrategyParams {
        let mut out = self.clone();
        for (k, v) in other.iter() {
            out.0.insert(k.clone(), v.clone());
        }
        out
    }

    /// Keys present in `required` but absent from `self`.
    pub fn missing_keys<'a>(&self, required: impl IntoIterator<Item = &'a String>) -> Vec<String> {
        required
            .into_iter()
            .filter(|k| !self.contains_key(k))
            .cloned()
            .collect()
    }

    fn require(&self, name: &str) -> Result<&ParamValue, CoreError> {
        self.get(name)
            .ok_or_else(|| CoreError::invalid_parameter(name, "missing required parameter"))
    }

    /// A window length or count: an integer >= 1.
    pub fn require_window(&self, name: &str) -> Result<usize, CoreError> {
        let value = self.require(name)?;
        match value.as_i64() {
            Some(v) if v >= 1 => Ok(v as usize),
            Some(v) => Err(CoreError::invalid_parameter(
                name,
                format!("must be >= 1, got {v}"),
            )),
            None => Err(CoreError::invalid_parameter(
                name,
                format!("expected an integer, got {value}"),
            )),
        }
    }

    /// A non-negative integer count.
    pub fn require_count(&self, name: &str) -> Result<u64, CoreError> {
        let value = self.require(name)?;
        match value.as_i64() {
            Some(v) if v >= 0 => Ok(v as u64),
            _ => Err(CoreError::invalid_parameter(
                name,
                format!("expected a non-negative integer, got {value}"),
            )),
        }
    }

    pub fn require_f64(&self, name: &str) -> Result<f64, CoreError> {
        let value = self.require(name)?;
        value
            .as_f64()
            .filter(|v| v.is_finite())
            .ok_or_else(|| CoreError::invalid_parameter(name, format!("expected a number, got {value}")))
    }

    pub fn require_decimal(&self, name: &str) -> Result<Decimal, CoreError> {
        let value = self.require(name)?;
        value
            .as_decimal()
            .ok_or_else(|| CoreError::invalid_parameter(name, format!("expected a number, got {value}")))
    }

    pub fn require_bool(&self, name: &str) -> Result<bool, CoreError> {
        let value = self.require(name)?;
        value.as_bool().ok_or_else(|| {
            CoreError::invalid_parameter(name, format!("expected a boolean or 0/1 flag, got {value}"))
        })
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for StrategyParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl fmt::Display for StrategyParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (k, v)) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}: {v}")?;
        }
        write!(f, "}}")
    }
}

/// A tunable search dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSpec {
    /// Inclusive integer range.
    Integer { low: i64, high: i64 },
    /// Inclusive real range.
    Real { low: f64, high: f64 },
    Categorical { values: Vec<ParamValue> },
}

impl ParamSpec {
    pub fn validate(&self, name: &str) -> Result<(), CoreError> {
        match self {
            ParamSpec::Integer { low, high } if low > high => Err(CoreError::invalid_parameter(
                name,
                format!("integer range is empty: [{low}, {high}]"),
            )),
            ParamSpec::Real { low, high } if !(low.is_finite() && high.is_finite()) || low > high => {
                Err(CoreError::invalid_parameter(
                    name,
                    format!("real range is invalid: [{low}, {high}]"),
                ))
            }
            ParamSpec::Categorical { values } if values.is_empty() => Err(
                CoreError::invalid_parameter(name, "categorical dimension has no values"),
            ),
            _ => Ok(()),
        }
    }

    /// Whether `value` lies inside this dimension.
    pub fn contains(&self, value: &ParamValue) -> bool {
        match (self, value) {
            (ParamSpec::Integer { low, high }, v) => {
                v.as_i64().is_some_and(|x| x >= *low && x <= *high)
            }
            (ParamSpec::Real { low, high }, v) => {
                v.as_f64().is_some_and(|x| x >= *low && x <= *high)
            }
            (ParamSpec::Categorical { values }, v) => values.contains(v),
        }
    }
}

/// One entry of an optimization target: either a constant or a search dimension.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamEntry {
    Tunable(ParamSpec),
    Fixed(ParamValue),
}

/// The optimizer's input: every parameter the strategy needs, some of them tunable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TargetParams(BTreeMap<String, ParamEntry>);

impl TargetParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fixed(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.0.insert(key.into(), ParamEntry::Fixed(value.into()));
        self
    }

    pub fn tunable(mut self, key: impl Into<String>, spec: ParamSpec) -> Self {
        self.0.insert(key.into(), ParamEntry::Tunable(spec));
        self
    }

    pub fn get(&self, key: &str) -> Option<&ParamEntry> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamEntry)> {
        self.0.iter()
    }

    /// Splits the target into its fixed constants and its ordered tunable dimensions.
    pub fn partition(&self) -> Result<(StrategyParams, Vec<(String, ParamSpec)>), CoreError> {
        let mut fixed = StrategyParams::new();
        let mut dims = Vec::new();
        for (name, entry) in &self.0 {
            match entry {
                ParamEntry::Fixed(v) => fixed.insert(name.clone(), v.clone()),
                ParamEntry::Tunable(spec) => {
                    spec.validate(name)?;
                    dims.push((name.clone(), spec.clone()));
                }
            }
        }
        Ok((fixed, dims))
    }
}

impl From<StrategyParams> for TargetParams {
    fn from(params: StrategyParams) -> Self {
        Self(
            params
                .iter()
                .map(|(k, v)| (k.clone(), ParamEntry::Fixed(v.clone())))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn window_accepts_integral_reals_only() {
        let params = StrategyParams::new()
            .with("a", 5)
            .with("b", 5.0)
            .with("c", 5.5)
            .with("d", 0);
        assert_eq!(params.require_window("a").unwrap(), 5);
        assert_eq!(params.require_window("b").unwrap(), 5);
        assert!(params.require_window("c").is_err());
        assert!(params.require_window("d").is_err());
        assert!(matches!(
            params.require_window("missing"),
            Err(CoreError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn bool_accepts_zero_one_flags() {
        let params = StrategyParams::new()
            .with("t", true)
            .with("one", 1)
            .with("zero", 0)
            .with("two", 2);
        assert!(params.require_bool("t").unwrap());
        assert!(params.require_bool("one").unwrap());
        assert!(!params.require_bool("zero").unwrap());
        assert!(params.require_bool("two").is_err());
    }

    #[test]
    fn decimal_view_of_reals() {
        let params = StrategyParams::new().with("q", 0.001);
        assert_eq!(params.require_decimal("q").unwrap(), dec!(0.001));
    }

    #[test]
    fn merged_overlays_right_hand_side() {
        let base = StrategyParams::new().with("a", 1).with("b", 2);
        let over = StrategyParams::new().with("b", 3).with("c", 4);
        let merged = base.merged(&over);
        assert_eq!(merged.get("a"), Some(&ParamValue::Int(1)));
        assert_eq!(merged.get("b"), Some(&ParamValue::Int(3)));
        assert_eq!(merged.get("c"), Some(&ParamValue::Int(4)));
    }

    #[test]
    fn missing_keys_lists_absent_required_names() {
        let required = StrategyParams::new().with("a", 1).with("b", 2);
        let given = StrategyParams::new().with("a", 1).with("extra", 9);
        assert_eq!(given.missing_keys(required.keys()), vec!["b".to_string()]);
    }

    #[test]
    fn partition_separates_constants_from_dimensions() {
        let target = TargetParams::new()
            .tunable("window_size", ParamSpec::Integer { low: 10, high: 300 })
            .tunable("num_std_dev", ParamSpec::Real { low: 1.0, high: 5.0 })
            .fixed("one_order_quantity", 0.001);
        let (fixed, dims) = target.partition().unwrap();
        assert_eq!(fixed.len(), 1);
        let names: Vec<_> = dims.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["num_std_dev", "window_size"]);
    }

    #[test]
    fn partition_rejects_empty_ranges() {
        let target = TargetParams::new().tunable("w", ParamSpec::Integer { low: 5, high: 1 });
        assert!(target.partition().is_err());
    }

    #[test]
    fn target_params_deserialize_from_mixed_json() {
        let json = r#"{
            "short_window": { "kind": "integer", "low": 12, "high": 180 },
            "mode": { "kind": "categorical", "values": ["a", "b"] },
            "one_order_quantity": 0.001,
            "reverse": true
        }"#;
        let target: TargetParams = serde_json::from_str(json).unwrap();
        assert_eq!(
            target.get("short_window"),
            Some(&ParamEntry::Tunable(ParamSpec::Integer { low: 12, high: 180 }))
        );
        assert_eq!(
            target.get("one_order_quantity"),
            Some(&ParamEntry::Fixed(ParamValue::Real(0.001)))
        );
        assert_eq!(target.get("reverse"), Some(&ParamEntry::Fixed(ParamValue::Bool(true))));
    }

    #[test]
    fn spec_contains_checks_bounds() {
        let spec = ParamSpec::Integer { low: 1, high: 3 };
        assert!(spec.contains(&ParamValue::Int(3)));
        assert!(!spec.contains(&ParamValue::Int(4)));
        let cat = ParamSpec::Categorical { values: vec!["x".into()] };
        assert!(cat.contains(&ParamValue::Text("x".into())));
    }
}
