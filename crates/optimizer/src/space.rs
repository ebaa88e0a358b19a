use crate::error::OracleError;
use core_types::{CoreError, ParamSpec, ParamValue, StrategyParams, TargetParams};

/// One candidate point: a value per tunable dimension, in dimension order.
pub type Candidate = Vec<ParamValue>;

/// A target split into the constants every trial shares and the dimensions searched.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchSpace {
    fixed: StrategyParams,
    dimensions: Vec<(String, ParamSpec)>,
}

impl SearchSpace {
    /// Partitions `target`. Dimensions are ordered by name.
    pub fn from_target(target: &TargetParams) -> Result<Self, CoreError> {
        let (fixed, dimensions) = target.partition()?;
        Ok(Self { fixed, dimensions })
    }

    pub fn fixed(&self) -> &StrategyParams {
        &self.fixed
    }

    pub fn dimensions(&self) -> &[(String, ParamSpec)] {
        &self.dimensions
    }

    pub fn specs(&self) -> Vec<ParamSpec> {
        self.dimensions.iter().map(|(_, spec)| spec.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.dimensions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dimensions.is_empty()
    }

    /// Whether `key` is supplied, either as a constant or as a dimension.
    pub fn covers(&self, key: &str) -> bool {
        self.fixed.contains_key(key) || self.dimensions.iter().any(|(name, _)| name == key)
    }

    /// Lays `candidate` over the constants, checking it against every dimension.
    pub fn merge(&self, candidate: &[ParamValue]) -> Result<StrategyParams, OracleError> {
        if candidate.len() != self.dimensions.len() {
            return Err(OracleError::DimensionMismatch {
                expected: self.dimensions.len(),
                got: candidate.len(),
            });
        }
        let mut params = self.fixed.clone();
        for ((name, spec), value) in self.dimensions.iter().zip(candidate) {
            if !spec.contains(value) {
                return Err(OracleError::OutOfSpace {
                    name: name.clone(),
                    value: value.clone(),
                });
            }
            params.insert(name.clone(), value.clone());
        }
        Ok(params)
    }
}
