use crate::error::OptimizerError;
use configuration::GridConfig;
use core_types::StrategyParams;
use itertools::Itertools;

/// Generates every unique combination of parameters from the defined parameter space.
///
/// Each combination is laid over `base`, so keys the grid does not vary keep their
/// configured value. Combinations are ordered with the last key (alphabetically)
/// varying fastest.
pub fn generate_parameter_sets(
    config: &GridConfig,
    base: &StrategyParams,
) -> Result<Vec<StrategyParams>, OptimizerError> {
    // 1. Convert all parameter ranges into concrete lists of values.
    let mut names = Vec::with_capacity(config.parameter_space.len());
    let mut value_lists = Vec::with_capacity(config.parameter_space.len());
    for (name, range) in &config.parameter_space {
        names.push(name.clone());
        value_lists.push(range.values(name)?);
    }
    if names.is_empty() {
        return Err(OptimizerError::ParameterGeneration(
            "parameter space is empty".to_string(),
        ));
    }

    // 2. Use itertools::multi_cartesian_product to generate all combinations.
    let sets = value_lists
        .into_iter()
        .multi_cartesian_product()
        .map(|product| {
            let overlay: StrategyParams = names.iter().cloned().zip(product).collect();
            base.merged(&overlay)
        })
        .collect();
    Ok(sets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use configuration::ParameterRange;
    use core_types::ParamValue;
    use std::collections::BTreeMap;

    fn grid(entries: Vec<(&str, ParameterRange)>) -> GridConfig {
        GridConfig {
            parameter_space: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
            parallel: false,
        }
    }

    #[test]
    fn product_covers_every_combination_over_base() {
        let config = grid(vec![
            ("long_window", ParameterRange::DiscreteInt(vec![10, 20])),
            ("short_window", ParameterRange::LinearInt { start: 2, end: 6, step: 2 }),
        ]);
        let base = StrategyParams::new()
            .with("one_order_quantity", 0.5)
            .with("short_window", 99);

        let sets = generate_parameter_sets(&config, &base).unwrap();

        assert_eq!(sets.len(), 6);
        assert!(sets.iter().all(|s| s.get("one_order_quantity") == Some(&ParamValue::Real(0.5))));
        let pairs: Vec<(i64, i64)> = sets
            .iter()
            .map(|s| {
                (
                    s.get("long_window").and_then(ParamValue::as_i64).unwrap(),
                    s.get("short_window").and_then(ParamValue::as_i64).unwrap(),
                )
            })
            .collect();
        assert_eq!(pairs, vec![(10, 2), (10, 4), (10, 6), (20, 2), (20, 4), (20, 6)]);
    }

    #[test]
    fn invalid_range_is_reported() {
        let config = grid(vec![("w", ParameterRange::LinearInt { start: 1, end: 5, step: 0 })]);
        assert!(matches!(
            generate_parameter_sets(&config, &StrategyParams::new()),
            Err(OptimizerError::Config(_))
        ));
    }
}
