use crate::bollinger::BollingerBands;
use crate::error::StrategyError;
use crate::executors::{NormalExecutor, SpreadOrderExecutor};
use crate::ma_crossover::MovingAverageCrossover;
use crate::macd::Macd;
use crate::{SignalGenerator, TradeExecutor};
use std::collections::BTreeMap;
use std::sync::Arc;

pub type GeneratorFactory = Arc<dyn Fn() -> Result<Box<dyn SignalGenerator>, StrategyError> + Send + Sync>;
pub type ExecutorFactory = Arc<dyn Fn() -> Result<Box<dyn TradeExecutor>, StrategyError> + Send + Sync>;

fn boxed_generator<G: SignalGenerator + 'static>(g: G) -> Result<Box<dyn SignalGenerator>, StrategyError> {
    Ok(Box::new(g))
}

fn boxed_executor<E: TradeExecutor + 'static>(e: E) -> Result<Box<dyn TradeExecutor>, StrategyError> {
    Ok(Box::new(e))
}

/// Maps stable component names to constructors.
///
/// Components are registered explicitly, either by `with_builtins` or by callers that
/// bring their own. Constructed components carry their default parameters and must
/// still be reset with the run's parameters before use.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    generators: BTreeMap<String, GeneratorFactory>,
    executors: BTreeMap<String, ExecutorFactory>,
}

impl ComponentRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every component shipped with this crate.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.generators.insert(
            MovingAverageCrossover::NAME.to_string(),
            Arc::new(|| MovingAverageCrossover::new().and_then(boxed_generator)),
        );
        registry.generators.insert(
            Macd::NAME.to_string(),
            Arc::new(|| Macd::new().and_then(boxed_generator)),
        );
        registry.generators.insert(
            BollingerBands::NAME.to_string(),
            Arc::new(|| BollingerBands::new().and_then(boxed_generator)),
        );
        registry.executors.insert(
            NormalExecutor::NAME.to_string(),
            Arc::new(|| boxed_executor(NormalExecutor::new())),
        );
        registry.executors.insert(
            SpreadOrderExecutor::NAME.to_string(),
            Arc::new(|| boxed_executor(SpreadOrderExecutor::new())),
        );
        registry
    }

    pub fn register_generator<F>(&mut self, name: &str, factory: F) -> Result<(), StrategyError>
    where
        F: Fn() -> Result<Box<dyn SignalGenerator>, StrategyError> + Send + Sync + 'static,
    {
        if self.generators.contains_key(name) {
            return Err(StrategyError::AlreadyRegistered(name.to_string()));
        }
        self.generators.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn register_executor<F>(&mut self, name: &str, factory: F) -> Result<(), StrategyError>
    where
        F: Fn() -> Result<Box<dyn TradeExecutor>, StrategyError> + Send + Sync + 'static,
    {
        if self.executors.contains_key(name) {
            return Err(StrategyError::AlreadyRegistered(name.to_string()));
        }
        self.executors.insert(name.to_string(), Arc::new(factory));
        Ok(())
    }

    pub fn create_generator(&self, name: &str) -> Result<Box<dyn SignalGenerator>, StrategyError> {
        let factory = self
            .generators
            .get(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))?;
        factory()
    }

    pub fn create_executor(&self, name: &str) -> Result<Box<dyn TradeExecutor>, StrategyError> {
        let factory = self
            .executors
            .get(name)
            .ok_or_else(|| StrategyError::NotFound(name.to_string()))?;
        factory()
    }

    /// Registered generator names, sorted.
    pub fn generator_names(&self) -> Vec<&str> {
        self.generators.keys().map(String::as_str).collect()
    }

    /// Registered executor names, sorted.
    pub fn executor_names(&self) -> Vec<&str> {
        self.executors.keys().map(String::as_str).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_listed_by_name() {
        let registry = ComponentRegistry::with_builtins();
        assert_eq!(
            registry.generator_names(),
            vec!["bollinger_bands", "macd", "moving_average_crossover"]
        );
        assert_eq!(registry.executor_names(), vec!["normal", "spread_order"]);
    }

    #[test]
    fn created_components_report_their_name() {
        let registry = ComponentRegistry::with_builtins();
        for name in registry.generator_names() {
            assert_eq!(registry.create_generator(name).unwrap().name(), name);
        }
        for name in registry.executor_names() {
            assert_eq!(registry.create_executor(name).unwrap().name(), name);
        }
    }

    #[test]
    fn unknown_name_is_not_found() {
        let registry = ComponentRegistry::with_builtins();
        assert!(matches!(
            registry.create_generator("rsi"),
            Err(StrategyError::NotFound(name)) if name == "rsi"
        ));
    }

    #[test]
    fn duplicate_registration_is_refused() {
        let mut registry = ComponentRegistry::with_builtins();
        let result = registry.register_executor("normal", || boxed_executor(NormalExecutor::new()));
        assert!(matches!(result, Err(StrategyError::AlreadyRegistered(_))));
        registry
            .register_executor("normal_v2", || boxed_executor(NormalExecutor::new()))
            .unwrap();
        assert!(registry.create_executor("normal_v2").is_ok());
    }
}
