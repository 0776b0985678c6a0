//! Builder for configured instance factories.

use std::sync::Arc;

use crate::config::FactoryConfig;
use crate::factory::InstanceFactory;
use crate::observer::{FactoryObserver, Observers};

/// Builder for an [`InstanceFactory`] with custom configuration or observers.
///
/// # Examples
///
/// ```
/// use ferrous_crucible::{FactoryBuilder, Lifecycle, MetricsObserver};
/// use std::sync::Arc;
///
/// let metrics = Arc::new(MetricsObserver::new());
/// let factory = FactoryBuilder::new()
///     .max_depth(32)
///     .pool_capacity(16)
///     .observer(metrics.clone())
///     .build();
///
/// factory.get_shared("a", || 1u32);
/// factory.get_shared("a", || 2u32);
///
/// assert_eq!(metrics.construction_count(), 1);
/// assert_eq!(metrics.cache_hit_count(), 1);
/// assert_eq!(factory.cached_count(Lifecycle::Shared), 1);
/// ```
#[derive(Default)]
pub struct FactoryBuilder {
    config: FactoryConfig,
    observers: Observers,
}

impl FactoryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: FactoryConfig) -> Self {
        self.config = config;
        self
    }

    /// Deepest construction stack allowed. Values below 1 are raised to 1.
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth.max(1);
        self
    }

    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config.pool_capacity = capacity;
        self
    }

    /// Whether pending configures still run after the outermost factory
    /// closure fails. Defaults to `true`.
    pub fn flush_on_failure(mut self, flush: bool) -> Self {
        self.config.flush_on_failure = flush;
        self
    }

    /// Adds an observer. Observers are notified in the order they were added.
    pub fn observer(mut self, observer: Arc<dyn FactoryObserver>) -> Self {
        self.observers.add(observer);
        self
    }

    pub fn build(self) -> InstanceFactory {
        InstanceFactory::from_parts(self.config, self.observers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observer::LoggingObserver;

    #[test]
    fn builder_applies_settings() {
        let factory = FactoryBuilder::new()
            .max_depth(0)
            .pool_capacity(1)
            .flush_on_failure(false)
            .observer(Arc::new(LoggingObserver::new()))
            .build();

        assert_eq!(factory.config().max_depth, 1);
        assert_eq!(factory.config().pool_capacity, 1);
        assert!(!factory.config().flush_on_failure);
    }

    #[test]
    fn default_builder_matches_new() {
        let built = FactoryBuilder::new().build();
        assert_eq!(built.config(), InstanceFactory::new().config());
    }
}
