//! Factory configuration.
//!
//! Values come from code, from `CRUCIBLE_*` environment variables, or (with
//! the `config` feature) from JSON.

use std::env;
use std::str::FromStr;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

use crate::error::{FactoryError, FactoryResult};
use crate::internal::DEFAULT_MAX_DEPTH;

pub const ENV_MAX_DEPTH: &str = "CRUCIBLE_MAX_DEPTH";
pub const ENV_POOL_CAPACITY: &str = "CRUCIBLE_POOL_CAPACITY";
pub const ENV_FLUSH_ON_FAILURE: &str = "CRUCIBLE_FLUSH_ON_FAILURE";

const DEFAULT_POOL_CAPACITY: usize = 8;

/// Tunables for an [`InstanceFactory`](crate::InstanceFactory).
///
/// # Examples
///
/// ```
/// use ferrous_crucible::{FactoryConfig, InstanceFactory};
///
/// let config = FactoryConfig {
///     max_depth: 64,
///     ..FactoryConfig::default()
/// };
/// config.validate().unwrap();
///
/// let factory = InstanceFactory::builder().config(config).build();
/// assert_eq!(factory.config().max_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct FactoryConfig {
    /// Deepest construction stack allowed before construction is aborted.
    ///
    /// Applies to every lifecycle, so it also bounds unshared recursion,
    /// which cycle detection deliberately ignores.
    pub max_depth: usize,
    /// Initial capacity of each pool and of the configure queue.
    pub pool_capacity: usize,
    /// Whether pending configure actions still run when the outermost
    /// factory closure returns an error. When `false` they are discarded.
    pub flush_on_failure: bool,
}

impl Default for FactoryConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            pool_capacity: DEFAULT_POOL_CAPACITY,
            flush_on_failure: true,
        }
    }
}

impl FactoryConfig {
    /// Defaults overridden by any `CRUCIBLE_*` variables that are set.
    pub fn from_env() -> FactoryResult<Self> {
        let mut config = Self::default();
        if let Some(max_depth) = env_value::<usize>(ENV_MAX_DEPTH)? {
            config.max_depth = max_depth;
        }
        if let Some(capacity) = env_value::<usize>(ENV_POOL_CAPACITY)? {
            config.pool_capacity = capacity;
        }
        if let Some(flush) = env_value::<bool>(ENV_FLUSH_ON_FAILURE)? {
            config.flush_on_failure = flush;
        }
        config.validate()?;
        Ok(config)
    }

    /// Parses a JSON object; missing fields keep their defaults.
    ///
    /// ```
    /// use ferrous_crucible::FactoryConfig;
    ///
    /// let config = FactoryConfig::from_json(r#"{ "max_depth": 32 }"#).unwrap();
    /// assert_eq!(config.max_depth, 32);
    /// assert!(config.flush_on_failure);
    /// ```
    #[cfg(feature = "config")]
    pub fn from_json(json: &str) -> FactoryResult<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| FactoryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes to a JSON object.
    #[cfg(feature = "config")]
    pub fn to_json(&self) -> FactoryResult<String> {
        serde_json::to_string(self).map_err(|e| FactoryError::InvalidConfig(e.to_string()))
    }

    pub fn validate(&self) -> FactoryResult<()> {
        if self.max_depth == 0 {
            return Err(FactoryError::InvalidConfig(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn env_value<T: FromStr>(name: &str) -> FactoryResult<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| FactoryError::InvalidConfig(format!("{}={:?} is not valid", name, raw))),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [ENV_MAX_DEPTH, ENV_POOL_CAPACITY, ENV_FLUSH_ON_FAILURE] {
            env::remove_var(name);
        }
    }

    #[test]
    fn zero_depth_is_rejected() {
        let config = FactoryConfig {
            max_depth: 0,
            ..FactoryConfig::default()
        };
        assert!(matches!(config.validate(), Err(FactoryError::InvalidConfig(_))));
    }

    #[test]
    #[serial]
    fn env_overrides_defaults() {
        clear_env();
        env::set_var(ENV_MAX_DEPTH, "16");
        env::set_var(ENV_FLUSH_ON_FAILURE, "false");

        let config = FactoryConfig::from_env().unwrap();
        assert_eq!(config.max_depth, 16);
        assert_eq!(config.pool_capacity, DEFAULT_POOL_CAPACITY);
        assert!(!config.flush_on_failure);
        clear_env();
    }

    #[test]
    #[serial]
    fn env_garbage_is_invalid_config() {
        clear_env();
        env::set_var(ENV_POOL_CAPACITY, "lots");

        match FactoryConfig::from_env() {
            Err(FactoryError::InvalidConfig(msg)) => assert!(msg.contains(ENV_POOL_CAPACITY)),
            other => panic!("expected InvalidConfig, got {:?}", other),
        }
        clear_env();
    }

    #[test]
    #[serial]
    fn env_defaults_when_unset() {
        clear_env();
        assert_eq!(FactoryConfig::from_env().unwrap(), FactoryConfig::default());
    }

    #[cfg(feature = "config")]
    #[test]
    fn json_round_trip_keeps_values() {
        let config = FactoryConfig {
            max_depth: 10,
            pool_capacity: 2,
            flush_on_failure: false,
        };
        let json = config.to_json().unwrap();
        assert_eq!(FactoryConfig::from_json(&json).unwrap(), config);
        assert!(FactoryConfig::from_json(r#"{ "max_depth": 0 }"#).is_err());
        assert!(FactoryConfig::from_json("not json").is_err());
    }
}
