//! Error types for the instance factory.

use std::fmt;

use crate::key::SlotKey;

/// Instance factory errors
///
/// Construction itself never fails on the factory's behalf: a factory closure
/// that fails reports its own error through the `try_get_*` entry points. The
/// variants here describe defects in the construction graph or in the
/// factory's configuration.
///
/// # Examples
///
/// ```rust
/// use ferrous_crucible::{FactoryError, Lifecycle, SlotKey};
///
/// let a = SlotKey::new(Lifecycle::Shared, "a");
/// let b = SlotKey::new(Lifecycle::Shared, "b");
/// let circular = FactoryError::Circular { stack: vec![a.clone(), b], key: a };
/// assert_eq!(
///     circular.to_string(),
///     "Circular dependency from one of [shared(a), shared(b)] to shared(a) in initializer"
/// );
///
/// let depth = FactoryError::DepthExceeded(1024);
/// assert_eq!(depth.to_string(), "Max construction depth 1024 exceeded");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// A cached slot was requested again while it was still being constructed
    Circular {
        /// Construction stack at the moment of detection, outermost first
        stack: Vec<SlotKey>,
        /// The slot that closed the cycle
        key: SlotKey,
    },
    /// The construction stack grew past the configured maximum depth
    DepthExceeded(usize),
    /// A configuration value could not be parsed or is out of range
    InvalidConfig(String),
}

impl FactoryError {
    /// Full cycle path for [`FactoryError::Circular`]: the stack followed by the
    /// offending key. Empty for the other variants.
    pub fn path(&self) -> Vec<SlotKey> {
        match self {
            FactoryError::Circular { stack, key } => {
                let mut path = stack.clone();
                path.push(key.clone());
                path
            }
            _ => Vec::new(),
        }
    }
}

pub(crate) fn format_stack(f: &mut fmt::Formatter<'_>, stack: &[SlotKey]) -> fmt::Result {
    f.write_str("[")?;
    for (i, key) in stack.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", key)?;
    }
    f.write_str("]")
}

impl fmt::Display for FactoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FactoryError::Circular { stack, key } => {
                f.write_str("Circular dependency from one of ")?;
                format_stack(f, stack)?;
                write!(f, " to {} in initializer", key)
            }
            FactoryError::DepthExceeded(depth) => {
                write!(f, "Max construction depth {} exceeded", depth)
            }
            FactoryError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for FactoryError {}

/// Result type for factory operations
///
/// # Examples
///
/// ```rust
/// use ferrous_crucible::{FactoryConfig, FactoryResult};
///
/// fn load() -> FactoryResult<FactoryConfig> {
///     let config = FactoryConfig::default();
///     config.validate()?;
///     Ok(config)
/// }
///
/// assert!(load().is_ok());
/// ```
pub type FactoryResult<T> = Result<T, FactoryError>;
