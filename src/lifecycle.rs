//! Slot lifecycle definitions.

use std::fmt;

#[cfg(feature = "config")]
use serde::{Deserialize, Serialize};

/// Lifecycle policies controlling how long a constructed instance is cached
///
/// # Examples
///
/// ```rust
/// use ferrous_crucible::{InstanceFactory, Lifecycle};
/// use std::rc::Rc;
///
/// let factory = InstanceFactory::new();
///
/// // Shared: one instance for the factory's lifetime
/// let a = factory.get_shared("config", || Rc::new(String::from("prod")));
/// let b = factory.get_shared("config", || Rc::new(String::from("dev")));
/// assert!(Rc::ptr_eq(&a, &b));
///
/// // Unshared: a new instance on every request
/// let x = factory.get_unshared("buffer", || Rc::new(Vec::<u8>::new()));
/// let y = factory.get_unshared("buffer", || Rc::new(Vec::<u8>::new()));
/// assert!(!Rc::ptr_eq(&x, &y));
///
/// assert!(factory.is_cached(Lifecycle::Shared, "config"));
/// assert!(!factory.is_cached(Lifecycle::Unshared, "buffer"));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "config", derive(Serialize, Deserialize))]
pub enum Lifecycle {
    /// Cached for the factory's lifetime with an owning handle
    Shared,
    /// Cached with a non-owning handle
    ///
    /// The factory never keeps the instance alive. Once every external owner
    /// has released it, the next request constructs a new one.
    WeakShared,
    /// Never cached; every request constructs
    ///
    /// Unshared slots are exempt from cycle detection since no instance is
    /// ever reused, so a slot may legitimately recurse into itself.
    Unshared,
    /// Cached until the enclosing top-level request completes
    Scoped,
}

impl Lifecycle {
    /// Every lifecycle, in declaration order.
    pub const ALL: [Lifecycle; 4] = [
        Lifecycle::Shared,
        Lifecycle::WeakShared,
        Lifecycle::Unshared,
        Lifecycle::Scoped,
    ];

    /// Short name used in keys and diagnostics.
    pub fn as_str(self) -> &'static str {
        match self {
            Lifecycle::Shared => "shared",
            Lifecycle::WeakShared => "weakShared",
            Lifecycle::Unshared => "unshared",
            Lifecycle::Scoped => "scoped",
        }
    }

    /// Whether instances of this lifecycle are kept in a pool.
    #[inline]
    pub fn is_cached(self) -> bool {
        !matches!(self, Lifecycle::Unshared)
    }

    /// Whether a re-request during construction is a cycle.
    #[inline]
    pub fn detects_cycles(self) -> bool {
        self.is_cached()
    }
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
