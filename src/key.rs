//! Slot identity for the instance factory.

use std::borrow::Cow;
use std::fmt;

#[cfg(feature = "config")]
use serde::Serialize;

use crate::lifecycle::Lifecycle;

/// Caller-chosen slot name.
///
/// Static names are stored without allocating; owned names are accepted for
/// slots computed at runtime.
pub type SlotName = Cow<'static, str>;

/// Identity of a slot: its lifecycle plus its name.
///
/// Two requests with the same lifecycle and name address the same cached
/// instance. The same name under two different lifecycles addresses two
/// unrelated slots.
///
/// # Examples
///
/// ```rust
/// use ferrous_crucible::{Lifecycle, SlotKey};
///
/// let a = SlotKey::new(Lifecycle::Shared, "repository");
/// let b = SlotKey::new(Lifecycle::Shared, String::from("repository"));
/// let c = SlotKey::new(Lifecycle::Scoped, "repository");
///
/// assert_eq!(a, b);
/// assert_ne!(a, c);
/// assert_eq!(a.to_string(), "shared(repository)");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct SlotKey {
    lifecycle: Lifecycle,
    name: SlotName,
}

impl SlotKey {
    /// Creates a key for `name` under `lifecycle`.
    pub fn new(lifecycle: Lifecycle, name: impl Into<SlotName>) -> Self {
        Self {
            lifecycle,
            name: name.into(),
        }
    }

    #[inline]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether this key takes part in cycle detection.
    #[inline]
    pub fn detects_cycles(&self) -> bool {
        self.lifecycle.detects_cycles()
    }

    pub(crate) fn slot_name(&self) -> &SlotName {
        &self.name
    }
}

impl fmt::Display for SlotKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.lifecycle, self.name)
    }
}

/// Expands to the path of the enclosing function as a `&'static str`.
///
/// Accessor methods can use it as their slot name so that every accessor gets
/// a stable, unique name without spelling one out.
///
/// # Examples
///
/// ```rust
/// use ferrous_crucible::{slot_name, InstanceFactory};
/// use std::rc::Rc;
///
/// struct Clock;
///
/// fn clock(factory: &InstanceFactory) -> Rc<Clock> {
///     factory.get_shared(slot_name!(), || Rc::new(Clock))
/// }
///
/// fn name_of_this() -> &'static str {
///     slot_name!()
/// }
///
/// let factory = InstanceFactory::new();
/// assert!(Rc::ptr_eq(&clock(&factory), &clock(&factory)));
/// assert!(name_of_this().ends_with("name_of_this"));
/// ```
#[macro_export]
macro_rules! slot_name {
    () => {{
        fn __slot() {}
        fn __name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = __name_of(__slot);
        match name.strip_suffix("::__slot") {
            Some(enclosing) => enclosing,
            None => name,
        }
    }};
}
