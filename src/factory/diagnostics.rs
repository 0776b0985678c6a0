//! Point-in-time views of a factory's state.

#[cfg(feature = "config")]
use serde::Serialize;

use super::InstanceFactory;
use crate::key::SlotKey;

#[cfg(feature = "config")]
use crate::error::{FactoryError, FactoryResult};

/// A weak-shared slot and whether its instance is still alive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct WeakEntry {
    pub name: String,
    pub live: bool,
}

/// Snapshot of an [`InstanceFactory`]: pooled slot names, the construction
/// stack and the request bookkeeping.
///
/// # Examples
///
/// ```
/// use ferrous_crucible::InstanceFactory;
/// use std::rc::Rc;
///
/// let factory = InstanceFactory::new();
/// factory.get_shared("b", || 2u8);
/// factory.get_shared("a", || 1u8);
/// let kept = factory.get_weak_shared("w", || Rc::new(()));
///
/// let snapshot = factory.snapshot();
/// assert_eq!(snapshot.shared, vec!["a", "b"]);
/// assert!(snapshot.weak_shared[0].live);
/// assert!(snapshot.scoped.is_empty());
/// assert!(snapshot.construction_stack.is_empty());
/// # drop(kept);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Serialize))]
pub struct FactorySnapshot {
    pub shared: Vec<String>,
    pub weak_shared: Vec<WeakEntry>,
    pub scoped: Vec<String>,
    pub construction_stack: Vec<SlotKey>,
    pub pending_configures: usize,
    pub request_depth: usize,
}

impl FactorySnapshot {
    #[cfg(feature = "config")]
    pub fn to_json(&self) -> FactoryResult<String> {
        serde_json::to_string_pretty(self).map_err(|e| FactoryError::InvalidConfig(e.to_string()))
    }
}

impl InstanceFactory {
    /// Captures the current state. Safe to call from inside factory and
    /// configure closures.
    pub fn snapshot(&self) -> FactorySnapshot {
        FactorySnapshot {
            shared: self.shared.borrow().names(),
            weak_shared: self
                .weak_shared
                .borrow()
                .names()
                .into_iter()
                .map(|(name, live)| WeakEntry { name, live })
                .collect(),
            scoped: self.scoped.borrow().names(),
            construction_stack: self.construction_stack(),
            pending_configures: self.pending_configures(),
            request_depth: self.request_depth(),
        }
    }

    #[cfg(feature = "diagnostics")]
    pub fn to_debug_string(&self) -> String {
        let snapshot = self.snapshot();
        let mut s = String::new();
        s.push_str("=== Instance Factory Debug ===\n");
        s.push_str("Shared:\n");
        for name in &snapshot.shared {
            s.push_str(&format!("  {}\n", name));
        }
        s.push_str("WeakShared:\n");
        for entry in &snapshot.weak_shared {
            let state = if entry.live { "live" } else { "released" };
            s.push_str(&format!("  {} ({})\n", entry.name, state));
        }
        s.push_str("Scoped:\n");
        for name in &snapshot.scoped {
            s.push_str(&format!("  {}\n", name));
        }
        s.push_str("Construction stack:\n");
        for key in &snapshot.construction_stack {
            s.push_str(&format!("  {}\n", key));
        }
        s.push_str(&format!("Pending configures: {}\n", snapshot.pending_configures));
        s.push_str(&format!("Request depth: {}\n", snapshot.request_depth));
        s
    }
}
