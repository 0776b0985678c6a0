//! Lifecycle pools holding type-erased instances.

use std::any::Any;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use crate::key::SlotName;

#[cfg(feature = "ahash")]
type PoolHasher = ahash::RandomState;
#[cfg(not(feature = "ahash"))]
type PoolHasher = std::collections::hash_map::RandomState;

type PoolMap<V> = HashMap<SlotName, V, PoolHasher>;

// Type-erased owning entry
pub(crate) type AnyBox = Box<dyn Any>;
// Type-erased non-owning entry
pub(crate) type AnyWeak = Weak<dyn Any>;

/// Outcome of a pool lookup.
///
/// Anything but `Hit` sends the request down the construction path.
#[derive(Debug)]
pub(crate) enum Lookup<T> {
    Hit(T),
    Miss,
    /// Weak entry whose instance has been released by every owner
    Released,
    /// Entry stored under the same name with a different type
    Mismatch,
}

/// Name → owning handle. Backs the shared and scoped lifecycles.
pub(crate) struct StrongPool {
    entries: PoolMap<AnyBox>,
}

impl StrongPool {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: PoolMap::with_capacity_and_hasher(capacity, PoolHasher::default()),
        }
    }

    pub(crate) fn lookup<T: Clone + 'static>(&self, name: &str) -> Lookup<T> {
        match self.entries.get(name) {
            None => Lookup::Miss,
            Some(entry) => match (**entry).downcast_ref::<T>() {
                Some(instance) => Lookup::Hit(instance.clone()),
                None => Lookup::Mismatch,
            },
        }
    }

    /// Stores `instance`, returning whatever previously occupied the slot.
    ///
    /// The displaced value must be dropped after the pool's borrow ends since
    /// its destructor is user code.
    #[must_use]
    pub(crate) fn insert<T: 'static>(&mut self, name: SlotName, instance: T) -> Option<AnyBox> {
        self.entries.insert(name, Box::new(instance))
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.keys().map(|n| n.to_string()).collect();
        names.sort();
        names
    }

    /// Empties the pool, keeping its capacity, and hands back the instances.
    #[must_use]
    pub(crate) fn drain(&mut self) -> Vec<AnyBox> {
        self.entries.drain().map(|(_, instance)| instance).collect()
    }
}

/// Name → non-owning handle. Backs the weak-shared lifecycle.
pub(crate) struct WeakPool {
    entries: PoolMap<AnyWeak>,
}

impl WeakPool {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: PoolMap::with_capacity_and_hasher(capacity, PoolHasher::default()),
        }
    }

    /// Looks up `name`, re-checking liveness on every call.
    pub(crate) fn lookup<T: 'static>(&self, name: &str) -> Lookup<Rc<T>> {
        let Some(handle) = self.entries.get(name) else {
            return Lookup::Miss;
        };
        match handle.upgrade() {
            None => Lookup::Released,
            Some(strong) => match strong.downcast::<T>() {
                Ok(instance) => Lookup::Hit(instance),
                Err(_) => Lookup::Mismatch,
            },
        }
    }

    /// Stores a non-owning handle to `instance`, overwriting any stale one.
    pub(crate) fn insert<T: 'static>(&mut self, name: SlotName, instance: &Rc<T>) {
        let erased: Rc<dyn Any> = instance.clone();
        self.entries.insert(name, Rc::downgrade(&erased));
    }

    pub(crate) fn is_live(&self, name: &str) -> bool {
        self.entries
            .get(name)
            .map_or(false, |handle| handle.strong_count() > 0)
    }

    pub(crate) fn live_len(&self) -> usize {
        self.entries.values().filter(|h| h.strong_count() > 0).count()
    }

    /// Forgets handles whose instance is gone. Returns how many were removed.
    pub(crate) fn purge_released(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, handle| handle.strong_count() > 0);
        before - self.entries.len()
    }

    /// Sorted names with their liveness.
    pub(crate) fn names(&self) -> Vec<(String, bool)> {
        let mut names: Vec<(String, bool)> = self
            .entries
            .iter()
            .map(|(n, h)| (n.to_string(), h.strong_count() > 0))
            .collect();
        names.sort();
        names
    }
}
