//! Construction stack and circular dependency detection.

use std::cell::RefCell;
use std::fmt;

use crate::error::{format_stack, FactoryError};
use crate::key::SlotKey;

pub(crate) const DEFAULT_MAX_DEPTH: usize = 1024;

#[cfg(feature = "smallvec")]
type Frames = smallvec::SmallVec<[SlotKey; 8]>;
#[cfg(not(feature = "smallvec"))]
type Frames = Vec<SlotKey>;

/// Panic payload for circular construction.
///
/// Raised when a cached slot is requested again while its own factory is
/// still running. Carries the whole construction stack and the offending key.
///
/// Example: stack `[shared(a), shared(b)]`, key `shared(a)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircularPanic {
    /// Slots under construction at detection time, outermost first.
    pub stack: Box<[SlotKey]>,
    /// The slot whose request closed the cycle.
    pub key: SlotKey,
}

impl CircularPanic {
    fn new(stack: Vec<SlotKey>, key: SlotKey) -> Self {
        CircularPanic {
            stack: stack.into_boxed_slice(),
            key,
        }
    }

    /// The stack followed by the offending key.
    pub fn path(&self) -> Vec<SlotKey> {
        let mut path = self.stack.to_vec();
        path.push(self.key.clone());
        path
    }
}

impl fmt::Display for CircularPanic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Circular dependency from one of ")?;
        format_stack(f, &self.stack)?;
        write!(f, " to {} in initializer", self.key)
    }
}

impl From<CircularPanic> for FactoryError {
    fn from(panic: CircularPanic) -> Self {
        FactoryError::Circular {
            stack: panic.stack.into_vec(),
            key: panic.key,
        }
    }
}

/// Why a slot could not be pushed.
#[derive(Debug)]
pub(crate) enum Refusal {
    Circular(CircularPanic),
    TooDeep(usize),
}

/// LIFO of the slots currently under construction.
pub(crate) struct ConstructionStack {
    frames: Frames,
    max_depth: usize,
}

impl Default for ConstructionStack {
    fn default() -> Self {
        Self::with_max_depth(DEFAULT_MAX_DEPTH)
    }
}

impl ConstructionStack {
    pub(crate) fn with_max_depth(max_depth: usize) -> Self {
        Self {
            frames: Frames::new(),
            max_depth,
        }
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn keys(&self) -> Vec<SlotKey> {
        self.frames.iter().cloned().collect()
    }

    fn push(&mut self, key: &SlotKey) -> Result<(), Refusal> {
        // Cycle check BEFORE pushing the new key
        if key.detects_cycles() && self.frames.iter().any(|k| k == key) {
            return Err(Refusal::Circular(CircularPanic::new(self.keys(), key.clone())));
        }

        if self.frames.len() >= self.max_depth {
            return Err(Refusal::TooDeep(self.frames.len()));
        }

        self.frames.push(key.clone());
        Ok(())
    }

    fn pop(&mut self) -> Option<SlotKey> {
        self.frames.pop()
    }
}

/// Frame guard: pushes a key on creation, pops it when dropped.
///
/// The pop also happens while unwinding out of a panicking factory, so the
/// stack stays balanced for whoever catches the panic.
pub(crate) struct StackGuard<'a> {
    stack: &'a RefCell<ConstructionStack>,
}

impl<'a> StackGuard<'a> {
    pub(crate) fn enter(stack: &'a RefCell<ConstructionStack>, key: &SlotKey) -> Result<Self, Refusal> {
        stack.borrow_mut().push(key)?;
        Ok(Self { stack })
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        let popped = self.stack.borrow_mut().pop();
        debug_assert!(popped.is_some(), "construction stack underflow");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;

    fn shared(name: &'static str) -> SlotKey {
        SlotKey::new(Lifecycle::Shared, name)
    }

    #[test]
    fn guard_pops_on_drop() {
        let stack = RefCell::new(ConstructionStack::default());
        {
            let _a = StackGuard::enter(&stack, &shared("a")).unwrap();
            let _b = StackGuard::enter(&stack, &shared("b")).unwrap();
            assert_eq!(stack.borrow().keys(), vec![shared("a"), shared("b")]);
        }
        assert!(stack.borrow().is_empty());
    }

    #[test]
    fn repeated_cached_key_is_circular() {
        let stack = RefCell::new(ConstructionStack::default());
        let _a = StackGuard::enter(&stack, &shared("a")).unwrap();
        let _b = StackGuard::enter(&stack, &shared("b")).unwrap();

        match StackGuard::enter(&stack, &shared("a")) {
            Err(Refusal::Circular(circular)) => {
                assert_eq!(&*circular.stack, &[shared("a"), shared("b")]);
                assert_eq!(circular.key, shared("a"));
                assert_eq!(circular.path().len(), 3);
            }
            _ => panic!("expected a circular refusal"),
        }
        // A refused push leaves the stack untouched
        assert_eq!(stack.borrow().len(), 2);
    }

    #[test]
    fn unshared_key_may_repeat() {
        let stack = RefCell::new(ConstructionStack::default());
        let key = SlotKey::new(Lifecycle::Unshared, "a");
        let _outer = StackGuard::enter(&stack, &key).unwrap();
        let _inner = StackGuard::enter(&stack, &key).unwrap();
        assert_eq!(stack.borrow().len(), 2);
    }

    #[test]
    fn depth_limit_applies_to_every_lifecycle() {
        let stack = RefCell::new(ConstructionStack::with_max_depth(2));
        let key = SlotKey::new(Lifecycle::Unshared, "a");
        let _one = StackGuard::enter(&stack, &key).unwrap();
        let _two = StackGuard::enter(&stack, &key).unwrap();
        assert!(matches!(StackGuard::enter(&stack, &key), Err(Refusal::TooDeep(2))));
    }

    #[test]
    fn circular_panic_converts_to_error() {
        let circular = CircularPanic::new(vec![shared("a")], shared("a"));
        let message = circular.to_string();
        let error = FactoryError::from(circular);
        assert_eq!(error.to_string(), message);
        assert_eq!(error.path(), vec![shared("a"), shared("a")]);
    }
}
