//! Internal implementation details.

pub(crate) mod configure_queue;
pub(crate) mod stack;

pub use stack::CircularPanic;
pub(crate) use configure_queue::ConfigureQueue;
pub(crate) use stack::{ConstructionStack, Refusal, StackGuard, DEFAULT_MAX_DEPTH};
