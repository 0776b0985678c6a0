//! Deferred configure actions.

/// A configure call bound to its instance, waiting for the stack to unwind.
pub(crate) type DeferredConfigure = Box<dyn FnOnce()>;

/// FIFO of deferred configure actions.
///
/// Actions are appended while construction is in progress and only taken out
/// as a whole batch once the construction stack is empty again.
#[derive(Default)]
pub(crate) struct ConfigureQueue {
    pending: Vec<DeferredConfigure>,
}

impl ConfigureQueue {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            pending: Vec::with_capacity(capacity),
        }
    }

    pub(crate) fn push(&mut self, action: DeferredConfigure) {
        self.pending.push(action);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.pending.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Snapshots and clears the queue, keeping its capacity for the next tree.
    ///
    /// The returned batch must be run (or dropped) after the queue's borrow
    /// is released: running an action may enqueue new ones.
    pub(crate) fn take(&mut self) -> Vec<DeferredConfigure> {
        let capacity = self.pending.capacity();
        std::mem::replace(&mut self.pending, Vec::with_capacity(capacity))
    }
}
