//! Request boundaries: configure flushes, request depth and scoped cleanup.

use super::InstanceFactory;

/// Tracks one running configure flush.
///
/// Entering increments the request depth. Dropping decrements it and, once it
/// is back at zero, clears the scoped pool. A flush that finished completes
/// the request; one unwinding out of a panicking configure action abandons it
/// instead, reporting the actions that never started.
pub(super) struct RequestGuard<'a> {
    factory: &'a InstanceFactory,
    depth: usize,
    unstarted: usize,
}

impl<'a> RequestGuard<'a> {
    pub(super) fn enter(factory: &'a InstanceFactory, batch: usize) -> Self {
        let depth = factory.request_depth.get() + 1;
        factory.request_depth.set(depth);
        Self {
            factory,
            depth,
            unstarted: batch,
        }
    }

    pub(super) fn depth(&self) -> usize {
        self.depth
    }

    fn start_next(&mut self) {
        self.unstarted = self.unstarted.saturating_sub(1);
    }
}

impl Drop for RequestGuard<'_> {
    fn drop(&mut self) {
        let depth = self.factory.request_depth.get().saturating_sub(1);
        self.factory.request_depth.set(depth);
        let cleared = if depth == 0 { self.factory.clear_scoped() } else { 0 };

        if std::thread::panicking() {
            log::warn!(
                "Configure flush at request depth {} panicked: {} configures discarded, {} scoped cleared",
                self.depth,
                self.unstarted,
                cleared
            );
            self.factory.observers.request_abandoned(self.unstarted);
        } else if depth == 0 {
            self.factory.observers.request_completed(cleared);
        }
    }
}

/// Cleans up after a factory closure that panicked.
///
/// Armed before the frame is pushed and disarmed once the factory closure has
/// returned. If it is dropped while still armed, unwinding is in progress and
/// the frame has already been popped; when that left the stack empty, the
/// whole construction tree is abandoned.
pub(super) struct UnwindGuard<'a> {
    factory: &'a InstanceFactory,
    armed: bool,
}

impl<'a> UnwindGuard<'a> {
    pub(super) fn arm(factory: &'a InstanceFactory) -> Self {
        Self {
            factory,
            armed: true,
        }
    }

    pub(super) fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for UnwindGuard<'_> {
    fn drop(&mut self) {
        if self.armed && self.factory.stack.borrow().is_empty() {
            self.factory.abandon_tree();
        }
    }
}

impl InstanceFactory {
    /// Runs every queued configure action, in enqueue order.
    ///
    /// The queue is snapshotted and cleared first: an action that requests
    /// more instances starts a new tree whose configures are flushed by that
    /// tree's own outermost call, one request depth further in.
    pub(super) fn flush_configures(&self) {
        let batch = self.configures.borrow_mut().take();
        let count = batch.len();
        let mut request = RequestGuard::enter(self, count);

        // Dropping the iterator mid-loop drops the actions that never ran
        for action in batch {
            request.start_next();
            action();
        }

        if count > 0 {
            self.observers.configures_flushed(count, request.depth());
        }
    }

    /// Drops the pending configure actions of a tree that cannot complete.
    ///
    /// Outside of any flush this also ends the top-level request, so the
    /// scoped pool is cleared.
    pub(super) fn abandon_tree(&self) {
        let discarded = self.configures.borrow_mut().take();
        let count = discarded.len();
        drop(discarded);

        if self.request_depth.get() == 0 {
            let cleared = self.clear_scoped();
            log::warn!(
                "Construction request abandoned: {} configures discarded, {} scoped cleared",
                count,
                cleared
            );
        } else {
            log::warn!(
                "Construction tree abandoned at request depth {}: {} configures discarded",
                self.request_depth.get(),
                count
            );
        }
        self.observers.request_abandoned(count);
    }

    /// Empties the scoped pool. Instances are dropped after the pool's
    /// borrow is released, since their destructors may call back in.
    fn clear_scoped(&self) -> usize {
        let cleared = self.scoped.borrow_mut().drain();
        let count = cleared.len();
        drop(cleared);
        count
    }
}
