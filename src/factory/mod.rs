//! The instance factory.
//!
//! [`InstanceFactory`] owns the lifecycle pools, the construction stack, the
//! deferred configure queue and the request depth counter. Every public entry
//! point funnels into one construction routine, `inject`.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;
use std::time::Instant;

use crate::builder::FactoryBuilder;
use crate::config::FactoryConfig;
use crate::error::{FactoryError, FactoryResult};
use crate::internal::{CircularPanic, ConfigureQueue, ConstructionStack, Refusal, StackGuard};
use crate::key::{SlotKey, SlotName};
use crate::lifecycle::Lifecycle;
use crate::observer::{Observers, StaleReason};
use crate::pool::{Lookup, StrongPool, WeakPool};

mod diagnostics;
mod request;

pub use diagnostics::{FactorySnapshot, WeakEntry};
use request::{RequestGuard, UnwindGuard};

/// Configure callback, run once after the construction tree has unwound.
type Configure<T> = Box<dyn FnOnce(&T)>;

/// Lazy, reentrant instance factory.
///
/// Callers ask for a named instance under a [`Lifecycle`]; the factory returns
/// the cached instance or runs the supplied factory closure. Factory closures
/// may request further instances from the same factory, which is how object
/// graphs get wired.
///
/// Configure callbacks never run while anything is still under construction.
/// They are queued and run in enqueue order once the outermost request has
/// built everything, so two instances can hold references to each other
/// without either one seeing the other half-built.
///
/// # Threading
///
/// The factory is single threaded (`!Send`, `!Sync`) and has no internal
/// locking. Create one factory per thread when several threads need
/// instances.
///
/// # Examples
///
/// ```
/// use ferrous_crucible::InstanceFactory;
/// use std::cell::RefCell;
/// use std::rc::{Rc, Weak};
///
/// struct Controller {
///     view: Rc<View>,
/// }
///
/// struct View {
///     delegate: RefCell<Weak<Controller>>,
/// }
///
/// fn controller(factory: &Rc<InstanceFactory>) -> Rc<Controller> {
///     factory.get_shared("controller", || Rc::new(Controller { view: view(factory) }))
/// }
///
/// fn view(factory: &Rc<InstanceFactory>) -> Rc<View> {
///     let factory_ref = Rc::clone(factory);
///     factory.get_shared_with(
///         "view",
///         || Rc::new(View { delegate: RefCell::new(Weak::new()) }),
///         move |view: &Rc<View>| {
///             // Runs after `controller` has been built and cached
///             *view.delegate.borrow_mut() = Rc::downgrade(&controller(&factory_ref));
///         },
///     )
/// }
///
/// let factory = Rc::new(InstanceFactory::new());
/// let c = controller(&factory);
/// assert!(Rc::ptr_eq(&c.view, &view(&factory)));
/// assert!(Rc::ptr_eq(&c.view.delegate.borrow().upgrade().unwrap(), &c));
/// ```
///
/// Configure callbacks are stored until the flush, so they must be `'static`.
/// Hold the factory (or the type wrapping it) in an `Rc` and move a clone into
/// the callback, as above.
pub struct InstanceFactory {
    shared: RefCell<StrongPool>,
    weak_shared: RefCell<WeakPool>,
    scoped: RefCell<StrongPool>,
    stack: RefCell<ConstructionStack>,
    configures: RefCell<ConfigureQueue>,
    request_depth: Cell<usize>,
    observers: Observers,
    config: FactoryConfig,
}

impl InstanceFactory {
    /// Creates a factory with the default configuration and no observers.
    pub fn new() -> Self {
        Self::from_parts(FactoryConfig::default(), Observers::default())
    }

    /// Starts a [`FactoryBuilder`] for a configured factory.
    pub fn builder() -> FactoryBuilder {
        FactoryBuilder::new()
    }

    pub(crate) fn from_parts(config: FactoryConfig, observers: Observers) -> Self {
        let capacity = config.pool_capacity;
        Self {
            shared: RefCell::new(StrongPool::with_capacity(capacity)),
            weak_shared: RefCell::new(WeakPool::with_capacity(capacity)),
            scoped: RefCell::new(StrongPool::with_capacity(capacity)),
            stack: RefCell::new(ConstructionStack::with_max_depth(config.max_depth.max(1))),
            configures: RefCell::new(ConfigureQueue::with_capacity(capacity)),
            request_depth: Cell::new(0),
            observers,
            config,
        }
    }

    pub fn config(&self) -> &FactoryConfig {
        &self.config
    }

    // ----- Shared -----

    /// Returns the shared instance for `name`, constructing it on first use.
    ///
    /// The factory keeps the instance for its whole lifetime; `factory` runs
    /// at most once per name. `T` is handed out by cloning, so it is usually
    /// an `Rc` or another cheap handle.
    pub fn get_shared<T, F>(&self, name: impl Into<SlotName>, factory: F) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        infallible(self.resolve_strong(Lifecycle::Shared, name.into(), || Ok(factory()), None))
    }

    /// Like [`get_shared`](Self::get_shared), with a deferred configure step
    /// that runs once, after the construction tree has unwound.
    pub fn get_shared_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
        C: FnOnce(&T) + 'static,
    {
        infallible(self.resolve_strong(
            Lifecycle::Shared,
            name.into(),
            || Ok(factory()),
            Some(Box::new(configure)),
        ))
    }

    /// Fallible [`get_shared`](Self::get_shared). An `Err` from `factory` is
    /// returned unchanged and nothing is cached.
    pub fn try_get_shared<T, E, F>(&self, name: impl Into<SlotName>, factory: F) -> Result<T, E>
    where
        T: Clone + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        self.resolve_strong(Lifecycle::Shared, name.into(), factory, None)
    }

    // ----- WeakShared -----

    /// Returns the live instance for `name`, or constructs a new one.
    ///
    /// The factory only keeps a weak handle. Once every `Rc` handed out has
    /// been dropped the next call constructs again.
    pub fn get_weak_shared<T, F>(&self, name: impl Into<SlotName>, factory: F) -> Rc<T>
    where
        T: 'static,
        F: FnOnce() -> Rc<T>,
    {
        infallible(self.resolve_weak(name.into(), || Ok(factory()), None))
    }

    /// Like [`get_weak_shared`](Self::get_weak_shared), with a deferred
    /// configure step.
    ///
    /// The pending configure call holds a strong reference until it has run,
    /// so the instance outlives at least its own request.
    pub fn get_weak_shared_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> Rc<T>
    where
        T: 'static,
        F: FnOnce() -> Rc<T>,
        C: FnOnce(&Rc<T>) + 'static,
    {
        infallible(self.resolve_weak(name.into(), || Ok(factory()), Some(Box::new(configure))))
    }

    /// Fallible [`get_weak_shared`](Self::get_weak_shared).
    pub fn try_get_weak_shared<T, E, F>(&self, name: impl Into<SlotName>, factory: F) -> Result<Rc<T>, E>
    where
        T: 'static,
        F: FnOnce() -> Result<Rc<T>, E>,
    {
        self.resolve_weak(name.into(), factory, None)
    }

    // ----- Unshared -----

    /// Constructs a new instance on every call.
    ///
    /// The name only shows up in the construction stack; unshared slots never
    /// count as circular.
    pub fn get_unshared<T, F>(&self, name: impl Into<SlotName>, factory: F) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        infallible(self.resolve_strong(Lifecycle::Unshared, name.into(), || Ok(factory()), None))
    }

    pub fn get_unshared_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
        C: FnOnce(&T) + 'static,
    {
        infallible(self.resolve_strong(
            Lifecycle::Unshared,
            name.into(),
            || Ok(factory()),
            Some(Box::new(configure)),
        ))
    }

    pub fn try_get_unshared<T, E, F>(&self, name: impl Into<SlotName>, factory: F) -> Result<T, E>
    where
        T: Clone + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        self.resolve_strong(Lifecycle::Unshared, name.into(), factory, None)
    }

    // ----- Scoped -----

    /// Returns the instance for `name` within the current top-level request.
    ///
    /// Every request for `name` made while one outermost call is in progress
    /// (including its deferred configure steps) gets the same instance. The
    /// scoped pool is emptied when that outermost call finishes.
    pub fn get_scoped<T, F>(&self, name: impl Into<SlotName>, factory: F) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        infallible(self.resolve_strong(Lifecycle::Scoped, name.into(), || Ok(factory()), None))
    }

    pub fn get_scoped_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
        C: FnOnce(&T) + 'static,
    {
        infallible(self.resolve_strong(
            Lifecycle::Scoped,
            name.into(),
            || Ok(factory()),
            Some(Box::new(configure)),
        ))
    }

    pub fn try_get_scoped<T, E, F>(&self, name: impl Into<SlotName>, factory: F) -> Result<T, E>
    where
        T: Clone + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        self.resolve_strong(Lifecycle::Scoped, name.into(), factory, None)
    }

    // ----- Requests -----

    /// Runs `request`, turning construction graph defects into errors.
    ///
    /// A circular request or an exceeded depth limit normally panics. Inside
    /// `try_request` that panic is caught and returned as
    /// [`FactoryError::Circular`] or [`FactoryError::DepthExceeded`]; the
    /// factory is left consistent and usable. Any other panic is resumed.
    ///
    /// # Examples
    ///
    /// ```
    /// use ferrous_crucible::{FactoryError, InstanceFactory};
    ///
    /// fn looping(factory: &InstanceFactory) -> u32 {
    ///     factory.get_shared("loop", || looping(factory) + 1)
    /// }
    ///
    /// let factory = InstanceFactory::new();
    /// match factory.try_request(|| looping(&factory)) {
    ///     Err(FactoryError::Circular { stack, key }) => {
    ///         assert_eq!(stack.len(), 1);
    ///         assert_eq!(key.name(), "loop");
    ///     }
    ///     other => panic!("unexpected {:?}", other),
    /// }
    /// assert!(factory.is_idle());
    /// ```
    pub fn try_request<R>(&self, request: impl FnOnce() -> R) -> FactoryResult<R> {
        match panic::catch_unwind(AssertUnwindSafe(request)) {
            Ok(value) => Ok(value),
            Err(payload) => {
                let payload = match payload.downcast::<CircularPanic>() {
                    Ok(circular) => return Err((*circular).into()),
                    Err(payload) => payload,
                };
                match payload.downcast::<FactoryError>() {
                    Ok(error) => Err(*error),
                    Err(payload) => panic::resume_unwind(payload),
                }
            }
        }
    }

    // ----- Introspection -----

    /// Whether `name` currently has a usable cached instance.
    ///
    /// Weak entries only count while their instance is alive. Unshared slots
    /// are never cached.
    pub fn is_cached(&self, lifecycle: Lifecycle, name: &str) -> bool {
        match lifecycle {
            Lifecycle::Shared => self.shared.borrow().contains(name),
            Lifecycle::WeakShared => self.weak_shared.borrow().is_live(name),
            Lifecycle::Unshared => false,
            Lifecycle::Scoped => self.scoped.borrow().contains(name),
        }
    }

    /// Number of usable cached instances under `lifecycle`.
    pub fn cached_count(&self, lifecycle: Lifecycle) -> usize {
        match lifecycle {
            Lifecycle::Shared => self.shared.borrow().len(),
            Lifecycle::WeakShared => self.weak_shared.borrow().live_len(),
            Lifecycle::Unshared => 0,
            Lifecycle::Scoped => self.scoped.borrow().len(),
        }
    }

    /// Number of slots currently under construction.
    pub fn construction_depth(&self) -> usize {
        self.stack.borrow().len()
    }

    /// Slots currently under construction, outermost first.
    pub fn construction_stack(&self) -> Vec<SlotKey> {
        self.stack.borrow().keys()
    }

    /// Configure actions waiting for the construction stack to empty.
    pub fn pending_configures(&self) -> usize {
        self.configures.borrow().len()
    }

    /// How many configure flushes are currently running, nested.
    pub fn request_depth(&self) -> usize {
        self.request_depth.get()
    }

    /// True outside of any request: nothing under construction, nothing
    /// pending, no flush running.
    pub fn is_idle(&self) -> bool {
        self.stack.borrow().is_empty()
            && self.configures.borrow().is_empty()
            && self.request_depth.get() == 0
    }

    /// Forgets weak handles whose instance has been released.
    ///
    /// Released handles are otherwise only replaced when their slot is
    /// requested again.
    pub fn purge_released_weak(&self) -> usize {
        self.weak_shared.borrow_mut().purge_released()
    }

    // ----- Construction -----

    fn resolve_strong<T, E, F>(
        &self,
        lifecycle: Lifecycle,
        name: SlotName,
        factory: F,
        configure: Option<Configure<T>>,
    ) -> Result<T, E>
    where
        T: Clone + 'static,
        F: FnOnce() -> Result<T, E>,
    {
        let key = SlotKey::new(lifecycle, name);
        let pool = match lifecycle {
            Lifecycle::Shared => Some(&self.shared),
            Lifecycle::Scoped => Some(&self.scoped),
            Lifecycle::Unshared | Lifecycle::WeakShared => None,
        };

        if let Some(pool) = pool {
            let found = pool.borrow().lookup::<T>(key.name());
            match found {
                Lookup::Hit(instance) => {
                    self.observers.cache_hit(&key);
                    return Ok(instance);
                }
                Lookup::Mismatch => self.observers.stale_entry(&key, StaleReason::TypeMismatch),
                Lookup::Miss | Lookup::Released => {}
            }
        }

        self.inject(key, factory, configure, |key, instance: &T| {
            if let Some(pool) = pool {
                let displaced = pool.borrow_mut().insert(key.slot_name().clone(), instance.clone());
                drop(displaced);
            }
        })
    }

    fn resolve_weak<T, E, F>(
        &self,
        name: SlotName,
        factory: F,
        configure: Option<Configure<Rc<T>>>,
    ) -> Result<Rc<T>, E>
    where
        T: 'static,
        F: FnOnce() -> Result<Rc<T>, E>,
    {
        let key = SlotKey::new(Lifecycle::WeakShared, name);

        let found = self.weak_shared.borrow().lookup::<T>(key.name());
        match found {
            Lookup::Hit(instance) => {
                self.observers.cache_hit(&key);
                return Ok(instance);
            }
            Lookup::Released => self.observers.stale_entry(&key, StaleReason::Released),
            Lookup::Mismatch => self.observers.stale_entry(&key, StaleReason::TypeMismatch),
            Lookup::Miss => {}
        }

        self.inject(key, factory, configure, |key, instance: &Rc<T>| {
            self.weak_shared
                .borrow_mut()
                .insert(key.slot_name().clone(), instance);
        })
    }

    /// Builds the instance for `key` after a cache miss.
    ///
    /// Pushes `key` for the duration of `factory`, registers the result via
    /// `register`, queues `configure`, and flushes the queue when this call
    /// turns out to be the outermost one.
    fn inject<T, E, F, R>(
        &self,
        key: SlotKey,
        factory: F,
        configure: Option<Configure<T>>,
        register: R,
    ) -> Result<T, E>
    where
        T: Clone + 'static,
        F: FnOnce() -> Result<T, E>,
        R: FnOnce(&SlotKey, &T),
    {
        let unwind = UnwindGuard::arm(self);
        let built = {
            let _frame = self.enter(&key);
            self.observers.constructing(&key);
            let started = self.observers.has_observers().then(Instant::now);
            let built = factory();
            match &built {
                Ok(_) => {
                    let elapsed = started.map(|at| at.elapsed()).unwrap_or_default();
                    self.observers.constructed(&key, elapsed);
                }
                Err(_) => self.observers.construction_failed(&key),
            }
            built
        };
        unwind.disarm();

        let instance = match built {
            Ok(instance) => instance,
            Err(error) => {
                if self.stack.borrow().is_empty() {
                    self.finish_failed_tree();
                }
                return Err(error);
            }
        };

        register(&key, &instance);

        if let Some(configure) = configure {
            let held = instance.clone();
            self.configures
                .borrow_mut()
                .push(Box::new(move || configure(&held)));
        }

        if self.stack.borrow().is_empty() {
            self.flush_configures();
        }

        Ok(instance)
    }

    fn enter(&self, key: &SlotKey) -> StackGuard<'_> {
        match StackGuard::enter(&self.stack, key) {
            Ok(frame) => frame,
            Err(Refusal::Circular(circular)) => {
                log::error!("{}", circular);
                self.observers.circular(&circular);
                panic::panic_any(circular)
            }
            Err(Refusal::TooDeep(depth)) => {
                log::error!("Max construction depth {} exceeded at {}", depth, key);
                self.observers.depth_exceeded(key, depth);
                panic::panic_any(FactoryError::DepthExceeded(depth))
            }
        }
    }

    fn finish_failed_tree(&self) {
        if self.config.flush_on_failure {
            self.flush_configures();
        } else {
            self.abandon_tree();
        }
    }
}

impl Default for InstanceFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InstanceFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceFactory")
            .field("shared", &self.cached_count(Lifecycle::Shared))
            .field("weak_shared", &self.cached_count(Lifecycle::WeakShared))
            .field("scoped", &self.cached_count(Lifecycle::Scoped))
            .field("construction_stack", &self.construction_stack())
            .field("pending_configures", &self.pending_configures())
            .field("request_depth", &self.request_depth())
            .field("observers", &self.observers.len())
            .finish()
    }
}

fn infallible<T>(result: Result<T, Infallible>) -> T {
    match result {
        Ok(value) => value,
        Err(never) => match never {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_runs_only_at_empty_stack() {
        let factory = InstanceFactory::new();
        let seen_pending = Rc::new(Cell::new(usize::MAX));

        let probe = seen_pending.clone();
        let outer: Rc<u8> = factory.get_shared("outer", || {
            let _inner: Rc<u8> = factory.get_shared_with("inner", || Rc::new(1), |_| {});
            // inner's configure is queued, not run, while outer is under construction
            probe.set(factory.pending_configures());
            Rc::new(2)
        });

        assert_eq!(*outer, 2);
        assert_eq!(seen_pending.get(), 1);
        assert!(factory.is_idle());
    }

    #[test]
    fn request_depth_counts_nested_flushes() {
        let factory = Rc::new(InstanceFactory::new());
        let depths = Rc::new(RefCell::new(Vec::new()));

        let f = factory.clone();
        let d = depths.clone();
        factory.get_shared_with("a", || Rc::new(()), move |_| {
            d.borrow_mut().push(f.request_depth());
            let d2 = d.clone();
            let f2 = f.clone();
            f.get_shared_with("b", || Rc::new(()), move |_| {
                d2.borrow_mut().push(f2.request_depth());
            });
        });

        assert_eq!(*depths.borrow(), vec![1, 2]);
        assert_eq!(factory.request_depth(), 0);
    }

    #[test]
    fn failed_factory_pops_its_frame() {
        let factory = InstanceFactory::new();
        let result: Result<Rc<u8>, &str> = factory.try_get_shared("broken", || Err("boom"));
        assert_eq!(result.unwrap_err(), "boom");
        assert!(!factory.is_cached(Lifecycle::Shared, "broken"));
        assert!(factory.is_idle());
    }

    #[test]
    fn debug_output_summarizes_state() {
        let factory = InstanceFactory::new();
        factory.get_shared("a", || 1u8);
        let debug = format!("{:?}", factory);
        assert!(debug.contains("InstanceFactory"));
        assert!(debug.contains("shared: 1"));
    }
}
