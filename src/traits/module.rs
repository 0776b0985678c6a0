//! Module trait for types that wrap an instance factory.

use std::rc::Rc;

use crate::factory::InstanceFactory;
use crate::key::SlotName;

/// A type that owns an [`InstanceFactory`] and exposes accessors built on it.
///
/// Implementors only provide [`instance_factory`](Self::instance_factory);
/// the lifecycle helpers forward to the factory, so accessor methods read as
/// `self.shared(...)`.
///
/// # Examples
///
/// ```
/// use ferrous_crucible::{slot_name, FactoryModule, InstanceFactory};
/// use std::cell::RefCell;
/// use std::rc::{Rc, Weak};
///
/// struct Window {
///     delegate: RefCell<Weak<App>>,
/// }
///
/// struct App {
///     window: Rc<Window>,
/// }
///
/// struct AppModule {
///     factory: InstanceFactory,
/// }
///
/// impl FactoryModule for AppModule {
///     fn instance_factory(&self) -> &InstanceFactory {
///         &self.factory
///     }
/// }
///
/// impl AppModule {
///     fn app(self: &Rc<Self>) -> Rc<App> {
///         self.shared(slot_name!(), || Rc::new(App { window: self.window() }))
///     }
///
///     fn window(self: &Rc<Self>) -> Rc<Window> {
///         let module = Rc::clone(self);
///         self.shared_with(
///             slot_name!(),
///             || Rc::new(Window { delegate: RefCell::new(Weak::new()) }),
///             move |window: &Rc<Window>| {
///                 *window.delegate.borrow_mut() = Rc::downgrade(&module.app());
///             },
///         )
///     }
/// }
///
/// let module = Rc::new(AppModule { factory: InstanceFactory::new() });
/// let app = module.app();
/// let delegate = app.window.delegate.borrow().upgrade().unwrap();
/// assert!(Rc::ptr_eq(&delegate, &app));
/// ```
pub trait FactoryModule {
    /// The factory backing this module's accessors.
    fn instance_factory(&self) -> &InstanceFactory;

    fn shared<T, F>(&self, name: impl Into<SlotName>, factory: F) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        self.instance_factory().get_shared(name, factory)
    }

    fn shared_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
        C: FnOnce(&T) + 'static,
    {
        self.instance_factory().get_shared_with(name, factory, configure)
    }

    fn weak_shared<T, F>(&self, name: impl Into<SlotName>, factory: F) -> Rc<T>
    where
        T: 'static,
        F: FnOnce() -> Rc<T>,
    {
        self.instance_factory().get_weak_shared(name, factory)
    }

    fn weak_shared_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> Rc<T>
    where
        T: 'static,
        F: FnOnce() -> Rc<T>,
        C: FnOnce(&Rc<T>) + 'static,
    {
        self.instance_factory().get_weak_shared_with(name, factory, configure)
    }

    fn unshared<T, F>(&self, name: impl Into<SlotName>, factory: F) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        self.instance_factory().get_unshared(name, factory)
    }

    fn unshared_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
        C: FnOnce(&T) + 'static,
    {
        self.instance_factory().get_unshared_with(name, factory, configure)
    }

    fn scoped<T, F>(&self, name: impl Into<SlotName>, factory: F) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
    {
        self.instance_factory().get_scoped(name, factory)
    }

    fn scoped_with<T, F, C>(&self, name: impl Into<SlotName>, factory: F, configure: C) -> T
    where
        T: Clone + 'static,
        F: FnOnce() -> T,
        C: FnOnce(&T) + 'static,
    {
        self.instance_factory().get_scoped_with(name, factory, configure)
    }
}

impl FactoryModule for InstanceFactory {
    fn instance_factory(&self) -> &InstanceFactory {
        self
    }
}
