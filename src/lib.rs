//! # ferrous-crucible
//!
//! Lazy, reentrant construction of object graphs with named lifecycles and
//! deferred configuration.
//!
//! ## Features
//!
//! - **Four lifecycles**: Shared, WeakShared, Unshared and Scoped instances
//! - **Reentrant factories**: a factory closure may request other instances from the same factory
//! - **Deferred configure**: configure callbacks run only after the whole construction tree has unwound
//! - **Circular construction detection**: reports the full construction stack
//! - **Request scoping**: scoped instances live exactly as long as the outermost request
//! - **Observers**: `log` integration and counters through [`FactoryObserver`]
//!
//! ## Quick Start
//!
//! ```rust
//! use ferrous_crucible::{InstanceFactory, Lifecycle};
//! use std::rc::Rc;
//!
//! struct Database {
//!     url: String,
//! }
//!
//! struct UserService {
//!     db: Rc<Database>,
//! }
//!
//! fn database(factory: &InstanceFactory) -> Rc<Database> {
//!     factory.get_shared("database", || {
//!         Rc::new(Database { url: "postgres://localhost".to_string() })
//!     })
//! }
//!
//! fn user_service(factory: &InstanceFactory) -> Rc<UserService> {
//!     factory.get_unshared("user_service", || Rc::new(UserService { db: database(factory) }))
//! }
//!
//! let factory = InstanceFactory::new();
//! let a = user_service(&factory);
//! let b = user_service(&factory);
//!
//! assert!(!Rc::ptr_eq(&a, &b));
//! assert!(Rc::ptr_eq(&a.db, &b.db));
//! assert_eq!(a.db.url, "postgres://localhost");
//! assert!(factory.is_cached(Lifecycle::Shared, "database"));
//! ```
//!
//! ## Lifecycles
//!
//! - **Shared**: built once, kept for the factory's lifetime
//! - **WeakShared**: reused while any caller still holds it, rebuilt after release
//! - **Unshared**: built on every request
//! - **Scoped**: reused within one top-level request, dropped when it completes
//!
//! ## Deferred Configuration
//!
//! ```rust
//! use ferrous_crucible::InstanceFactory;
//! use std::cell::RefCell;
//! use std::rc::{Rc, Weak};
//!
//! struct Parent {
//!     child: Rc<Child>,
//! }
//!
//! struct Child {
//!     parent: RefCell<Weak<Parent>>,
//! }
//!
//! fn parent(factory: &Rc<InstanceFactory>) -> Rc<Parent> {
//!     factory.get_shared("parent", || Rc::new(Parent { child: child(factory) }))
//! }
//!
//! fn child(factory: &Rc<InstanceFactory>) -> Rc<Child> {
//!     let factory_ref = Rc::clone(factory);
//!     factory.get_shared_with(
//!         "child",
//!         || Rc::new(Child { parent: RefCell::new(Weak::new()) }),
//!         move |child: &Rc<Child>| {
//!             *child.parent.borrow_mut() = Rc::downgrade(&parent(&factory_ref));
//!         },
//!     )
//! }
//!
//! let factory = Rc::new(InstanceFactory::new());
//! let p = parent(&factory);
//! assert!(Rc::ptr_eq(&p.child.parent.borrow().upgrade().unwrap(), &p));
//! ```

// Module declarations
pub mod builder;
pub mod config;
pub mod error;
pub mod factory;
pub mod key;
pub mod lifecycle;
pub mod observer;
pub mod traits;

// Internal modules
mod internal;
mod pool;

pub use builder::FactoryBuilder;
pub use config::FactoryConfig;
pub use error::{FactoryError, FactoryResult};
pub use factory::{FactorySnapshot, InstanceFactory, WeakEntry};
pub use internal::CircularPanic;
pub use key::{SlotKey, SlotName};
pub use lifecycle::Lifecycle;
pub use observer::{FactoryObserver, LoggingObserver, MetricsObserver, StaleReason};
pub use traits::FactoryModule;

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_shared_resolution() {
        let factory = InstanceFactory::new();
        let a: Rc<usize> = factory.get_shared("answer", || Rc::new(42));
        let b: Rc<usize> = factory.get_shared("answer", || Rc::new(0));

        assert_eq!(*a, 42);
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unshared_resolution() {
        let factory = InstanceFactory::new();
        let counter = Cell::new(0);
        let next = || {
            counter.set(counter.get() + 1);
            format!("instance-{}", counter.get())
        };

        let a = factory.get_unshared("label", next);
        let b = factory.get_unshared("label", next);

        assert_eq!(a, "instance-1");
        assert_eq!(b, "instance-2");
    }

    #[test]
    fn test_scoped_resolution() {
        let factory = InstanceFactory::new();
        let counter = Cell::new(0);
        let request_id = |factory: &InstanceFactory| {
            factory.get_scoped("request_id", || {
                counter.set(counter.get() + 1);
                Rc::new(format!("req-{}", counter.get()))
            })
        };

        let (first, second) = factory.get_unshared("pair", || (request_id(&factory), request_id(&factory)));
        assert!(Rc::ptr_eq(&first, &second));

        let next = request_id(&factory);
        assert_eq!(next.as_str(), "req-2");
    }

    #[test]
    fn test_weak_shared_resolution() {
        let factory = InstanceFactory::new();
        let a = factory.get_weak_shared("cache", || Rc::new(vec![1u8]));
        let b = factory.get_weak_shared("cache", || Rc::new(vec![2u8]));
        assert!(Rc::ptr_eq(&a, &b));

        drop(a);
        drop(b);
        let c = factory.get_weak_shared("cache", || Rc::new(vec![3u8]));
        assert_eq!(*c, vec![3u8]);
    }

    #[test]
    fn test_module_slot_names() {
        struct Module {
            factory: InstanceFactory,
        }

        impl FactoryModule for Module {
            fn instance_factory(&self) -> &InstanceFactory {
                &self.factory
            }
        }

        impl Module {
            fn greeting(&self) -> Rc<String> {
                self.shared(crate::slot_name!(), || Rc::new("hello".to_string()))
            }
        }

        let module = Module { factory: InstanceFactory::new() };
        let greeting = module.greeting();
        assert!(Rc::ptr_eq(&greeting, &module.greeting()));

        let snapshot = module.factory.snapshot();
        assert_eq!(snapshot.shared.len(), 1);
        assert!(snapshot.shared[0].ends_with("greeting"));
    }
}
