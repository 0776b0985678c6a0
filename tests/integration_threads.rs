//! One factory per thread
//!
//! A factory is confined to the thread that created it. These tests give each
//! thread its own factory and share one observer across all of them.

use ferrous_crucible::{InstanceFactory, MetricsObserver};
use std::rc::Rc;
use std::sync::{Arc, Barrier};
use std::thread;

struct Formatter {
    thread_name: String,
}

fn formatter(factory: &InstanceFactory) -> Rc<Formatter> {
    factory.get_shared("formatter", || {
        Rc::new(Formatter {
            thread_name: thread::current().name().unwrap_or("unnamed").to_string(),
        })
    })
}

#[test]
fn test_each_thread_gets_its_own_shared_instance() {
    const THREADS: usize = 4;
    let metrics = Arc::new(MetricsObserver::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let metrics = metrics.clone();
            let barrier = barrier.clone();
            thread::Builder::new()
                .name(format!("worker-{}", i))
                .spawn(move || {
                    let factory = InstanceFactory::builder().observer(metrics).build();
                    barrier.wait();
                    let first = formatter(&factory);
                    let second = formatter(&factory);
                    assert!(Rc::ptr_eq(&first, &second));
                    first.thread_name.clone()
                })
                .unwrap()
        })
        .collect();

    let mut names: Vec<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    names.sort();

    assert_eq!(names, vec!["worker-0", "worker-1", "worker-2", "worker-3"]);
    assert_eq!(metrics.construction_count(), THREADS as u64);
    assert_eq!(metrics.cache_hit_count(), THREADS as u64);
}

#[test]
fn test_dropping_factory_releases_shared_instances() {
    let probe = {
        let factory = InstanceFactory::new();
        let instance = formatter(&factory);
        Rc::downgrade(&instance)
    };
    assert!(probe.upgrade().is_none());
}

#[test]
fn test_pending_configures_do_not_leak() {
    let factory = Rc::new(InstanceFactory::new());
    let f = factory.clone();
    let value = factory.get_unshared_with("value", || Rc::new(1u8), move |_| {
        let _ = f.get_shared("config", || 2u8);
    });

    // The configure closure held a factory handle; it is gone after the flush
    assert_eq!(Rc::strong_count(&factory), 1);
    assert_eq!(Rc::strong_count(&value), 1);
}
