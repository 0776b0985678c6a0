//! Observers for instance factory events.
//!
//! Observers receive a synchronous callback for every construction, cache hit,
//! configure flush and request boundary, which makes them the place to hook
//! logging and metrics into a factory.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::internal::CircularPanic;
use crate::key::SlotKey;

/// Why a pooled entry was passed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StaleReason {
    /// Weak entry whose instance every owner has released
    Released,
    /// Entry stored under the same name with a different type
    TypeMismatch,
}

/// Observer trait for instance factory events.
///
/// Only [`constructing`](Self::constructing) and
/// [`constructed`](Self::constructed) are required; the rest default to no-ops.
///
/// Observers are `Send + Sync` so one observer can be shared by the factories
/// of several threads, even though each factory is confined to its own thread.
///
/// # Performance
///
/// Calls are made inline during construction. Keep implementations cheap.
///
/// # Examples
///
/// ```
/// use ferrous_crucible::{FactoryObserver, InstanceFactory, SlotKey};
/// use std::sync::{Arc, Mutex};
/// use std::time::Duration;
///
/// #[derive(Default)]
/// struct Recorder {
///     built: Mutex<Vec<String>>,
/// }
///
/// impl FactoryObserver for Recorder {
///     fn constructing(&self, _key: &SlotKey) {}
///
///     fn constructed(&self, key: &SlotKey, _duration: Duration) {
///         self.built.lock().unwrap().push(key.to_string());
///     }
/// }
///
/// let recorder = Arc::new(Recorder::default());
/// let factory = InstanceFactory::builder()
///     .observer(recorder.clone())
///     .build();
///
/// factory.get_shared("answer", || 42u32);
/// factory.get_shared("answer", || 0u32);
/// assert_eq!(*recorder.built.lock().unwrap(), vec!["shared(answer)".to_string()]);
/// ```
pub trait FactoryObserver: Send + Sync {
    /// Called right before the factory closure for `key` runs.
    fn constructing(&self, key: &SlotKey);

    /// Called when the factory closure for `key` returned an instance.
    fn constructed(&self, key: &SlotKey, duration: Duration);

    /// Called when a request was served from a pool.
    fn cache_hit(&self, _key: &SlotKey) {}

    /// Called when a fallible factory closure returned an error.
    fn construction_failed(&self, _key: &SlotKey) {}

    /// Called when a pooled entry exists for `key` but cannot be used.
    fn stale_entry(&self, _key: &SlotKey, _reason: StaleReason) {}

    /// Called right before the circular-construction panic is raised.
    fn circular(&self, _circular: &CircularPanic) {}

    /// Called when the construction stack exceeded the maximum depth.
    fn depth_exceeded(&self, _key: &SlotKey, _depth: usize) {}

    /// Called after a batch of deferred configure actions has run.
    ///
    /// `depth` is the request depth the batch ran at, starting from 1.
    fn configures_flushed(&self, _count: usize, _depth: usize) {}

    /// Called when a top-level request completed and the scoped pool was
    /// cleared of `scoped_cleared` entries.
    fn request_completed(&self, _scoped_cleared: usize) {}

    /// Called when a construction tree was abandoned and its pending
    /// configure actions were dropped without running.
    fn request_abandoned(&self, _discarded: usize) {}
}

/// Container for registered observers.
#[derive(Default, Clone)]
pub(crate) struct Observers {
    observers: Vec<Arc<dyn FactoryObserver>>,
}

impl Observers {
    pub(crate) fn add(&mut self, observer: Arc<dyn FactoryObserver>) {
        self.observers.push(observer);
    }

    #[inline]
    pub(crate) fn has_observers(&self) -> bool {
        !self.observers.is_empty()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.observers.len()
    }

    #[inline]
    pub(crate) fn constructing(&self, key: &SlotKey) {
        for observer in &self.observers {
            observer.constructing(key);
        }
    }

    #[inline]
    pub(crate) fn constructed(&self, key: &SlotKey, duration: Duration) {
        for observer in &self.observers {
            observer.constructed(key, duration);
        }
    }

    #[inline]
    pub(crate) fn cache_hit(&self, key: &SlotKey) {
        for observer in &self.observers {
            observer.cache_hit(key);
        }
    }

    #[inline]
    pub(crate) fn construction_failed(&self, key: &SlotKey) {
        for observer in &self.observers {
            observer.construction_failed(key);
        }
    }

    #[inline]
    pub(crate) fn stale_entry(&self, key: &SlotKey, reason: StaleReason) {
        for observer in &self.observers {
            observer.stale_entry(key, reason);
        }
    }

    pub(crate) fn circular(&self, circular: &CircularPanic) {
        for observer in &self.observers {
            observer.circular(circular);
        }
    }

    pub(crate) fn depth_exceeded(&self, key: &SlotKey, depth: usize) {
        for observer in &self.observers {
            observer.depth_exceeded(key, depth);
        }
    }

    #[inline]
    pub(crate) fn configures_flushed(&self, count: usize, depth: usize) {
        for observer in &self.observers {
            observer.configures_flushed(count, depth);
        }
    }

    #[inline]
    pub(crate) fn request_completed(&self, scoped_cleared: usize) {
        for observer in &self.observers {
            observer.request_completed(scoped_cleared);
        }
    }

    pub(crate) fn request_abandoned(&self, discarded: usize) {
        for observer in &self.observers {
            observer.request_abandoned(discarded);
        }
    }
}

/// Built-in observer that forwards events to the `log` facade.
///
/// Constructions and cache hits are logged at `trace`, failures, flushes and
/// request boundaries at `debug`, type mismatches at `warn`. Cycles, depth
/// overflows and abandoned requests are logged by the factory itself.
///
/// # Examples
///
/// ```
/// use ferrous_crucible::{InstanceFactory, LoggingObserver};
/// use std::sync::Arc;
///
/// let factory = InstanceFactory::builder()
///     .observer(Arc::new(LoggingObserver::with_prefix("[app]")))
///     .build();
/// factory.get_shared("greeting", || String::from("hello"));
/// ```
pub struct LoggingObserver {
    prefix: String,
}

impl LoggingObserver {
    /// Creates a new logging observer with default prefix.
    pub fn new() -> Self {
        Self {
            prefix: "[ferrous-crucible]".to_string(),
        }
    }

    /// Creates a new logging observer with a custom prefix.
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Default for LoggingObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryObserver for LoggingObserver {
    fn constructing(&self, key: &SlotKey) {
        log::trace!("{} Constructing: {}", self.prefix, key);
    }

    fn constructed(&self, key: &SlotKey, duration: Duration) {
        log::trace!("{} Constructed: {} in {:?}", self.prefix, key, duration);
    }

    fn cache_hit(&self, key: &SlotKey) {
        log::trace!("{} Cache hit: {}", self.prefix, key);
    }

    fn construction_failed(&self, key: &SlotKey) {
        log::debug!("{} Factory failed: {}", self.prefix, key);
    }

    fn stale_entry(&self, key: &SlotKey, reason: StaleReason) {
        match reason {
            StaleReason::Released => {
                log::debug!("{} Released, reconstructing: {}", self.prefix, key)
            }
            StaleReason::TypeMismatch => {
                log::warn!("{} Type mismatch, reconstructing: {}", self.prefix, key)
            }
        }
    }

    fn configures_flushed(&self, count: usize, depth: usize) {
        log::debug!("{} Ran {} deferred configures at depth {}", self.prefix, count, depth);
    }

    fn request_completed(&self, scoped_cleared: usize) {
        log::debug!("{} Request completed, {} scoped cleared", self.prefix, scoped_cleared);
    }
}

/// Observer that keeps running counters.
///
/// Counters are atomics so one instance can be shared across the factories of
/// several threads.
pub struct MetricsObserver {
    pub constructions: AtomicU64,
    pub total_construction_time: AtomicU64,
    pub cache_hits: AtomicU64,
    pub failures: AtomicU64,
    pub stale_entries: AtomicU64,
    pub configures_run: AtomicU64,
    pub requests_completed: AtomicU64,
    pub requests_abandoned: AtomicU64,
}

impl MetricsObserver {
    pub fn new() -> Self {
        Self {
            constructions: AtomicU64::new(0),
            total_construction_time: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            stale_entries: AtomicU64::new(0),
            configures_run: AtomicU64::new(0),
            requests_completed: AtomicU64::new(0),
            requests_abandoned: AtomicU64::new(0),
        }
    }

    pub fn construction_count(&self) -> u64 {
        self.constructions.load(Ordering::Relaxed)
    }

    pub fn cache_hit_count(&self) -> u64 {
        self.cache_hits.load(Ordering::Relaxed)
    }

    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn stale_entry_count(&self) -> u64 {
        self.stale_entries.load(Ordering::Relaxed)
    }

    pub fn configures_run(&self) -> u64 {
        self.configures_run.load(Ordering::Relaxed)
    }

    pub fn requests_completed(&self) -> u64 {
        self.requests_completed.load(Ordering::Relaxed)
    }

    pub fn requests_abandoned(&self) -> u64 {
        self.requests_abandoned.load(Ordering::Relaxed)
    }

    /// Gets the average construction time.
    pub fn average_construction_time(&self) -> Option<Duration> {
        let count = self.construction_count();
        if count == 0 {
            return None;
        }

        let total_ns = self.total_construction_time.load(Ordering::Relaxed);
        Some(Duration::from_nanos(total_ns / count))
    }

    /// Resets all metrics.
    pub fn reset(&self) {
        for counter in [
            &self.constructions,
            &self.total_construction_time,
            &self.cache_hits,
            &self.failures,
            &self.stale_entries,
            &self.configures_run,
            &self.requests_completed,
            &self.requests_abandoned,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for MetricsObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl FactoryObserver for MetricsObserver {
    fn constructing(&self, _key: &SlotKey) {}

    fn constructed(&self, _key: &SlotKey, duration: Duration) {
        self.constructions.fetch_add(1, Ordering::Relaxed);
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        let _ = self
            .total_construction_time
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |total| {
                Some(total.saturating_add(nanos))
            });
    }

    fn cache_hit(&self, _key: &SlotKey) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    fn construction_failed(&self, _key: &SlotKey) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    fn stale_entry(&self, _key: &SlotKey, _reason: StaleReason) {
        self.stale_entries.fetch_add(1, Ordering::Relaxed);
    }

    fn configures_flushed(&self, count: usize, _depth: usize) {
        self.configures_run.fetch_add(count as u64, Ordering::Relaxed);
    }

    fn request_completed(&self, _scoped_cleared: usize) {
        self.requests_completed.fetch_add(1, Ordering::Relaxed);
    }

    fn request_abandoned(&self, _discarded: usize) {
        self.requests_abandoned.fetch_add(1, Ordering::Relaxed);
    }
}
