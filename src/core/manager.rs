//! The manager driving update, diff, swap and notify cycles.

use crate::core::{ManagerBuilder, Scope, Snapshot};
use crate::error::{ConfigError, Result};
use crate::notify::{EverythingObserver, ObserverRegistry, Subscription};
use crate::sources::Source;
use arc_swap::ArcSwap;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[cfg(feature = "metrics")]
use crate::metrics::UpdateMetrics;

/// Owns the active snapshot and swaps in new ones on demand.
///
/// Reads go through [`K`](crate::core::K) handles obtained from the typed
/// accessors (available through `Deref` to the root [`Scope`]). They are
/// lock-free and always observe one complete snapshot.
///
/// [`update_now`](Manager::update_now) is single-writer: concurrent or
/// re-entrant calls (from an observer, for instance) are rejected with
/// `IllegalState` rather than queued.
///
/// # Examples
///
/// ```rust
/// use hotswap_konfig::prelude::*;
/// use std::sync::Arc;
///
/// # fn example() -> Result<()> {
/// let backing = Arc::new(MapBacking::new());
/// backing.set("aInt", 12);
///
/// let manager = Manager::builder()
///     .with_source(MapSource::backed("defaults", Arc::clone(&backing)))
///     .build()?;
///
/// let value = manager.int_("aInt");
/// assert_eq!(value.v()?, 12);
///
/// backing.set("aInt", 99);
/// assert!(manager.update_now()?);
/// assert_eq!(value.v()?, 99);
/// assert!(!manager.update_now()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Manager {
    root: Scope,
    updating: Arc<AtomicBool>,
    #[cfg(feature = "metrics")]
    metrics: Option<UpdateMetrics>,
}

/// Marks an update as in flight for as long as it lives.
struct UpdateGuard<'a>(&'a AtomicBool);

impl<'a> UpdateGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| ConfigError::IllegalState("update already in progress".to_string()))?;
        Ok(Self(flag))
    }
}

impl Drop for UpdateGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Manager {
    /// Create a new builder.
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::new()
    }

    /// Combine sources in priority order (first listed wins) into a manager.
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` if any source fails to list its entries.
    pub fn from_sources(sources: Vec<Arc<dyn Source>>) -> Result<Self> {
        let snapshot = Snapshot::build(sources)?;
        tracing::debug!(
            sources = ?snapshot.source_names(),
            keys = snapshot.values().len(),
            "built initial snapshot"
        );

        Ok(Self {
            root: Scope::root(
                Arc::new(ArcSwap::from_pointee(snapshot)),
                Arc::new(ObserverRegistry::new()),
            ),
            updating: Arc::new(AtomicBool::new(false)),
            #[cfg(feature = "metrics")]
            metrics: None,
        })
    }

    /// Record update metrics through `metrics`.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, metrics: UpdateMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// The active snapshot.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.root.current().load_full()
    }

    /// Register a whole-configuration observer.
    ///
    /// The registration does not keep `observer` alive.
    pub fn register<O>(&self, observer: &Arc<O>) -> Subscription
    where
        O: EverythingObserver + 'static,
    {
        self.root.registry().register_everything(observer)
    }

    /// Remove a registration. Returns false if it was not registered.
    pub fn deregister(&self, subscription: &Subscription) -> bool {
        self.root.registry().deregister(subscription)
    }

    /// Number of registered observers that are still alive.
    pub fn observer_count(&self) -> usize {
        self.root.registry().observer_count()
    }

    /// Rebuild the snapshot if any source reports an update.
    ///
    /// 1. If no source reports an update, returns `false` without touching
    ///    the active snapshot.
    /// 2. Otherwise every updated source is replaced by its
    ///    `updated_copy()` and a new snapshot is built off to the side.
    /// 3. The new snapshot is diffed against the active one.
    /// 4. The new snapshot is swapped in atomically.
    /// 5. Observers of every changed key run, then whole-configuration
    ///    observers run once.
    ///
    /// Returns `true` iff at least one key's value changed.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if another update is in flight.
    /// - Any error from a source's `updated_copy()` or `entries()`; the
    ///   active snapshot is left unchanged.
    /// - The first observer error. The new snapshot is already active at
    ///   that point and observers are not delivered all-or-nothing.
    pub fn update_now(&self) -> Result<bool> {
        let _guard = UpdateGuard::acquire(&self.updating)?;

        #[cfg(feature = "metrics")]
        let timer = self.metrics.as_ref().map(UpdateMetrics::start_update);

        let result = self.perform_update();

        #[cfg(feature = "metrics")]
        self.record_outcome(timer, &result);

        result
    }

    #[cfg(feature = "metrics")]
    fn record_outcome(&self, timer: Option<std::time::Instant>, result: &Result<bool>) {
        if let (Some(metrics), Some(timer)) = (&self.metrics, timer) {
            match result {
                Ok(_) => metrics.record_update_success(timer),
                Err(_) => metrics.record_update_failure(timer),
            }
            metrics.update_observer_count(self.observer_count() as i64);
        }
    }

    fn perform_update(&self) -> Result<bool> {
        let current = self.snapshot();

        let stale: Vec<bool> = current.sources().iter().map(|s| s.has_update()).collect();
        if !stale.contains(&true) {
            tracing::trace!("no source reported an update");
            return Ok(false);
        }

        let mut sources = Vec::with_capacity(stale.len());
        for (source, updated) in current.sources().iter().zip(stale) {
            if updated {
                tracing::debug!(source = %source.name(), "source reported an update");
                let copy = source.updated_copy().inspect_err(|e| {
                    tracing::warn!(source = %source.name(), error = %e, "update aborted");
                })?;
                sources.push(copy);
            } else {
                sources.push(Arc::clone(source));
            }
        }

        let next = Snapshot::build(sources).inspect_err(|e| {
            tracing::warn!(error = %e, "update aborted while building snapshot");
        })?;
        let changed = current.diff(&next);

        self.root.current().store(Arc::new(next));

        #[cfg(feature = "metrics")]
        self.metrics.iter().for_each(|m| m.record_swap(changed.len()));

        if changed.is_empty() {
            tracing::debug!("snapshot rebuilt with no changed keys");
            return Ok(false);
        }

        tracing::info!(changed = changed.len(), keys = ?changed, "configuration updated");
        let notified = self.root.registry().dispatch(&changed)?;
        tracing::debug!(notified, "observers notified");

        Ok(true)
    }
}

impl Deref for Manager {
    type Target = Scope;

    fn deref(&self) -> &Scope {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kind::Kind;
    use crate::sources::{MapBacking, MapSource};
    use crate::value::RawValue;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    fn backed() -> (Arc<MapBacking>, Manager) {
        let backing = Arc::new(MapBacking::new());
        backing.set("aInt", 12);
        backing.set("aBool", true);
        let manager = Manager::builder()
            .with_source(MapSource::backed("test", Arc::clone(&backing)))
            .build()
            .unwrap();
        (backing, manager)
    }

    #[test]
    fn test_update_is_idempotent() {
        let (backing, manager) = backed();
        assert!(!manager.update_now().unwrap());

        backing.set("aInt", 99);
        assert!(manager.update_now().unwrap());
        assert!(!manager.update_now().unwrap());
    }

    #[test]
    fn test_update_without_value_change() {
        let (backing, manager) = backed();
        backing.set("aInt", 12);

        let before = manager.snapshot();
        assert!(!manager.update_now().unwrap());
        // Rebuilt, but nothing changed
        assert!(!Arc::ptr_eq(&before, &manager.snapshot()));
    }

    #[test]
    fn test_no_update_keeps_snapshot() {
        let (_backing, manager) = backed();
        let before = manager.snapshot();
        assert!(!manager.update_now().unwrap());
        assert!(Arc::ptr_eq(&before, &manager.snapshot()));
    }

    #[test]
    fn test_everything_observer() {
        let (backing, manager) = backed();
        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = Arc::clone(&counter);
        let observer = Arc::new(move || -> Result<()> {
            counter_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let subscription = manager.register(&observer);
        assert_eq!(manager.observer_count(), 1);

        backing.set("aInt", 1);
        backing.set("aBool", false);
        manager.update_now().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);

        assert!(manager.deregister(&subscription));
        backing.set("aInt", 2);
        manager.update_now().unwrap();
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_reentrant_update_rejected() {
        let (backing, manager) = backed();
        let inner = manager.clone();
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let seen_clone = Arc::clone(&seen);
        let observer = Arc::new(move || -> Result<()> {
            *seen_clone.lock() = Some(inner.update_now().is_err());
            Ok(())
        });
        let _subscription = manager.register(&observer);

        backing.set("aInt", 5);
        assert!(manager.update_now().unwrap());
        assert_eq!(*seen.lock(), Some(true));

        // The guard is released afterwards
        backing.set("aInt", 6);
        assert!(manager.update_now().unwrap());
    }

    #[test]
    fn test_failed_update_keeps_snapshot() {
        struct Flaky;

        impl Source for Flaky {
            fn name(&self) -> String {
                "flaky".to_string()
            }
            fn has(&self, key: &str, _kind: &Kind) -> bool {
                key == "x"
            }
            fn is_null(&self, _key: &str) -> bool {
                false
            }
            fn bool0(&self, _key: &str) -> Result<RawValue> {
                Ok(RawValue::Bool(true))
            }
            fn char0(&self, key: &str) -> Result<RawValue> {
                self.bool0(key)
            }
            fn string0(&self, key: &str) -> Result<RawValue> {
                self.bool0(key)
            }
            fn number0(&self, key: &str) -> Result<RawValue> {
                self.bool0(key)
            }
            fn list0(&self, key: &str, _kind: &Kind) -> Result<RawValue> {
                self.bool0(key)
            }
            fn set0(&self, key: &str, _kind: &Kind) -> Result<RawValue> {
                self.bool0(key)
            }
            fn map0(&self, key: &str, _kind: &Kind) -> Result<RawValue> {
                self.bool0(key)
            }
            fn custom0(&self, key: &str, _kind: &Kind) -> Result<RawValue> {
                self.bool0(key)
            }
            fn entries(&self) -> Result<BTreeMap<String, RawValue>> {
                Ok(BTreeMap::from([("x".to_string(), RawValue::Bool(true))]))
            }
            fn has_update(&self) -> bool {
                true
            }
            fn updated_copy(&self) -> Result<Arc<dyn Source>> {
                Err(ConfigError::SourceUnavailable {
                    source_name: self.name(),
                    reason: "backend offline".to_string(),
                })
            }
        }

        let backing = Arc::new(MapBacking::new());
        backing.set("aInt", 12);
        let manager = Manager::builder()
            .with_source(MapSource::backed("test", Arc::clone(&backing)))
            .with_source(Flaky)
            .build()
            .unwrap();

        backing.set("aInt", 99);
        let before = manager.snapshot();
        let err = manager.update_now().unwrap_err();
        assert!(matches!(err, ConfigError::SourceUnavailable { .. }));
        assert!(Arc::ptr_eq(&before, &manager.snapshot()));
        assert_eq!(manager.int_("aInt").v().unwrap(), 12);
        assert!(manager.bool("x").v().unwrap());
    }

    #[test]
    fn test_from_sources() {
        let manager = Manager::from_sources(vec![
            Arc::new(MapSource::new("a").with_value("k", 1)),
            Arc::new(MapSource::new("b").with_value("k", 2)),
        ])
        .unwrap();
        assert_eq!(manager.int_("k").v().unwrap(), 1);
        assert_eq!(manager.snapshot().source_names(), vec!["map:a", "map:b"]);
    }
}
