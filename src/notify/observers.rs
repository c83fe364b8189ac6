//! Observer registrations for configuration changes.

use crate::error::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

/// Callback fired when one specific key's resolved value changes.
///
/// Implemented for any `Fn(&str) -> Result<()>` closure.
pub trait KeyObserver: Send + Sync {
    /// Called with the changed key after the new snapshot is active.
    fn updated(&self, key: &str) -> Result<()>;
}

impl<F> KeyObserver for F
where
    F: Fn(&str) -> Result<()> + Send + Sync,
{
    fn updated(&self, key: &str) -> Result<()> {
        self(key)
    }
}

/// Callback fired once per update in which anything changed.
///
/// Implemented for any `Fn() -> Result<()>` closure.
pub trait EverythingObserver: Send + Sync {
    /// Called after the new snapshot is active.
    fn updated(&self) -> Result<()>;
}

impl<F> EverythingObserver for F
where
    F: Fn() -> Result<()> + Send + Sync,
{
    fn updated(&self) -> Result<()> {
        self()
    }
}

/// Token identifying one registration.
///
/// Pass it back to `deregister` to remove the registration. Dropping the token
/// does not deregister anything; dropping the observer itself does, lazily.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subscription {
    id: u64,
    key: Option<String>,
}

impl Subscription {
    /// The key this subscription observes, or `None` for whole-configuration observers.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            id: u64::MAX,
            key: None,
        }
    }
}

type KeyEntry = (u64, Weak<dyn KeyObserver>);
type EverythingEntry = (u64, Weak<dyn EverythingObserver>);

/// Internal registry state.
#[derive(Default)]
struct ObserverRegistryInner {
    per_key: BTreeMap<String, Vec<KeyEntry>>,
    everything: Vec<EverythingEntry>,
    next_id: u64,
}

impl ObserverRegistryInner {
    fn next_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Registry of per-key and whole-configuration observers.
///
/// Registrations hold only weak references: an observer stays registered for
/// as long as somebody else keeps it alive. Entries whose observer has been
/// dropped are pruned during the next dispatch.
///
/// # Examples
///
/// ```rust
/// use hotswap_konfig::error::Result;
/// use hotswap_konfig::notify::ObserverRegistry;
/// use std::sync::Arc;
///
/// # fn example() -> Result<()> {
/// let registry = ObserverRegistry::new();
///
/// let observer = Arc::new(|key: &str| -> Result<()> {
///     println!("{} changed", key);
///     Ok(())
/// });
/// let subscription = registry.register_key("db.host", &observer);
///
/// registry.dispatch(&["db.host".to_string()])?;
///
/// registry.deregister(&subscription);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ObserverRegistry {
    inner: Mutex<ObserverRegistryInner>,
}

impl ObserverRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a per-key observer without taking ownership of it.
    pub fn register_key<O>(&self, key: &str, observer: &Arc<O>) -> Subscription
    where
        O: KeyObserver + 'static,
    {
        let weak: Weak<dyn KeyObserver> = Arc::downgrade(observer) as Weak<dyn KeyObserver>;
        self.register_key_weak(key, weak)
    }

    /// Register an already downgraded per-key observer.
    pub fn register_key_weak(&self, key: &str, observer: Weak<dyn KeyObserver>) -> Subscription {
        let mut inner = self.inner.lock();
        let id = inner.next_id();
        inner
            .per_key
            .entry(key.to_string())
            .or_default()
            .push((id, observer));

        Subscription {
            id,
            key: Some(key.to_string()),
        }
    }

    /// Register a whole-configuration observer without taking ownership of it.
    pub fn register_everything<O>(&self, observer: &Arc<O>) -> Subscription
    where
        O: EverythingObserver + 'static,
    {
        let weak: Weak<dyn EverythingObserver> =
            Arc::downgrade(observer) as Weak<dyn EverythingObserver>;
        let mut inner = self.inner.lock();
        let id = inner.next_id();
        inner.everything.push((id, weak));

        Subscription { id, key: None }
    }

    /// Remove a registration. Returns false if it was not registered.
    pub fn deregister(&self, subscription: &Subscription) -> bool {
        let mut inner = self.inner.lock();
        match &subscription.key {
            Some(key) => {
                let Some(entries) = inner.per_key.get_mut(key) else {
                    return false;
                };
                let before = entries.len();
                entries.retain(|(id, _)| *id != subscription.id);
                let removed = entries.len() != before;
                if entries.is_empty() {
                    inner.per_key.remove(key);
                }
                removed
            }
            None => {
                let before = inner.everything.len();
                inner.everything.retain(|(id, _)| *id != subscription.id);
                inner.everything.len() != before
            }
        }
    }

    /// Number of registrations whose observer is still alive.
    pub fn observer_count(&self) -> usize {
        let inner = self.inner.lock();
        let keyed = inner
            .per_key
            .values()
            .flatten()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count();
        let everything = inner
            .everything
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count();
        keyed + everything
    }

    /// Notify observers of the given changed keys.
    ///
    /// Keys are visited in the order given; within a key, observers run in
    /// registration order. Whole-configuration observers then run once, in
    /// registration order, if `changed` is non-empty. Callbacks run after the
    /// registry lock is released, so they may register or deregister.
    ///
    /// # Errors
    ///
    /// The first observer error is returned immediately; observers already
    /// invoked in this round are not rolled back and later ones are skipped.
    pub fn dispatch(&self, changed: &[String]) -> Result<usize> {
        if changed.is_empty() {
            return Ok(0);
        }

        let (keyed, everything) = self.live_observers(changed);

        let mut notified = 0;
        for (key, observer) in &keyed {
            observer.updated(key)?;
            notified += 1;
        }
        for observer in &everything {
            observer.updated()?;
            notified += 1;
        }
        Ok(notified)
    }

    /// Collect live observers for `changed`, pruning dead registrations.
    fn live_observers(
        &self,
        changed: &[String],
    ) -> (
        Vec<(String, Arc<dyn KeyObserver>)>,
        Vec<Arc<dyn EverythingObserver>>,
    ) {
        let mut inner = self.inner.lock();

        let mut keyed = Vec::new();
        for key in changed {
            let Some(entries) = inner.per_key.get_mut(key) else {
                continue;
            };
            entries.retain(|(id, weak)| {
                let alive = weak.strong_count() > 0;
                if !alive {
                    tracing::trace!(key = %key, id, "pruning dropped key observer");
                }
                alive
            });
            keyed.extend(
                entries
                    .iter()
                    .filter_map(|(_, weak)| weak.upgrade())
                    .map(|observer| (key.clone(), observer)),
            );
            if entries.is_empty() {
                inner.per_key.remove(key);
            }
        }

        inner.everything.retain(|(id, weak)| {
            let alive = weak.strong_count() > 0;
            if !alive {
                tracing::trace!(id, "pruning dropped configuration observer");
            }
            alive
        });
        let everything = inner
            .everything
            .iter()
            .filter_map(|(_, weak)| weak.upgrade())
            .collect();

        (keyed, everything)
    }
}
