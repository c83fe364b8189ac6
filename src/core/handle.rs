//! Typed, lazily resolving handles to configuration values.

use crate::core::Snapshot;
use crate::error::{ConfigError, Result};
use crate::kind::Kind;
use crate::notify::{KeyObserver, ObserverRegistry, Subscription};
use crate::value::RawValue;
use arc_swap::ArcSwap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Converts a checked raw value into the handle's target type.
pub(crate) type Decoder<T> = fn(&str, RawValue) -> Result<T>;

/// A typed handle bound to a key.
///
/// A handle holds no value of its own. Every [`v`](K::v) call resolves the key
/// against whichever snapshot is active at that moment, so a handle created
/// before an update observes the new value afterwards. Creating a handle never
/// fails, even for keys that do not exist yet.
///
/// Two handles are equal when they have the same key and kind.
///
/// # Examples
///
/// ```rust
/// use hotswap_konfig::prelude::*;
///
/// # fn example() -> Result<()> {
/// let manager = Manager::builder()
///     .with_source(MapSource::new("defaults").with_value("port", 8080))
///     .build()?;
///
/// let port = manager.int_("port");
/// assert_eq!(port.v()?, 8080);
///
/// let timeout = manager.int_("timeout");
/// assert_eq!(timeout.v_or(30)?, 30);
/// assert!(timeout.v().unwrap_err().is_missing_key());
/// # Ok(())
/// # }
/// ```
pub struct K<T> {
    key: String,
    kind: Kind,
    current: Arc<ArcSwap<Snapshot>>,
    registry: Arc<ObserverRegistry>,
    decode: Decoder<T>,
}

impl<T> K<T> {
    pub(crate) fn new(
        key: String,
        kind: Kind,
        current: Arc<ArcSwap<Snapshot>>,
        registry: Arc<ObserverRegistry>,
        decode: Decoder<T>,
    ) -> Self {
        Self {
            kind: kind.with_key(key.as_str()),
            key,
            current,
            registry,
            decode,
        }
    }

    /// The fully qualified key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The descriptor, bound to this handle's key.
    pub fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Resolve the value against the active snapshot.
    ///
    /// A key holding an explicit null yields `TypeMismatch` unless `T` is an
    /// `Option`.
    ///
    /// # Errors
    ///
    /// `MissingKey` if no source holds the key, `TypeMismatch` if the value
    /// does not satisfy the handle's kind.
    pub fn v(&self) -> Result<T> {
        let snapshot = self.current.load();
        let raw = snapshot.resolve(&self.key, &self.kind)?;
        (self.decode)(&self.key, raw)
    }

    /// Resolve the value, or return `default` unchecked if the key is missing.
    ///
    /// # Errors
    ///
    /// `TypeMismatch` if the key is present but does not satisfy the kind.
    pub fn v_or(&self, default: T) -> Result<T> {
        let snapshot = self.current.load();
        match snapshot.resolve(&self.key, &self.kind) {
            Ok(raw) => (self.decode)(&self.key, raw),
            Err(ConfigError::MissingKey { .. }) => Ok(default),
            Err(e) => Err(e),
        }
    }

    /// Assert that the key exists without resolving its type.
    ///
    /// # Errors
    ///
    /// `MissingKey` if no source holds the key.
    pub fn c(&self) -> Result<&Self> {
        if self.exists() {
            Ok(self)
        } else {
            Err(ConfigError::missing(&self.key))
        }
    }

    /// Whether any source currently holds the key.
    pub fn exists(&self) -> bool {
        self.current.load().contains(&self.key, &self.kind)
    }

    /// Register an observer called after any update that changes this key.
    ///
    /// The registration does not keep `observer` alive; keep your own `Arc`
    /// for as long as notifications are wanted, and pass the returned
    /// subscription to [`deregister`](K::deregister) when done.
    pub fn register<O>(&self, observer: &Arc<O>) -> Subscription
    where
        O: KeyObserver + 'static,
    {
        self.registry.register_key(&self.key, observer)
    }

    /// Remove a registration made through any handle for this key.
    pub fn deregister(&self, subscription: &Subscription) -> bool {
        self.registry.deregister(subscription)
    }
}

impl<T> Clone for K<T> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            kind: self.kind.clone(),
            current: Arc::clone(&self.current),
            registry: Arc::clone(&self.registry),
            decode: self.decode,
        }
    }
}

impl<T> PartialEq for K<T> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.kind == other.kind
    }
}

impl<T> Eq for K<T> {}

impl<T> Hash for K<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        self.kind.hash(state);
    }
}

impl<T> fmt::Debug for K<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("K")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}
