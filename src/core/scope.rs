//! Key namespaces and the typed accessors that produce handles.

use crate::core::{K, Snapshot};
use crate::kind::{Plain, Reify};
use crate::notify::ObserverRegistry;
use crate::sources::{custom_kind, decode_custom};
use arc_swap::ArcSwap;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A view of the active configuration, optionally scoped under a key prefix.
///
/// Accessors return [`K`] handles and never fail; resolution happens when the
/// handle is read. [`Manager`](crate::core::Manager) dereferences to its root
/// scope, so the accessors are available directly on the manager.
///
/// # Examples
///
/// ```rust
/// use hotswap_konfig::prelude::*;
///
/// # fn example() -> Result<()> {
/// let manager = Manager::builder()
///     .with_source(MapSource::new("defaults").with_value("db.host", "X"))
///     .build()?;
///
/// let db = manager.subset("db");
/// assert_eq!(db.string("host").v()?, "X");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Scope {
    prefix: Option<String>,
    current: Arc<ArcSwap<Snapshot>>,
    registry: Arc<ObserverRegistry>,
}

impl Scope {
    pub(crate) fn root(current: Arc<ArcSwap<Snapshot>>, registry: Arc<ObserverRegistry>) -> Self {
        Self {
            prefix: None,
            current,
            registry,
        }
    }

    pub(crate) fn current(&self) -> &Arc<ArcSwap<Snapshot>> {
        &self.current
    }

    pub(crate) fn registry(&self) -> &Arc<ObserverRegistry> {
        &self.registry
    }

    /// The prefix of this scope, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    fn qualify(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.to_string(),
        }
    }

    /// A scope that prepends `prefix.` to every key. Scopes nest.
    pub fn subset(&self, prefix: &str) -> Scope {
        Scope {
            prefix: Some(self.qualify(prefix)),
            current: Arc::clone(&self.current),
            registry: Arc::clone(&self.registry),
        }
    }

    /// Handle for any reified type.
    pub fn get<T: Reify>(&self, key: &str) -> K<T> {
        K::new(
            self.qualify(key),
            T::kind(),
            Arc::clone(&self.current),
            Arc::clone(&self.registry),
            T::from_raw,
        )
    }

    /// Handle for a `bool`.
    pub fn bool(&self, key: &str) -> K<bool> {
        self.get(key)
    }

    /// Handle for a `char`.
    pub fn char_(&self, key: &str) -> K<char> {
        self.get(key)
    }

    /// Handle for a `String`.
    pub fn string(&self, key: &str) -> K<String> {
        self.get(key)
    }

    /// Handle for an `i8`.
    pub fn byte_(&self, key: &str) -> K<i8> {
        self.get(key)
    }

    /// Handle for an `i16`.
    pub fn short_(&self, key: &str) -> K<i16> {
        self.get(key)
    }

    /// Handle for an `i32`.
    pub fn int_(&self, key: &str) -> K<i32> {
        self.get(key)
    }

    /// Handle for an `i64`.
    pub fn long_(&self, key: &str) -> K<i64> {
        self.get(key)
    }

    /// Handle for an `f32`.
    pub fn float_(&self, key: &str) -> K<f32> {
        self.get(key)
    }

    /// Handle for an `f64`.
    pub fn double_(&self, key: &str) -> K<f64> {
        self.get(key)
    }

    /// Handle for a list of plain values.
    pub fn list<T: Plain>(&self, key: &str) -> K<Vec<T>> {
        self.get(key)
    }

    /// Handle for a set of plain values.
    pub fn set<T: Plain + Ord>(&self, key: &str) -> K<BTreeSet<T>> {
        self.get(key)
    }

    /// Handle for a string-keyed map of plain values.
    pub fn map<T: Plain>(&self, key: &str) -> K<BTreeMap<String, T>> {
        self.get(key)
    }

    /// Handle for a custom type decoded through serde.
    pub fn custom<T: DeserializeOwned>(&self, key: &str) -> K<T> {
        K::new(
            self.qualify(key),
            custom_kind::<T>(),
            Arc::clone(&self.current),
            Arc::clone(&self.registry),
            decode_custom::<T>,
        )
    }
}
