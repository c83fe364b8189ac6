//! Immutable point-in-time views over an ordered list of sources.

use crate::error::{ConfigError, Result};
use crate::kind::Kind;
use crate::sources::{Source, fetch};
use crate::value::RawValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// An immutable, fully merged view over one or more sources.
///
/// Sources are kept in priority order: the first source that holds a key
/// supplies its value. A snapshot also caches the flat merged key→value map,
/// which is only used to diff one snapshot against the next; type checks stay
/// lazy and happen on every [`resolve`](Snapshot::resolve).
pub struct Snapshot {
    sources: Vec<Arc<dyn Source>>,
    values: BTreeMap<String, RawValue>,
}

impl Snapshot {
    /// Build a snapshot from sources in priority order (highest first).
    ///
    /// # Errors
    ///
    /// Returns `SourceUnavailable` if any source fails to list its entries.
    pub fn build(sources: Vec<Arc<dyn Source>>) -> Result<Self> {
        let mut values = BTreeMap::new();

        for source in &sources {
            let entries = source.entries().map_err(|e| match e {
                e @ ConfigError::SourceUnavailable { .. } => e,
                other => ConfigError::SourceUnavailable {
                    source_name: source.name(),
                    reason: other.to_string(),
                },
            })?;

            // Earlier sources win, so never overwrite
            for (key, value) in entries {
                values.entry(key).or_insert(value);
            }
        }

        Ok(Self { sources, values })
    }

    /// A snapshot with no sources; every lookup is missing.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            values: BTreeMap::new(),
        }
    }

    /// Resolve `key` as `kind` against the first source that holds it.
    ///
    /// # Errors
    ///
    /// `MissingKey` if no source holds the key; otherwise whatever the owning
    /// source's fetch reports (`TypeMismatch`, `Backend`).
    pub fn resolve(&self, key: &str, kind: &Kind) -> Result<RawValue> {
        match self.sources.iter().find(|source| source.has(key, kind)) {
            Some(source) => fetch(source.as_ref(), key, kind),
            None => Err(ConfigError::missing(key)),
        }
    }

    /// Whether any source holds `key`.
    pub fn contains(&self, key: &str, kind: &Kind) -> bool {
        self.sources.iter().any(|source| source.has(key, kind))
    }

    /// The sources in priority order.
    pub fn sources(&self) -> &[Arc<dyn Source>] {
        &self.sources
    }

    /// Get the list of source names in priority order.
    pub fn source_names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name()).collect()
    }

    /// The merged flat key→value map.
    pub fn values(&self) -> &BTreeMap<String, RawValue> {
        &self.values
    }

    /// Keys whose merged value differs between `self` and `newer`, including
    /// keys present in only one of them. Values are compared structurally.
    /// The result is sorted.
    pub fn diff(&self, newer: &Snapshot) -> Vec<String> {
        let mut changed: Vec<String> = self
            .values
            .iter()
            .filter(|(key, value)| newer.values.get(*key) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect();

        changed.extend(
            newer
                .values
                .keys()
                .filter(|key| !self.values.contains_key(*key))
                .cloned(),
        );
        changed.sort();
        changed
    }

    /// A view that prepends `prefix.` to every key.
    pub fn subset(self: &Arc<Self>, prefix: &str) -> Subset {
        Subset {
            snapshot: Arc::clone(self),
            prefix: prefix.to_string(),
        }
    }
}

impl std::fmt::Debug for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Snapshot")
            .field("sources", &self.source_names())
            .field("keys", &self.values.len())
            .finish()
    }
}

/// A prefixed view over a [`Snapshot`]; no data is copied.
#[derive(Debug, Clone)]
pub struct Subset {
    snapshot: Arc<Snapshot>,
    prefix: String,
}

impl Subset {
    /// The fully qualified key for `key`.
    pub fn qualify(&self, key: &str) -> String {
        format!("{}.{}", self.prefix, key)
    }

    /// Resolve `prefix.key` as `kind`.
    ///
    /// # Errors
    ///
    /// Same as [`Snapshot::resolve`].
    pub fn resolve(&self, key: &str, kind: &Kind) -> Result<RawValue> {
        self.snapshot.resolve(&self.qualify(key), kind)
    }

    /// Whether any source holds `prefix.key`.
    pub fn contains(&self, key: &str, kind: &Kind) -> bool {
        self.snapshot.contains(&self.qualify(key), kind)
    }

    /// A nested view.
    pub fn subset(&self, prefix: &str) -> Subset {
        Subset {
            snapshot: Arc::clone(&self.snapshot),
            prefix: self.qualify(prefix),
        }
    }
}
