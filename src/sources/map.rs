//! In-memory map-based configuration source.

use super::tree::ValueTree;
use super::Source;
use crate::deserialize::{Deserializer, JsonDeserializer};
use crate::error::Result;
use crate::value::RawValue;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Mutable, versioned backing store for [`MapSource`].
///
/// Every mutation bumps the version; sources built from the backing report
/// an update once the version moves past the one they copied.
#[derive(Debug, Default)]
pub struct MapBacking {
    state: RwLock<(u64, BTreeMap<String, RawValue>)>,
}

impl MapBacking {
    /// Create an empty backing map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, replacing any previous value for `key`.
    pub fn set(&self, key: impl Into<String>, value: impl Into<RawValue>) {
        let mut state = self.state.write();
        state.1.insert(key.into(), value.into());
        state.0 += 1;
    }

    /// Remove a key. Returns the previous value, if any.
    pub fn remove(&self, key: &str) -> Option<RawValue> {
        let mut state = self.state.write();
        let previous = state.1.remove(key);
        if previous.is_some() {
            state.0 += 1;
        }
        previous
    }

    /// Current version.
    pub fn version(&self) -> u64 {
        self.state.read().0
    }

    fn snapshot(&self) -> (u64, BTreeMap<String, RawValue>) {
        let state = self.state.read();
        (state.0, state.1.clone())
    }
}

/// Map-based configuration source.
///
/// Either static (built with [`MapSource::new`] and [`MapSource::with_value`])
/// or backed by a shared [`MapBacking`] whose changes are picked up through
/// [`Source::updated_copy`]. String values are parsed by the configured
/// [`Deserializer`] (JSON by default) when a container or custom type is
/// requested.
///
/// # Examples
///
/// ```rust
/// use hotswap_konfig::sources::{MapBacking, MapSource, SourceExt};
/// use std::sync::Arc;
///
/// let backing = Arc::new(MapBacking::new());
/// backing.set("aInt", 12);
///
/// let source = MapSource::backed("defaults", Arc::clone(&backing));
/// assert_eq!(source.int_("aInt").unwrap(), Some(12));
/// ```
#[derive(Clone)]
pub struct MapSource {
    name: String,
    tree: ValueTree,
    backing: Option<(Arc<MapBacking>, u64)>,
    deserializer: Arc<dyn Deserializer>,
}

impl MapSource {
    /// Create an empty static source.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tree: ValueTree::default(),
            backing: None,
            deserializer: Arc::new(JsonDeserializer),
        }
    }

    /// Create a static source from an existing map.
    pub fn from_map(name: impl Into<String>, values: BTreeMap<String, RawValue>) -> Self {
        Self {
            tree: ValueTree::new(values),
            ..Self::new(name)
        }
    }

    /// Create a source holding a copy of `backing`'s current contents.
    pub fn backed(name: impl Into<String>, backing: Arc<MapBacking>) -> Self {
        let (version, values) = backing.snapshot();
        Self {
            tree: ValueTree::new(values),
            backing: Some((backing, version)),
            ..Self::new(name)
        }
    }

    /// Add a value to a static source.
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<RawValue>) -> Self {
        self.tree.insert(key.into(), value.into());
        self
    }

    /// Use a different deserializer for text values.
    pub fn with_deserializer<D: Deserializer + 'static>(mut self, deserializer: D) -> Self {
        self.deserializer = Arc::new(deserializer);
        self
    }
}

impl Source for MapSource {
    fn name(&self) -> String {
        format!("map:{}", self.name)
    }

    super::tree_hooks!();

    fn has_update(&self) -> bool {
        self.backing
            .as_ref()
            .is_some_and(|(backing, version)| backing.version() != *version)
    }

    fn updated_copy(&self) -> Result<Arc<dyn Source>> {
        let copy = match &self.backing {
            Some((backing, _)) => Self {
                deserializer: Arc::clone(&self.deserializer),
                ..Self::backed(self.name.clone(), Arc::clone(backing))
            },
            None => self.clone(),
        };
        Ok(Arc::new(copy))
    }
}
