//! Dotted-path value tree shared by the bundled backends.

use crate::deserialize::Deserializer;
use crate::error::{ConfigError, Result};
use crate::value::RawValue;
use std::collections::BTreeMap;

/// A tree of raw values addressed by dotted keys.
///
/// A key is first looked up verbatim at the root (flat maps such as
/// `"db.host" -> ...`), then by walking nested maps one segment at a time.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct ValueTree {
    root: BTreeMap<String, RawValue>,
}

impl ValueTree {
    pub(crate) fn new(root: BTreeMap<String, RawValue>) -> Self {
        Self { root }
    }

    pub(crate) fn insert(&mut self, key: String, value: RawValue) {
        self.root.insert(key, value);
    }

    pub(crate) fn lookup(&self, key: &str) -> Option<&RawValue> {
        if let Some(value) = self.root.get(key) {
            return Some(value);
        }

        let mut segments = key.split('.');
        let mut current = self.root.get(segments.next()?)?;
        for segment in segments {
            match current {
                RawValue::Map(map) => current = map.get(segment)?,
                _ => return None,
            }
        }
        Some(current)
    }

    fn require(&self, key: &str) -> Result<&RawValue> {
        self.lookup(key).ok_or_else(|| ConfigError::missing(key))
    }

    pub(crate) fn is_null(&self, key: &str) -> bool {
        self.lookup(key).is_some_and(RawValue::is_null)
    }

    /// Every addressable value keyed by its full dotted path. A non-empty map
    /// is recorded under its own key and then descended into, so a change to
    /// `limits.cpu` also shows up as a change to `limits`.
    pub(crate) fn flatten(&self) -> BTreeMap<String, RawValue> {
        let mut out = BTreeMap::new();
        for (key, value) in &self.root {
            flatten_into(&mut out, key.clone(), value);
        }
        out
    }

    pub(crate) fn scalar(&self, key: &str) -> Result<RawValue> {
        self.require(key).cloned()
    }

    pub(crate) fn char(&self, key: &str) -> Result<RawValue> {
        let value = self.require(key)?;
        if let RawValue::String(s) = value {
            let mut chars = s.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Ok(RawValue::Char(c));
            }
        }
        Ok(value.clone())
    }

    pub(crate) fn list(&self, key: &str, text: &dyn Deserializer) -> Result<RawValue> {
        match self.require(key)? {
            RawValue::Set(items) => Ok(RawValue::List(items.clone())),
            RawValue::String(s) => text.list(key, s),
            other => Ok(other.clone()),
        }
    }

    pub(crate) fn set(&self, key: &str, text: &dyn Deserializer) -> Result<RawValue> {
        match self.require(key)? {
            RawValue::List(items) => Ok(RawValue::set_of(items.iter().cloned())),
            RawValue::String(s) => text.set(key, s),
            other => Ok(other.clone()),
        }
    }

    pub(crate) fn map(&self, key: &str, text: &dyn Deserializer) -> Result<RawValue> {
        match self.require(key)? {
            RawValue::String(s) => text.map(key, s),
            other => Ok(other.clone()),
        }
    }

    /// Custom values held as text are parsed; text that does not parse is
    /// passed through verbatim so plain-string custom types still decode.
    pub(crate) fn custom(&self, key: &str, text: &dyn Deserializer) -> Result<RawValue> {
        match self.require(key)? {
            RawValue::String(s) => match text.custom(key, s) {
                Ok(parsed) => Ok(parsed),
                Err(ConfigError::ParseError(_)) => Ok(RawValue::String(s.clone())),
                Err(e) => Err(e),
            },
            other => Ok(other.clone()),
        }
    }
}

fn flatten_into(out: &mut BTreeMap<String, RawValue>, prefix: String, value: &RawValue) {
    match value {
        RawValue::Map(map) if !map.is_empty() => {
            for (key, child) in map {
                flatten_into(out, format!("{}.{}", prefix, key), child);
            }
            out.insert(prefix, value.clone());
        }
        leaf => {
            out.insert(prefix, leaf.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deserialize::JsonDeserializer;
    use serde_json::json;

    fn tree() -> ValueTree {
        let RawValue::Map(root) = RawValue::from(json!({
            "db": { "host": "localhost", "port": 5432 },
            "tags": ["a", "b", "a"],
            "flat.key": true,
            "nothing": null
        })) else {
            unreachable!()
        };
        ValueTree::new(root)
    }

    #[test]
    fn test_lookup_nested_and_flat() {
        let tree = tree();
        assert_eq!(tree.lookup("db.host"), Some(&RawValue::from("localhost")));
        assert_eq!(tree.lookup("flat.key"), Some(&RawValue::Bool(true)));
        assert!(matches!(tree.lookup("db"), Some(RawValue::Map(_))));
        assert_eq!(tree.lookup("db.user"), None);
        assert_eq!(tree.lookup("tags.0"), None);
    }

    #[test]
    fn test_null() {
        let tree = tree();
        assert!(tree.is_null("nothing"));
        assert!(!tree.is_null("db.host"));
        assert!(!tree.is_null("missing"));
    }

    #[test]
    fn test_flatten() {
        let flat = tree().flatten();
        assert_eq!(flat.get("db.port"), Some(&RawValue::Integral(5432)));
        assert!(flat.contains_key("tags"));
        // Tables are addressable as a whole
        assert!(matches!(flat.get("db"), Some(RawValue::Map(map)) if map.len() == 2));
        assert_eq!(flat.get("flat.key"), Some(&RawValue::Bool(true)));
    }

    #[test]
    fn test_set_from_list() {
        let set = tree().set("tags", &JsonDeserializer).unwrap();
        assert_eq!(set, RawValue::Set(vec![RawValue::from("a"), RawValue::from("b")]));
    }

    #[test]
    fn test_char_from_single_char_string() {
        let mut tree = ValueTree::default();
        tree.insert("c".to_string(), RawValue::from("z"));
        tree.insert("s".to_string(), RawValue::from("zz"));
        assert_eq!(tree.char("c").unwrap(), RawValue::Char('z'));
        assert_eq!(tree.char("s").unwrap(), RawValue::from("zz"));
    }

    #[test]
    fn test_custom_plain_text_passthrough() {
        let mut tree = ValueTree::default();
        tree.insert("mode".to_string(), RawValue::from("Fast"));
        assert_eq!(
            tree.custom("mode", &JsonDeserializer).unwrap(),
            RawValue::from("Fast")
        );
    }
}
