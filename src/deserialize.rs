//! Text deserializers for container and custom values.
//!
//! Backends that store structured values as text (JSON or YAML snippets in a
//! flat map, for instance) hand that text to a [`Deserializer`] when a list,
//! set, map or custom type is requested.

use crate::error::{ConfigError, Result};
use crate::value::RawValue;
use serde_json::Value as JsonValue;

/// Parses configuration text into a raw value tree.
pub trait Deserializer: Send + Sync {
    /// Name of the format, for error messages.
    fn name(&self) -> &'static str;

    /// Parse text into a JSON tree.
    ///
    /// # Errors
    ///
    /// `ParseError` on malformed text, `SourceUnavailable` if the format is
    /// not compiled in.
    fn parse(&self, text: &str) -> Result<JsonValue>;

    /// Parse a custom value of any shape.
    fn custom(&self, _key: &str, text: &str) -> Result<RawValue> {
        Ok(RawValue::from(self.parse(text)?))
    }

    /// Parse a list; the root node must be an array.
    fn list(&self, key: &str, text: &str) -> Result<RawValue> {
        match self.parse(text)? {
            JsonValue::Array(items) => Ok(RawValue::List(
                items.into_iter().map(RawValue::from).collect(),
            )),
            other => Err(root_mismatch(key, "list", &other)),
        }
    }

    /// Parse a set; the root node must be an array. Duplicates are dropped.
    fn set(&self, key: &str, text: &str) -> Result<RawValue> {
        match self.parse(text)? {
            JsonValue::Array(items) => Ok(RawValue::set_of(items.into_iter().map(RawValue::from))),
            other => Err(root_mismatch(key, "set", &other)),
        }
    }

    /// Parse a string-keyed map; the root node must be an object.
    fn map(&self, key: &str, text: &str) -> Result<RawValue> {
        match self.parse(text)? {
            object @ JsonValue::Object(_) => Ok(RawValue::from(object)),
            other => Err(root_mismatch(key, "map", &other)),
        }
    }
}

fn root_mismatch(key: &str, expected: &str, found: &JsonValue) -> ConfigError {
    let shape = match found {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "bool",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    };
    ConfigError::mismatch(key, expected, format!("{} root node", shape))
}

/// JSON text deserializer.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDeserializer;

impl Deserializer for JsonDeserializer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn parse(&self, text: &str) -> Result<JsonValue> {
        serde_json::from_str(text)
            .map_err(|e| ConfigError::ParseError(format!("Invalid JSON: {}", e)))
    }
}

/// YAML text deserializer.
///
/// Requires the `yaml` feature; without it every parse fails with
/// `SourceUnavailable`.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlDeserializer;

impl Deserializer for YamlDeserializer {
    fn name(&self) -> &'static str {
        "yaml"
    }

    #[cfg(feature = "yaml")]
    fn parse(&self, text: &str) -> Result<JsonValue> {
        serde_yaml::from_str(text)
            .map_err(|e| ConfigError::ParseError(format!("Invalid YAML: {}", e)))
    }

    #[cfg(not(feature = "yaml"))]
    fn parse(&self, _text: &str) -> Result<JsonValue> {
        Err(ConfigError::SourceUnavailable {
            source_name: self.name().to_string(),
            reason: "YAML support requires the 'yaml' feature".to_string(),
        })
    }
}
