//! Backend-neutral raw values.
//!
//! Sources answer lookups with a [`RawValue`]; the core type-checks and
//! narrows it against the requested [`Kind`](crate::kind::Kind) before it is
//! converted into a Rust value.

use crate::error::{ConfigError, Result};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::fmt;

/// A raw configuration value as produced by a backend.
///
/// Integral values are kept in an `i128` so that every `i64` and `u64` a
/// backend can produce survives until the range check at request time.
/// `Float` and `Double` are kept apart because they satisfy different requests.
///
/// Equality is structural, with two exceptions: sets compare without regard
/// to order, and floating values compare by bit pattern so that a `NaN`
/// equals itself.
#[derive(Debug, Clone)]
pub enum RawValue {
    /// Explicit null
    Null,
    /// Boolean value
    Bool(bool),
    /// Single character
    Char(char),
    /// Text
    String(String),
    /// Any integral number
    Integral(i128),
    /// Single-precision floating number
    Float(f32),
    /// Double-precision floating number
    Double(f64),
    /// Ordered sequence
    List(Vec<RawValue>),
    /// Set of distinct values; iteration keeps insertion order
    Set(Vec<RawValue>),
    /// String-keyed table
    Map(BTreeMap<String, RawValue>),
}

impl PartialEq for RawValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Char(a), Self::Char(b)) => a == b,
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Integral(a), Self::Integral(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Double(a), Self::Double(b)) => a.to_bits() == b.to_bits(),
            (Self::List(a), Self::List(b)) => a == b,
            (Self::Set(a), Self::Set(b)) => {
                a.len() == b.len()
                    && a.iter().all(|item| b.contains(item))
                    && b.iter().all(|item| a.contains(item))
            }
            (Self::Map(a), Self::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl RawValue {
    /// Short name of the value's shape, used in error messages.
    pub fn shape(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Char(_) => "char",
            Self::String(_) => "string",
            Self::Integral(_) => "integral",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::List(_) => "list",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
        }
    }

    /// Returns true if this is `RawValue::Null`.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Build a set, dropping duplicates while keeping first occurrences.
    pub fn set_of(items: impl IntoIterator<Item = RawValue>) -> Self {
        let mut out: Vec<RawValue> = Vec::new();
        for item in items {
            if !out.contains(&item) {
                out.push(item);
            }
        }
        Self::Set(out)
    }

    /// Convert into a JSON tree, used to decode custom types through serde.
    pub fn to_json(&self) -> Result<JsonValue> {
        Ok(match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Char(c) => JsonValue::String(c.to_string()),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Integral(i) => {
                if let Ok(v) = i64::try_from(*i) {
                    JsonValue::from(v)
                } else if let Ok(v) = u64::try_from(*i) {
                    JsonValue::from(v)
                } else {
                    return Err(ConfigError::Other(format!(
                        "Integral {} does not fit a JSON number",
                        i
                    )));
                }
            }
            Self::Float(f) => float_to_json(f64::from(*f))?,
            Self::Double(d) => float_to_json(*d)?,
            Self::List(items) | Self::Set(items) => JsonValue::Array(
                items
                    .iter()
                    .map(RawValue::to_json)
                    .collect::<Result<Vec<_>>>()?,
            ),
            Self::Map(map) => {
                let mut out = serde_json::Map::new();
                for (k, v) in map {
                    out.insert(k.clone(), v.to_json()?);
                }
                JsonValue::Object(out)
            }
        })
    }
}

fn float_to_json(value: f64) -> Result<JsonValue> {
    serde_json::Number::from_f64(value)
        .map(JsonValue::Number)
        .ok_or_else(|| ConfigError::Other(format!("Non-finite number {} has no JSON form", value)))
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Bool(b) => write!(f, "bool({})", b),
            Self::Char(c) => write!(f, "char({:?})", c),
            Self::String(s) => write!(f, "string({:?})", s),
            Self::Integral(i) => write!(f, "integral({})", i),
            Self::Float(v) => write!(f, "float({})", v),
            Self::Double(v) => write!(f, "double({})", v),
            Self::List(items) => write!(f, "list[{}]", items.len()),
            Self::Set(items) => write!(f, "set[{}]", items.len()),
            Self::Map(map) => write!(f, "map[{}]", map.len()),
        }
    }
}

impl From<JsonValue> for RawValue {
    fn from(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Integral(i128::from(i))
                } else if let Some(u) = n.as_u64() {
                    Self::Integral(i128::from(u))
                } else {
                    Self::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::List(items.into_iter().map(RawValue::from).collect()),
            JsonValue::Object(map) => Self::Map(
                map.into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<config::Value> for RawValue {
    fn from(value: config::Value) -> Self {
        match value.kind {
            config::ValueKind::Nil => Self::Null,
            config::ValueKind::Boolean(b) => Self::Bool(b),
            config::ValueKind::I64(i) => Self::Integral(i128::from(i)),
            config::ValueKind::I128(i) => Self::Integral(i),
            config::ValueKind::U64(u) => Self::Integral(i128::from(u)),
            config::ValueKind::U128(u) => match i128::try_from(u) {
                Ok(i) => Self::Integral(i),
                Err(_) => Self::Double(u as f64),
            },
            config::ValueKind::Float(f) => Self::Double(f),
            config::ValueKind::String(s) => Self::String(s),
            config::ValueKind::Array(items) => {
                Self::List(items.into_iter().map(RawValue::from).collect())
            }
            config::ValueKind::Table(table) => Self::Map(
                table
                    .into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
        }
    }
}

macro_rules! raw_from_integral {
    ($($t:ty),*) => {
        $(
            impl From<$t> for RawValue {
                fn from(value: $t) -> Self {
                    Self::Integral(i128::from(value))
                }
            }
        )*
    };
}

raw_from_integral!(i8, i16, i32, i64, u8, u16, u32, u64);

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<char> for RawValue {
    fn from(value: char) -> Self {
        Self::Char(value)
    }
}

impl From<f32> for RawValue {
    fn from(value: f32) -> Self {
        Self::Float(value)
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl<T: Into<RawValue>> From<Vec<T>> for RawValue {
    fn from(items: Vec<T>) -> Self {
        Self::List(items.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_numbers() {
        assert_eq!(RawValue::from(json!(12)), RawValue::Integral(12));
        assert_eq!(
            RawValue::from(json!(u64::MAX)),
            RawValue::Integral(i128::from(u64::MAX))
        );
        assert_eq!(RawValue::from(json!(1.5)), RawValue::Double(1.5));
    }

    #[test]
    fn test_json_tree_conversion() {
        let raw = RawValue::from(json!({ "host": "localhost", "ports": [80, 443] }));
        let mut expected = BTreeMap::new();
        expected.insert("host".to_string(), RawValue::from("localhost"));
        expected.insert("ports".to_string(), RawValue::from(vec![80i64, 443]));
        assert_eq!(raw, RawValue::Map(expected));

        let back = raw.to_json().unwrap();
        assert_eq!(back, json!({ "host": "localhost", "ports": [80, 443] }));
    }

    #[test]
    fn test_set_of_dedups() {
        let set = RawValue::set_of(vec![RawValue::from(1i32), RawValue::from(2i32), RawValue::from(1i32)]);
        assert_eq!(set, RawValue::Set(vec![RawValue::Integral(1), RawValue::Integral(2)]));
    }

    #[test]
    fn test_set_equality_ignores_order() {
        let ab = RawValue::set_of(["a".into(), "b".into()]);
        let ba = RawValue::set_of(["b".into(), "a".into()]);
        assert_eq!(ab, ba);
        assert_ne!(ab, RawValue::set_of(["a".into(), "c".into()]));
        assert_ne!(ab, RawValue::set_of(["a".into()]));

        // Lists stay order-sensitive
        let list = RawValue::List(vec!["a".into(), "b".into()]);
        assert_ne!(list, RawValue::List(vec!["b".into(), "a".into()]));
        assert_ne!(list, ab);
    }

    #[test]
    fn test_nan_equals_itself() {
        assert_eq!(RawValue::Double(f64::NAN), RawValue::Double(f64::NAN));
        assert_eq!(RawValue::Float(f32::NAN), RawValue::Float(f32::NAN));
        assert_ne!(RawValue::Double(1.0), RawValue::Float(1.0));
        assert_eq!(
            RawValue::List(vec![RawValue::Double(f64::NAN)]),
            RawValue::List(vec![RawValue::Double(f64::NAN)])
        );
    }

    #[test]
    fn test_from_config_value() {
        let value = config::Value::new(None, config::ValueKind::Float(2.5));
        assert_eq!(RawValue::from(value), RawValue::Double(2.5));

        let value = config::Value::new(None, config::ValueKind::I64(-3));
        assert_eq!(RawValue::from(value), RawValue::Integral(-3));
    }

    #[test]
    fn test_non_finite_has_no_json() {
        assert!(RawValue::Double(f64::INFINITY).to_json().is_err());
    }
}
