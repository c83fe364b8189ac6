//! Reified type descriptors.
//!
//! A [`Kind`] is a plain data witness for the type a caller expects a key to
//! hold: a raw kind tag plus up to two plain parameters (element type for
//! lists and sets, key and value type for maps). It is supplied explicitly by
//! the caller, usually through the [`Reify`] trait, and can be compared and
//! hashed without any runtime introspection.
//!
//! # Examples
//!
//! ```rust
//! use hotswap_konfig::kind::{Kind, RawKind};
//!
//! let kind = Kind::of::<Vec<i32>>();
//! assert!(kind.is_list());
//! assert_eq!(kind.collection_element_type().unwrap(), RawKind::Int);
//! assert!(kind.map_key_type().is_err());
//! ```

use crate::error::{ConfigError, Result};
use crate::value::RawValue;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// The raw kind tag of a descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RawKind {
    /// `bool`
    Bool,
    /// `char`
    Char,
    /// `String`
    String,
    /// `i8`
    Byte,
    /// `i16`
    Short,
    /// `i32`
    Int,
    /// `i64`
    Long,
    /// `f32`
    Float,
    /// `f64`
    Double,
    /// Ordered sequence
    List,
    /// Set of distinct values
    Set,
    /// String-keyed map
    Map,
    /// A user type decoded through serde, tagged with its name
    Custom(&'static str),
}

impl RawKind {
    /// Returns true for the integral kinds.
    pub fn is_integral(self) -> bool {
        matches!(self, Self::Byte | Self::Short | Self::Int | Self::Long)
    }

    /// Returns true for the floating kinds.
    pub fn is_floating(self) -> bool {
        matches!(self, Self::Float | Self::Double)
    }

    /// Inclusive range representable by an integral kind.
    pub fn integral_range(self) -> Option<(i128, i128)> {
        match self {
            Self::Byte => Some((i128::from(i8::MIN), i128::from(i8::MAX))),
            Self::Short => Some((i128::from(i16::MIN), i128::from(i16::MAX))),
            Self::Int => Some((i128::from(i32::MIN), i128::from(i32::MAX))),
            Self::Long => Some((i128::from(i64::MIN), i128::from(i64::MAX))),
            _ => None,
        }
    }
}

impl fmt::Display for RawKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(name) => write!(f, "{}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Descriptor of a target type, optionally bound to a configuration key.
///
/// Only plain kinds and containers parametrized by plain kinds can be
/// represented; parameters are themselves [`RawKind`]s, so nesting is
/// impossible by construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Kind {
    key: Option<String>,
    raw: RawKind,
    params: Vec<RawKind>,
}

impl Kind {
    /// Descriptor for a reified Rust type.
    pub fn of<T: Reify>() -> Self {
        T::kind()
    }

    /// Descriptor for a plain kind.
    pub fn plain(raw: RawKind) -> Self {
        Self {
            key: None,
            raw,
            params: Vec::new(),
        }
    }

    /// Descriptor for a list of `element`.
    pub fn list_of(element: RawKind) -> Self {
        Self {
            key: None,
            raw: RawKind::List,
            params: vec![element],
        }
    }

    /// Descriptor for a set of `element`.
    pub fn set_of(element: RawKind) -> Self {
        Self {
            key: None,
            raw: RawKind::Set,
            params: vec![element],
        }
    }

    /// Descriptor for a map from `key` to `value`.
    pub fn map_of(key: RawKind, value: RawKind) -> Self {
        Self {
            key: None,
            raw: RawKind::Map,
            params: vec![key, value],
        }
    }

    /// Descriptor for a custom type decoded through serde.
    pub fn custom(name: &'static str) -> Self {
        Self::plain(RawKind::Custom(name))
    }

    /// The raw kind tag.
    pub fn raw(&self) -> RawKind {
        self.raw
    }

    /// The type parameters, in declaration order.
    pub fn params(&self) -> &[RawKind] {
        &self.params
    }

    /// The configuration key this descriptor is bound to, if any.
    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// An equivalent descriptor bound to `key`.
    pub fn with_key(&self, key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            raw: self.raw,
            params: self.params.clone(),
        }
    }

    /// A list descriptor whose element is this descriptor's raw kind.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if this descriptor is itself parametrized.
    pub fn as_list(&self) -> Result<Self> {
        self.require_plain("as_list")?;
        Ok(Self::list_of(self.raw))
    }

    /// A set descriptor whose element is this descriptor's raw kind.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if this descriptor is itself parametrized.
    pub fn as_set(&self) -> Result<Self> {
        self.require_plain("as_set")?;
        Ok(Self::set_of(self.raw))
    }

    fn require_plain(&self, op: &str) -> Result<()> {
        if self.params.is_empty() && !matches!(self.raw, RawKind::List | RawKind::Set | RawKind::Map) {
            Ok(())
        } else {
            Err(ConfigError::IllegalState(format!(
                "{} requires a plain descriptor, got {}",
                op, self
            )))
        }
    }

    /// Returns true for lists and sets.
    pub fn is_collection(&self) -> bool {
        self.is_list() || self.is_set()
    }

    /// Returns true for lists.
    pub fn is_list(&self) -> bool {
        self.raw == RawKind::List
    }

    /// Returns true for sets.
    pub fn is_set(&self) -> bool {
        self.raw == RawKind::Set
    }

    /// Returns true for maps.
    pub fn is_map(&self) -> bool {
        self.raw == RawKind::Map
    }

    /// Returns true for integral kinds.
    pub fn is_integral(&self) -> bool {
        self.raw.is_integral()
    }

    /// Returns true for floating kinds.
    pub fn is_floating(&self) -> bool {
        self.raw.is_floating()
    }

    /// Element type of a parametrized list or set.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if this is not a parametrized collection.
    pub fn collection_element_type(&self) -> Result<RawKind> {
        match (self.is_collection(), self.params.as_slice()) {
            (true, [element]) => Ok(*element),
            _ => Err(self.not_a("parametrized collection")),
        }
    }

    /// Key type of a parametrized map.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if this is not a parametrized map.
    pub fn map_key_type(&self) -> Result<RawKind> {
        match (self.is_map(), self.params.as_slice()) {
            (true, [key, _]) => Ok(*key),
            _ => Err(self.not_a("parametrized map")),
        }
    }

    /// Value type of a parametrized map.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if this is not a parametrized map.
    pub fn map_value_type(&self) -> Result<RawKind> {
        match (self.is_map(), self.params.as_slice()) {
            (true, [_, value]) => Ok(*value),
            _ => Err(self.not_a("parametrized map")),
        }
    }

    fn not_a(&self, what: &str) -> ConfigError {
        ConfigError::IllegalState(format!("{} is not a {}", self, what))
    }

    /// Structural compatibility between this descriptor and a raw value.
    ///
    /// `Null` always matches. Otherwise the value's shape must be assignable to
    /// the raw kind; integral kinds additionally require the value to be in
    /// range. Container elements are not inspected.
    pub fn matches_value(&self, value: &RawValue) -> bool {
        match (self.raw, value) {
            (_, RawValue::Null) => true,
            (RawKind::Bool, RawValue::Bool(_)) => true,
            (RawKind::Char, RawValue::Char(_)) => true,
            (RawKind::String, RawValue::String(_)) => true,
            (raw, RawValue::Integral(i)) if raw.is_integral() => raw
                .integral_range()
                .is_some_and(|(min, max)| (min..=max).contains(i)),
            (RawKind::Float, RawValue::Float(_)) => true,
            (RawKind::Double, RawValue::Double(_)) => true,
            (RawKind::List, RawValue::List(_)) => true,
            (RawKind::Set, RawValue::Set(_)) => true,
            (RawKind::Map, RawValue::Map(_)) => true,
            (RawKind::Custom(_), _) => true,
            _ => false,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.raw)?;
        if !self.params.is_empty() {
            let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
            write!(f, "<{}>", params.join(", "))?;
        }
        if let Some(key) = &self.key {
            write!(f, " @ '{}'", key)?;
        }
        Ok(())
    }
}

/// A Rust type that can be described by a [`Kind`] and built from a checked
/// [`RawValue`].
///
/// `from_raw` receives values that already passed the type and range check
/// for [`Reify::kind`]; it still rejects anything it cannot convert.
pub trait Reify: Sized {
    /// The descriptor for this type.
    fn kind() -> Kind;

    /// Convert a checked raw value.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the value cannot be represented.
    fn from_raw(key: &str, raw: RawValue) -> Result<Self>;
}

/// A type that may appear as a container parameter.
pub trait Plain: Reify {
    /// The raw kind of this type.
    fn raw() -> RawKind;
}

fn mismatch<T>(key: &str, expected: RawKind, raw: &RawValue) -> Result<T> {
    Err(ConfigError::mismatch(key, expected.to_string(), raw.to_string()))
}

macro_rules! reify_plain {
    ($t:ty, $raw:expr, |$key:ident, $value:ident| $convert:expr) => {
        impl Reify for $t {
            fn kind() -> Kind {
                Kind::plain($raw)
            }

            fn from_raw($key: &str, $value: RawValue) -> Result<Self> {
                $convert
            }
        }

        impl Plain for $t {
            fn raw() -> RawKind {
                $raw
            }
        }
    };
}

macro_rules! reify_integral {
    ($t:ty, $raw:expr) => {
        reify_plain!($t, $raw, |key, raw| match raw {
            RawValue::Integral(i) => <$t>::try_from(i).or_else(|_| mismatch(key, $raw, &raw)),
            other => mismatch(key, $raw, &other),
        });
    };
}

reify_plain!(bool, RawKind::Bool, |key, raw| match raw {
    RawValue::Bool(b) => Ok(b),
    other => mismatch(key, RawKind::Bool, &other),
});

reify_plain!(char, RawKind::Char, |key, raw| match raw {
    RawValue::Char(c) => Ok(c),
    other => mismatch(key, RawKind::Char, &other),
});

reify_plain!(String, RawKind::String, |key, raw| match raw {
    RawValue::String(s) => Ok(s),
    other => mismatch(key, RawKind::String, &other),
});

reify_integral!(i8, RawKind::Byte);
reify_integral!(i16, RawKind::Short);
reify_integral!(i32, RawKind::Int);
reify_integral!(i64, RawKind::Long);

reify_plain!(f32, RawKind::Float, |key, raw| match raw {
    RawValue::Float(f) => Ok(f),
    other => mismatch(key, RawKind::Float, &other),
});

reify_plain!(f64, RawKind::Double, |key, raw| match raw {
    RawValue::Double(d) => Ok(d),
    other => mismatch(key, RawKind::Double, &other),
});

/// Check and convert every element of a container against `T`.
fn elements<T: Plain>(key: &str, items: Vec<RawValue>) -> Result<Vec<T>> {
    let element = Kind::plain(T::raw());
    items
        .into_iter()
        .map(|item| T::from_raw(key, crate::sources::check(key, &element, item)?))
        .collect()
}

fn entries<T: Plain>(key: &str, map: BTreeMap<String, RawValue>) -> Result<Vec<(String, T)>> {
    let value_kind = Kind::plain(T::raw());
    map.into_iter()
        .map(|(k, v)| {
            let checked = crate::sources::check(key, &value_kind, v)?;
            Ok((k, T::from_raw(key, checked)?))
        })
        .collect()
}

impl<T: Plain> Reify for Vec<T> {
    fn kind() -> Kind {
        Kind::list_of(T::raw())
    }

    fn from_raw(key: &str, raw: RawValue) -> Result<Self> {
        match raw {
            RawValue::List(items) => elements(key, items),
            other => mismatch(key, RawKind::List, &other),
        }
    }
}

impl<T: Plain + Ord> Reify for BTreeSet<T> {
    fn kind() -> Kind {
        Kind::set_of(T::raw())
    }

    fn from_raw(key: &str, raw: RawValue) -> Result<Self> {
        match raw {
            RawValue::Set(items) => Ok(elements(key, items)?.into_iter().collect()),
            other => mismatch(key, RawKind::Set, &other),
        }
    }
}

impl<T: Plain + Hash + Eq> Reify for HashSet<T> {
    fn kind() -> Kind {
        Kind::set_of(T::raw())
    }

    fn from_raw(key: &str, raw: RawValue) -> Result<Self> {
        match raw {
            RawValue::Set(items) => Ok(elements(key, items)?.into_iter().collect()),
            other => mismatch(key, RawKind::Set, &other),
        }
    }
}

impl<T: Plain> Reify for BTreeMap<String, T> {
    fn kind() -> Kind {
        Kind::map_of(RawKind::String, T::raw())
    }

    fn from_raw(key: &str, raw: RawValue) -> Result<Self> {
        match raw {
            RawValue::Map(map) => Ok(entries(key, map)?.into_iter().collect()),
            other => mismatch(key, RawKind::Map, &other),
        }
    }
}

impl<T: Plain> Reify for HashMap<String, T> {
    fn kind() -> Kind {
        Kind::map_of(RawKind::String, T::raw())
    }

    fn from_raw(key: &str, raw: RawValue) -> Result<Self> {
        match raw {
            RawValue::Map(map) => Ok(entries(key, map)?.into_iter().collect()),
            other => mismatch(key, RawKind::Map, &other),
        }
    }
}

/// Nullable values: `Null` becomes `None`, anything else is converted by `T`.
impl<T: Reify> Reify for Option<T> {
    fn kind() -> Kind {
        T::kind()
    }

    fn from_raw(key: &str, raw: RawValue) -> Result<Self> {
        match raw {
            RawValue::Null => Ok(None),
            other => T::from_raw(key, other).map(Some),
        }
    }
}
