//! The source adapter contract and the typed fetch layered on top of it.

use crate::error::{ConfigError, Result};
use crate::kind::{Kind, Plain, RawKind, Reify};
use crate::notify::{KeyObserver, Subscription};
use crate::value::RawValue;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};

/// Trait for configuration backends.
///
/// A source only answers point lookups. Implementations return the raw value
/// they hold from the `*0` hooks; existence, null handling, type and range
/// checks are applied by [`fetch`] and the [`SourceExt`] accessors.
///
/// A source is immutable once constructed. [`Source::updated_copy`] builds a
/// new, independent source reflecting the current backend state and never
/// mutates the receiver.
///
/// Scoping and observer registration are not part of a raw source; they live
/// on [`Manager`](crate::core::Manager) and [`Scope`](crate::core::Scope). The
/// default implementations of those methods fail with `Assertion`.
pub trait Source: Send + Sync {
    /// Get a human-readable name for this source (for logging/debugging).
    fn name(&self) -> String;

    /// Whether this source holds `key`.
    fn has(&self, key: &str, kind: &Kind) -> bool;

    /// Whether `key` is held with an explicit null.
    fn is_null(&self, key: &str) -> bool;

    /// Raw value for a boolean request.
    fn bool0(&self, key: &str) -> Result<RawValue>;

    /// Raw value for a character request.
    fn char0(&self, key: &str) -> Result<RawValue>;

    /// Raw value for a string request.
    fn string0(&self, key: &str) -> Result<RawValue>;

    /// Raw value for an integral request.
    fn number0(&self, key: &str) -> Result<RawValue>;

    /// Raw value for a floating request.
    fn number_double0(&self, key: &str) -> Result<RawValue> {
        self.number0(key)
    }

    /// Raw value for a list request.
    fn list0(&self, key: &str, kind: &Kind) -> Result<RawValue>;

    /// Raw value for a set request.
    fn set0(&self, key: &str, kind: &Kind) -> Result<RawValue>;

    /// Raw value for a map request.
    fn map0(&self, key: &str, kind: &Kind) -> Result<RawValue>;

    /// Raw value for a custom type request.
    fn custom0(&self, key: &str, kind: &Kind) -> Result<RawValue>;

    /// Flat dump of every key this source currently answers, including keys
    /// whose value is a whole table.
    ///
    /// Used to build the merged view that snapshots diff against each other.
    fn entries(&self) -> Result<BTreeMap<String, RawValue>>;

    /// Whether the backend changed since this source was constructed.
    fn has_update(&self) -> bool {
        false
    }

    /// A new source reflecting the backend's current state.
    fn updated_copy(&self) -> Result<Arc<dyn Source>> {
        Err(ConfigError::Assertion(format!(
            "source '{}' does not support updates",
            self.name()
        )))
    }

    /// Not supported on a raw source.
    fn subset(&self, prefix: &str) -> Result<Arc<dyn Source>> {
        Err(ConfigError::Assertion(format!(
            "subset('{}') is not supported by raw source '{}'",
            prefix,
            self.name()
        )))
    }

    /// Not supported on a raw source.
    fn register(&self, key: &str, _observer: Weak<dyn KeyObserver>) -> Result<Subscription> {
        Err(ConfigError::Assertion(format!(
            "register('{}') is not supported by raw source '{}'",
            key,
            self.name()
        )))
    }

    /// Not supported on a raw source.
    fn register_soft(&self, key: &str, _observer: Weak<dyn KeyObserver>) -> Result<Subscription> {
        Err(ConfigError::Assertion(format!(
            "register_soft('{}') is not supported by raw source '{}'",
            key,
            self.name()
        )))
    }

    /// Not supported on a raw source.
    fn deregister(&self, _subscription: &Subscription) -> Result<()> {
        Err(ConfigError::Assertion(format!(
            "deregister is not supported by raw source '{}'",
            self.name()
        )))
    }
}

/// Fetch `key` from `source` as `kind`.
///
/// Fails with `MissingKey` if the source does not hold the key, returns
/// [`RawValue::Null`] for explicit nulls without any type check, and otherwise
/// dispatches to the matching hook and checks the result with [`check`].
///
/// # Errors
///
/// `MissingKey`, `TypeMismatch`, or `Backend` wrapping a hook failure.
pub fn fetch<S: Source + ?Sized>(source: &S, key: &str, kind: &Kind) -> Result<RawValue> {
    if !source.has(key, kind) {
        return Err(ConfigError::missing(key));
    }
    if source.is_null(key) {
        return Ok(RawValue::Null);
    }

    let raw = match kind.raw() {
        RawKind::Bool => source.bool0(key),
        RawKind::Char => source.char0(key),
        RawKind::String => source.string0(key),
        RawKind::Byte | RawKind::Short | RawKind::Int | RawKind::Long => source.number0(key),
        RawKind::Float | RawKind::Double => source.number_double0(key),
        RawKind::List => source.list0(key, kind),
        RawKind::Set => source.set0(key, kind),
        RawKind::Map => source.map0(key, kind),
        RawKind::Custom(_) => source.custom0(key, kind),
    }
    .map_err(|e| match e {
        e @ (ConfigError::MissingKey { .. }
        | ConfigError::TypeMismatch { .. }
        | ConfigError::Backend { .. }) => e,
        other => ConfigError::Backend {
            source_name: source.name(),
            key: key.to_string(),
            reason: other.to_string(),
        },
    })?;

    check(key, kind, raw)
}

/// Check a raw value against `kind`, narrowing numbers to the requested width.
///
/// - Integral requests accept only integral values within the target range;
///   a floating value never satisfies them, even when it is whole.
/// - `Float` accepts float, double and integral values. A finite double that
///   overflows `f32` is rejected.
/// - `Double` accepts double and integral values only.
/// - Everything else must satisfy [`Kind::matches_value`].
///
/// # Errors
///
/// Returns `TypeMismatch` when the value does not satisfy `kind`.
pub fn check(key: &str, kind: &Kind, raw: RawValue) -> Result<RawValue> {
    let reject = |raw: &RawValue| -> Result<RawValue> {
        Err(ConfigError::mismatch(key, kind.to_string(), raw.to_string()))
    };

    match (kind.raw(), raw) {
        (_, RawValue::Null) => Ok(RawValue::Null),
        (target, RawValue::Integral(i)) if target.is_integral() => {
            match target.integral_range() {
                Some((min, max)) if (min..=max).contains(&i) => Ok(RawValue::Integral(i)),
                _ => reject(&RawValue::Integral(i)),
            }
        }
        (RawKind::Float, RawValue::Float(f)) => Ok(RawValue::Float(f)),
        (RawKind::Float, RawValue::Double(d)) => {
            let narrowed = d as f32;
            if d.is_finite() && !narrowed.is_finite() {
                reject(&RawValue::Double(d))
            } else {
                Ok(RawValue::Float(narrowed))
            }
        }
        (RawKind::Float, RawValue::Integral(i)) => Ok(RawValue::Float(i as f32)),
        (RawKind::Double, RawValue::Double(d)) => Ok(RawValue::Double(d)),
        (RawKind::Double, RawValue::Integral(i)) => Ok(RawValue::Double(i as f64)),
        (target, raw) if target.is_integral() || target.is_floating() => reject(&raw),
        (_, raw) => {
            if kind.matches_value(&raw) {
                Ok(raw)
            } else {
                reject(&raw)
            }
        }
    }
}

/// Decode a checked raw value into a serde type.
///
/// # Errors
///
/// Returns `TypeMismatch` if the value does not deserialize into `T`.
pub fn decode_custom<T: DeserializeOwned>(key: &str, raw: RawValue) -> Result<T> {
    let json = raw.to_json()?;
    serde_json::from_value(json)
        .map_err(|e| ConfigError::mismatch(key, std::any::type_name::<T>(), e.to_string()))
}

/// Descriptor used for custom serde types.
pub fn custom_kind<T>() -> Kind {
    Kind::custom(std::any::type_name::<T>())
}

/// Typed accessors available on every [`Source`].
///
/// Each accessor returns `Ok(None)` when the key holds an explicit null.
pub trait SourceExt: Source {
    /// Fetch `key` as any reified type.
    fn get<T: Reify>(&self, key: &str) -> Result<Option<T>> {
        let kind = T::kind().with_key(key);
        match fetch(self, key, &kind)? {
            RawValue::Null => Ok(None),
            raw => T::from_raw(key, raw).map(Some),
        }
    }

    /// Fetch a `bool`.
    fn bool(&self, key: &str) -> Result<Option<bool>> {
        self.get(key)
    }

    /// Fetch a `char`.
    fn char_(&self, key: &str) -> Result<Option<char>> {
        self.get(key)
    }

    /// Fetch a `String`.
    fn string(&self, key: &str) -> Result<Option<String>> {
        self.get(key)
    }

    /// Fetch an `i8`.
    fn byte_(&self, key: &str) -> Result<Option<i8>> {
        self.get(key)
    }

    /// Fetch an `i16`.
    fn short_(&self, key: &str) -> Result<Option<i16>> {
        self.get(key)
    }

    /// Fetch an `i32`.
    fn int_(&self, key: &str) -> Result<Option<i32>> {
        self.get(key)
    }

    /// Fetch an `i64`.
    fn long_(&self, key: &str) -> Result<Option<i64>> {
        self.get(key)
    }

    /// Fetch an `f32`.
    fn float_(&self, key: &str) -> Result<Option<f32>> {
        self.get(key)
    }

    /// Fetch an `f64`.
    fn double_(&self, key: &str) -> Result<Option<f64>> {
        self.get(key)
    }

    /// Fetch a list of plain values.
    fn list<T: Plain>(&self, key: &str) -> Result<Option<Vec<T>>> {
        self.get(key)
    }

    /// Fetch a set of plain values.
    fn set<T: Plain + Ord>(&self, key: &str) -> Result<Option<BTreeSet<T>>> {
        self.get(key)
    }

    /// Fetch a string-keyed map of plain values.
    fn map<T: Plain>(&self, key: &str) -> Result<Option<BTreeMap<String, T>>> {
        self.get(key)
    }

    /// Fetch a custom type through serde.
    fn custom<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let kind = custom_kind::<T>().with_key(key);
        match fetch(self, key, &kind)? {
            RawValue::Null => Ok(None),
            raw => decode_custom(key, raw).map(Some),
        }
    }
}

impl<S: Source + ?Sized> SourceExt for S {}
