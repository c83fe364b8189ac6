//! # hotswap-konfig
//!
//! Typed, hot-swappable configuration over layered key/value sources.
//!
//! ## Overview
//!
//! `hotswap-konfig` resolves typed values from an ordered list of sources
//! (in-memory maps, files, environment variables or your own backend):
//! - Lock-free reads from an immutable snapshot held in an `arc-swap`
//! - Lazy, typed handles ([`K<T>`](crate::core::K)) that always read the
//!   active snapshot
//! - Explicit update cycles that rebuild, diff, swap and notify
//! - Per-key and whole-configuration observers
//!
//! ## Quick Start
//!
//! ```rust
//! use hotswap_konfig::prelude::*;
//! use std::sync::Arc;
//!
//! # fn example() -> hotswap_konfig::error::Result<()> {
//! let overrides = Arc::new(MapBacking::new());
//!
//! let manager = Manager::builder()
//!     .with_source(MapSource::backed("overrides", Arc::clone(&overrides)))
//!     .with_source(
//!         MapSource::new("defaults")
//!             .with_value("server.port", 8080)
//!             .with_value("server.tls", false),
//!     )
//!     .build()?;
//!
//! let port = manager.int_("server.port");
//! assert_eq!(port.v()?, 8080);
//!
//! overrides.set("server.port", 9090);
//! assert!(manager.update_now()?);
//! assert_eq!(port.v()?, 9090);
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Layering**: the first source that holds a key supplies its value
//! - **Typed kinds**: scalars, lists, sets, string-keyed maps and custom
//!   serde types, with range-checked numeric narrowing
//! - **Atomic updates**: readers never see a partially built snapshot
//! - **Observers**: notified after the swap, for changed keys only
//!
//! ## Feature Flags
//!
//! - `json` (default): JSON files
//! - `yaml`: YAML files and the YAML deserializer
//! - `toml`: TOML files
//! - `metrics`: OpenTelemetry update metrics
//!
//! ```toml
//! [dependencies]
//! hotswap-konfig = { version = "0.1", features = ["yaml", "metrics"] }
//! ```

#![warn(missing_docs, rust_2024_compatibility)]
#![deny(unsafe_code)]

pub mod core;
pub mod deserialize;
pub mod error;
pub mod kind;
pub mod notify;
pub mod sources;
pub mod value;

#[cfg(feature = "metrics")]
pub mod metrics;

/// Convenient re-exports for common usage patterns.
pub mod prelude {
    pub use crate::core::{K, Manager, ManagerBuilder, Scope, Snapshot};
    pub use crate::deserialize::{Deserializer, JsonDeserializer};
    pub use crate::error::{ConfigError, Result};
    pub use crate::kind::{Kind, Plain, RawKind, Reify};
    pub use crate::notify::{EverythingObserver, KeyObserver, Subscription};
    pub use crate::sources::{EnvSource, FileSource, MapBacking, MapSource, Source, SourceExt};
    pub use crate::value::RawValue;
}
