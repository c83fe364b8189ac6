//! Built-in metrics for configuration updates.
//!
//! Provides OpenTelemetry metrics tracking:
//! - Update attempts/success/failures
//! - Update duration
//! - Keys changed per swap
//! - Snapshot age
//! - Live observers
//!
//! # Examples
//!
//! ```rust,no_run
//! use hotswap_konfig::prelude::*;
//! use opentelemetry::global;
//!
//! # fn example() -> Result<()> {
//! let manager = Manager::builder()
//!     .with_file("config.json")
//!     .with_metrics(global::meter("my-app"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

mod update_metrics;

pub use update_metrics::UpdateMetrics;
