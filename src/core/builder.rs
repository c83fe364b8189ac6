//! Builder for constructing Manager instances.

use crate::core::Manager;
use crate::error::Result;
use crate::sources::{EnvSource, FileSource, Source};
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "metrics")]
use crate::metrics::UpdateMetrics;

/// A source waiting to be loaded by [`ManagerBuilder::build`].
enum Pending {
    Ready(Arc<dyn Source>),
    File(PathBuf),
}

/// Builder for constructing a [`Manager`].
///
/// Sources are consulted in the order they are added: the first source that
/// holds a key supplies its value. Environment overrides, when configured,
/// always come first.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_konfig::prelude::*;
///
/// # fn example() -> Result<()> {
/// let manager = Manager::builder()
///     .with_env_overrides("APP", "__")
///     .with_file("config/production.json")
///     .with_file("config/default.json")
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct ManagerBuilder {
    sources: Vec<Pending>,
    env: Option<(String, String)>,
    #[cfg(feature = "metrics")]
    metrics: Option<UpdateMetrics>,
}

impl ManagerBuilder {
    /// Create a new builder with no sources.
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            env: None,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Add a source. Earlier sources take priority over later ones.
    pub fn with_source<S: Source + 'static>(mut self, source: S) -> Self {
        self.sources.push(Pending::Ready(Arc::new(source)));
        self
    }

    /// Add a source that is shared with other managers or with the caller.
    pub fn with_shared_source(mut self, source: Arc<dyn Source>) -> Self {
        self.sources.push(Pending::Ready(source));
        self
    }

    /// Add a file source with automatic format detection.
    ///
    /// Supported formats depend on the enabled features: JSON (default),
    /// YAML (`yaml`) and TOML (`toml`). The file is read in
    /// [`build`](ManagerBuilder::build).
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(Pending::File(path.into()));
        self
    }

    /// Add environment variable overrides, ahead of every other source.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "APP")
    /// * `separator` - Separator for nested keys (e.g., "__" for APP_DB__HOST)
    ///
    /// Variable names are lowercased before they become keys, so overrides
    /// only shadow lowercase keys (`APP_DB__HOST` shadows `db.host`, never
    /// `db.Host`).
    pub fn with_env_overrides(mut self, prefix: &str, separator: &str) -> Self {
        self.env = Some((prefix.to_string(), separator.to_string()));
        self
    }

    /// Record update metrics.
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, meter: opentelemetry::metrics::Meter) -> Self {
        self.metrics = Some(UpdateMetrics::new(meter));
        self
    }

    /// Load every pending source and build the manager.
    ///
    /// # Errors
    ///
    /// Returns an error if a file or the environment cannot be read, or if a
    /// source fails to list its entries.
    pub fn build(self) -> Result<Manager> {
        let mut sources: Vec<Arc<dyn Source>> = Vec::with_capacity(self.sources.len() + 1);

        if let Some((prefix, separator)) = self.env {
            sources.push(Arc::new(EnvSource::load(prefix, separator)?));
        }

        for pending in self.sources {
            match pending {
                Pending::Ready(source) => sources.push(source),
                Pending::File(path) => sources.push(Arc::new(FileSource::load(path)?)),
            }
        }

        let manager = Manager::from_sources(sources)?;

        #[cfg(feature = "metrics")]
        let manager = match self.metrics {
            Some(metrics) => manager.with_metrics(metrics),
            None => manager,
        };

        Ok(manager)
    }
}

impl Default for ManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(unsafe_code)] // For env var manipulation in tests
mod tests {
    use super::*;
    use crate::sources::MapSource;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_builder_accumulates_sources() {
        let builder = ManagerBuilder::new()
            .with_file("config1.json")
            .with_source(MapSource::new("a"))
            .with_file("config2.json");

        assert_eq!(builder.sources.len(), 3);
        assert!(builder.env.is_none());
    }

    #[test]
    fn test_builder_env_overrides() {
        let builder = ManagerBuilder::new().with_env_overrides("APP", "__");
        assert_eq!(builder.env, Some(("APP".to_string(), "__".to_string())));
    }

    #[test]
    fn test_sources_keep_call_order() {
        let mut file = NamedTempFile::with_suffix(".json").unwrap();
        write!(file, r#"{{"a": 2, "b": 3}}"#).unwrap();
        file.flush().unwrap();

        let manager = ManagerBuilder::new()
            .with_source(MapSource::new("first").with_value("a", 1))
            .with_file(file.path())
            .build()
            .unwrap();

        assert_eq!(manager.int_("a").v().unwrap(), 1);
        assert_eq!(manager.int_("b").v().unwrap(), 3);
        assert_eq!(manager.snapshot().source_names()[0], "map:first");
    }

    #[test]
    fn test_env_overrides_come_first() {
        unsafe { std::env::set_var("KONFIG_BUILDER_T_PORT", "9000") };

        let manager = ManagerBuilder::new()
            .with_source(MapSource::new("defaults").with_value("port", 80))
            .with_env_overrides("KONFIG_BUILDER_T", "__")
            .build()
            .unwrap();

        assert_eq!(manager.int_("port").v().unwrap(), 9000);

        unsafe { std::env::remove_var("KONFIG_BUILDER_T_PORT") };
    }

    #[test]
    fn test_env_overrides_nested_keys() {
        unsafe { std::env::set_var("KONFIG_BUILDER_N_DB__HOST", "envhost") };

        let manager = ManagerBuilder::new()
            .with_source(MapSource::new("defaults").with_value("db.host", "default"))
            .with_env_overrides("KONFIG_BUILDER_N", "__")
            .build()
            .unwrap();

        unsafe { std::env::remove_var("KONFIG_BUILDER_N_DB__HOST") };

        assert_eq!(manager.string("db.host").v().unwrap(), "envhost");
        assert_eq!(manager.subset("db").string("host").v().unwrap(), "envhost");
    }

    #[test]
    fn test_missing_file_fails_build() {
        let result = ManagerBuilder::new()
            .with_file("/nonexistent/konfig.json")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_shared_source() {
        let shared: Arc<dyn Source> = Arc::new(MapSource::new("shared").with_value("k", true));
        let one = ManagerBuilder::new()
            .with_shared_source(Arc::clone(&shared))
            .build()
            .unwrap();
        let two = ManagerBuilder::new()
            .with_shared_source(shared)
            .build()
            .unwrap();
        assert!(one.bool("k").v().unwrap());
        assert!(two.bool("k").v().unwrap());
    }
}
