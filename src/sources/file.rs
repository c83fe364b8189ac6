//! File-based configuration source.

use super::tree::ValueTree;
use super::Source;
use crate::deserialize::{Deserializer, JsonDeserializer};
use crate::error::{ConfigError, Result};
use crate::value::RawValue;
use config::File;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

/// File-based configuration source.
///
/// Loads configuration from YAML, TOML, or JSON files with automatic format detection
/// based on file extension. Nested tables are addressed with dotted keys
/// (`server.port`). The file's modification time is recorded at load; a later
/// change makes [`Source::has_update`] return true.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_konfig::sources::FileSource;
///
/// # fn example() -> hotswap_konfig::error::Result<()> {
/// let source = FileSource::load("config/default.yaml")?;
/// # Ok(())
/// # }
/// ```
pub struct FileSource {
    path: PathBuf,
    modified: Option<SystemTime>,
    tree: ValueTree,
    deserializer: Arc<dyn Deserializer>,
}

impl FileSource {
    /// Load a file with automatic format detection.
    ///
    /// The format is detected from the file extension:
    /// - `.yaml`, `.yml` -> YAML
    /// - `.toml` -> TOML
    /// - `.json` -> JSON
    ///
    /// # Errors
    ///
    /// Returns an error if the extension is unsupported, the file does not
    /// exist, or it cannot be parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        validate_extension(&path)?;

        // Check if file exists
        if !path.exists() {
            return Err(ConfigError::LoadError(format!(
                "Configuration file not found: {}",
                path.display()
            )));
        }

        let modified = modified_time(&path);

        // Build a config using the config crate (auto-detects format from extension)
        let config = config::Config::builder()
            .add_source(File::from(path.clone()).required(true))
            .build()
            .map_err(|e| ConfigError::LoadError(format!("Failed to load file: {}", e)))?;

        let map = config
            .try_deserialize::<HashMap<String, config::Value>>()
            .map_err(|e| ConfigError::ParseError(format!("Failed to parse file: {}", e)))?;

        tracing::debug!(path = %path.display(), keys = map.len(), "loaded configuration file");

        Ok(Self {
            path,
            modified,
            tree: ValueTree::new(
                map.into_iter()
                    .map(|(k, v)| (k, RawValue::from(v)))
                    .collect(),
            ),
            deserializer: Arc::new(JsonDeserializer),
        })
    }

    /// Use a different deserializer for text values.
    pub fn with_deserializer<D: Deserializer + 'static>(mut self, deserializer: D) -> Self {
        self.deserializer = Arc::new(deserializer);
        self
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Validate that the file extension is supported.
fn validate_extension(path: &Path) -> Result<()> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| {
            ConfigError::LoadError(format!(
                "Unable to determine file format for: {}",
                path.display()
            ))
        })?;

    match extension {
        "yaml" | "yml" | "toml" | "json" => Ok(()),
        _ => Err(ConfigError::LoadError(format!(
            "Unsupported file extension: {}. Supported: .yaml, .yml, .toml, .json",
            extension
        ))),
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Source for FileSource {
    fn name(&self) -> String {
        format!("file:{}", self.path.display())
    }

    super::tree_hooks!();

    /// A file that vanished or became unreadable also reports an update, so
    /// that the failure surfaces from `updated_copy` instead of being ignored.
    fn has_update(&self) -> bool {
        match modified_time(&self.path) {
            Some(now) => Some(now) != self.modified,
            None => true,
        }
    }

    fn updated_copy(&self) -> Result<Arc<dyn Source>> {
        let reloaded = Self::load(&self.path).map_err(|e| ConfigError::SourceUnavailable {
            source_name: self.name(),
            reason: e.to_string(),
        })?;
        Ok(Arc::new(Self {
            deserializer: Arc::clone(&self.deserializer),
            ..reloaded
        }))
    }
}
