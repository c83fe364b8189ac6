//! Environment variable configuration source.

use super::tree::ValueTree;
use super::Source;
use crate::deserialize::{Deserializer, JsonDeserializer};
use crate::error::{ConfigError, Result};
use crate::value::RawValue;
use config::Environment;
use std::collections::HashMap;
use std::sync::Arc;

/// Environment variable configuration source.
///
/// Loads configuration from environment variables with a specified prefix
/// and separator for nested keys. The variables are captured at load time;
/// [`Source::has_update`] re-reads the environment and compares.
///
/// The prefix is followed by a single `_`; `separator` only splits the rest
/// of the name. Keys are lowercased, so `APP_SERVER__MAXCONN` answers
/// `server.maxconn` and can never shadow a mixed-case key such as `maxConn`.
///
/// # Examples
///
/// ```rust,no_run
/// use hotswap_konfig::sources::EnvSource;
///
/// # fn example() -> hotswap_konfig::error::Result<()> {
/// // APP_SERVER__PORT=8080 -> server.port = 8080
/// let source = EnvSource::load("APP", "__")?;
/// # Ok(())
/// # }
/// ```
pub struct EnvSource {
    prefix: String,
    separator: String,
    tree: ValueTree,
    deserializer: Arc<dyn Deserializer>,
}

impl EnvSource {
    /// Capture the environment variables under `prefix`.
    ///
    /// # Arguments
    ///
    /// * `prefix` - Prefix for environment variables (e.g., "APP")
    /// * `separator` - Separator for nested keys (e.g., "__" for APP_DB__HOST)
    ///
    /// # Errors
    ///
    /// Returns an error if the environment cannot be read or parsed.
    pub fn load(prefix: impl Into<String>, separator: impl Into<String>) -> Result<Self> {
        let prefix = prefix.into();
        let separator = separator.into();
        let tree = read_env(&prefix, &separator)?;

        Ok(Self {
            prefix,
            separator,
            tree,
            deserializer: Arc::new(JsonDeserializer),
        })
    }
}

fn read_env(prefix: &str, separator: &str) -> Result<ValueTree> {
    // Use the config crate's Environment source
    let env_source = Environment::with_prefix(prefix)
        .prefix_separator("_")
        .separator(separator)
        .try_parsing(true); // Try to parse numbers, booleans, etc.

    let config = config::Config::builder()
        .add_source(env_source)
        .build()
        .map_err(|e| {
            ConfigError::LoadError(format!("Failed to load environment variables: {}", e))
        })?;

    let map = config
        .try_deserialize::<HashMap<String, config::Value>>()
        .map_err(|e| {
            ConfigError::ParseError(format!("Failed to parse environment variables: {}", e))
        })?;

    Ok(ValueTree::new(
        map.into_iter()
            .map(|(k, v)| (k, RawValue::from(v)))
            .collect(),
    ))
}

impl Source for EnvSource {
    fn name(&self) -> String {
        format!("env:{}*", self.prefix)
    }

    super::tree_hooks!();

    fn has_update(&self) -> bool {
        match read_env(&self.prefix, &self.separator) {
            Ok(current) => current != self.tree,
            Err(_) => true,
        }
    }

    fn updated_copy(&self) -> Result<Arc<dyn Source>> {
        let tree = read_env(&self.prefix, &self.separator).map_err(|e| {
            ConfigError::SourceUnavailable {
                source_name: self.name(),
                reason: e.to_string(),
            }
        })?;
        Ok(Arc::new(Self {
            prefix: self.prefix.clone(),
            separator: self.separator.clone(),
            tree,
            deserializer: Arc::clone(&self.deserializer),
        }))
    }
}
