//! Error types for hotswap-konfig.

/// Result type alias for hotswap-konfig operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Errors that can occur when resolving or updating configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The key is absent from every consulted source.
    #[error("Missing configuration key '{key}'")]
    MissingKey {
        /// The fully qualified key that could not be resolved
        key: String,
    },

    /// The backend value does not satisfy the requested type (shape or range).
    #[error("Type mismatch for key '{key}': expected {expected}, found {found}")]
    TypeMismatch {
        /// The key being resolved
        key: String,
        /// Description of the requested kind
        expected: String,
        /// Description of what the backend actually held
        found: String,
    },

    /// A descriptor operation was invoked on a descriptor of the wrong category,
    /// or a manager operation was invoked in the wrong state.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// A capability was invoked on a source that does not implement it.
    #[error("Assertion failed: {0}")]
    Assertion(String),

    /// A backend could not prepare an update.
    #[error("Source '{source_name}' unavailable: {reason}")]
    SourceUnavailable {
        /// Name of the failing source
        source_name: String,
        /// What went wrong
        reason: String,
    },

    /// A backend lookup hook failed while fetching a value.
    #[error("Source '{source_name}' failed to fetch '{key}': {reason}")]
    Backend {
        /// Name of the failing source
        source_name: String,
        /// The key being fetched
        key: String,
        /// The underlying failure
        reason: String,
    },

    /// Failed to load configuration from a source.
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    /// Failed to parse configuration text.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Generic error for other cases.
    #[error("Configuration error: {0}")]
    Other(String),
}

impl ConfigError {
    /// Create a missing key error.
    pub fn missing(key: impl Into<String>) -> Self {
        Self::MissingKey { key: key.into() }
    }

    /// Create a type mismatch error.
    pub fn mismatch(
        key: impl Into<String>,
        expected: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            key: key.into(),
            expected: expected.into(),
            found: found.into(),
        }
    }

    /// Returns true for a `MissingKey` error.
    pub fn is_missing_key(&self) -> bool {
        matches!(self, Self::MissingKey { .. })
    }

    /// Returns true for a `TypeMismatch` error.
    pub fn is_type_mismatch(&self) -> bool {
        matches!(self, Self::TypeMismatch { .. })
    }
}
