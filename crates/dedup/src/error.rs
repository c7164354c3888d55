use thiserror::Error;

/// Result type for dedup operations
pub type Result<T> = std::result::Result<T, DedupError>;

/// Errors that abort a clustering or rollup run
#[derive(Error, Debug)]
pub enum DedupError {
    /// A configuration value is missing or out of range
    #[error("Invalid configuration: {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    /// The TOML config could not be parsed
    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// Two records in one population share a non-empty identifier
    #[error("Duplicate identifier '{identifier}' in {scope}")]
    DuplicateIdentifier { identifier: String, scope: String },
}

impl DedupError {
    /// Create an invalid config error
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a duplicate identifier error; `scope` names the bucket or population
    pub fn duplicate_identifier(identifier: impl Into<String>, scope: impl Into<String>) -> Self {
        Self::DuplicateIdentifier {
            identifier: identifier.into(),
            scope: scope.into(),
        }
    }
}
