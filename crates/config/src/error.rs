//! Configuration error types.

use std::path::PathBuf;

/// Result type for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Errors raised while loading or validating configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read config file {path:?}: {source}")]
    FileRead {
        /// Path that failed to read
        path: PathBuf,
        /// Underlying IO error
        source: std::io::Error,
    },

    /// The configuration file could not be parsed
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A parameter value is outside the range the protocol can operate under
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Offending field, dotted path
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },
}
