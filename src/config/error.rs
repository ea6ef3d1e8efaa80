//! Configuration error types.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while locating, parsing or persisting configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An explicitly requested config file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Reading or writing the config file failed.
    #[error("Could not {action} configuration file '{path}': {source}")]
    File {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the schema.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration could not be rendered as TOML.
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is unusable.
    #[error("Invalid configuration value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// An override variable held something unparseable.
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParse { var: String, message: String },

    /// Saving was requested but no file path is known.
    #[error("No configuration file path set")]
    NoPath,
}

impl ConfigError {
    /// Create a validation error
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an env parse error
    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParse {
            var: var.into(),
            message: message.into(),
        }
    }

    pub(crate) fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            action: "read",
            path: path.into(),
            source,
        }
    }

    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::File {
            action: "write",
            path: path.into(),
            source,
        }
    }
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_error_display() {
        let err = ConfigError::read(
            "/etc/serial-adapter.toml",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(
            err.to_string(),
            "Could not read configuration file '/etc/serial-adapter.toml': denied"
        );
    }

    #[test]
    fn test_validation_display() {
        let err = ConfigError::validation("serial.baud_rate", "must be greater than zero");
        assert!(err.to_string().contains("serial.baud_rate"));
    }
}
