/// Structured error type for hatch-core.
///
/// Uses `thiserror` so library consumers can match on the failure,
/// while the CLI reports it through `anyhow`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for settings and logging setup
#[derive(Error, Debug)]
pub enum CoreError {
    /// I/O operation failed
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: io::Error,
    },

    /// An explicitly requested config file does not exist
    #[error("Config file not found: {path:?}")]
    ConfigNotFound { path: PathBuf },

    /// Config file exists but is not valid TOML for [`crate::Settings`]
    #[error("Invalid config file {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    /// Environment variable holds a value of the wrong shape
    #[error("Invalid value for {key}: '{value}' ({reason})")]
    InvalidEnv {
        key: &'static str,
        value: String,
        reason: String,
    },

    /// A loaded setting violates a constraint
    #[error("Invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },

    /// Tracing subscriber could not be installed
    #[error("Logging setup failed: {reason}")]
    Logging { reason: String },
}

/// Result type alias for hatch-core operations
pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create an invalid environment value error
    pub fn invalid_env(key: &'static str, value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidEnv {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an invalid setting error
    pub fn invalid_setting(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidSetting {
            field,
            reason: reason.into(),
        }
    }

    /// Create a logging setup error
    pub fn logging(reason: impl Into<String>) -> Self {
        Self::Logging {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::invalid_env("PORT", "eighty", "expected an integer");
        assert_eq!(
            err.to_string(),
            "Invalid value for PORT: 'eighty' (expected an integer)"
        );

        let err = CoreError::ConfigNotFound {
            path: PathBuf::from("/tmp/hatch.toml"),
        };
        assert!(err.to_string().contains("/tmp/hatch.toml"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let err: CoreError = io_err.into();

        assert!(matches!(err, CoreError::Io { .. }));
    }
}
