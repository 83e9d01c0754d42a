//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be produced. All of these abort start-up.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// The settings file exists but could not be read.
    #[error("cannot read settings file {}: {source}", path.display())]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O failure.
        source: std::io::Error,
    },
    /// The settings file is not JSON.
    #[error("settings file {} is not valid JSON: {source}", path.display())]
    Parse {
        /// File that was being parsed.
        path: PathBuf,
        /// Parser failure with line and column.
        source: serde_json::Error,
    },
    /// The merged document does not fit the settings schema
    /// (for example a string where a port number belongs).
    #[error("settings do not match the schema: {0}")]
    Schema(#[source] serde_json::Error),
    /// A value parsed but cannot be run with.
    #[error("invalid {field}: {reason}")]
    InvalidValue {
        /// Dotted camelCase path of the setting, e.g. `delivery.partitions`.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl SettingsError {
    pub(crate) fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn read_error_names_the_file() {
        let err = SettingsError::Read {
            path: PathBuf::from("/etc/tidings/settings.json"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        let msg = err.to_string();
        assert!(msg.contains("/etc/tidings/settings.json"));
        assert!(msg.contains("denied"));
    }

    #[test]
    fn parse_error_keeps_the_position() {
        let source = serde_json::from_str::<serde_json::Value>("{\n  \"gateway\": }").unwrap_err();
        let err = SettingsError::Parse {
            path: PathBuf::from("settings.json"),
            source,
        };
        assert!(err.to_string().contains("line 2"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn invalid_value_names_the_field() {
        let err = SettingsError::invalid("delivery.partitions", "must be at least 1");
        assert_eq!(err.to_string(), "invalid delivery.partitions: must be at least 1");
        assert_matches!(err, SettingsError::InvalidValue { field: "delivery.partitions", .. });
    }
}
