//! Domain-specific error types following panic-free policy.

use crate::config::ConfigError;
use crate::reading::SensorError;
use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    /// A configuration value failed validation
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),

    /// The sensor could not produce a reading
    #[error(transparent)]
    Sensor(#[from] SensorError),

    /// Parse error for incoming data
    #[error("Failed to parse {field}: {reason}")]
    ParseError { field: String, reason: String },
}

impl DomainError {
    /// Creates a parse error for the named input.
    pub fn parse<E: std::fmt::Display>(field: &str, err: E) -> Self {
        Self::ParseError {
            field: field.to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = DomainError::parse("config.json", "expected value at line 1");
        assert_eq!(
            err.to_string(),
            "Failed to parse config.json: expected value at line 1"
        );
    }

    #[test]
    fn test_config_error_is_transparent() {
        let inner = ConfigError::OutOfRange {
            field: "poll_interval_sec",
            value: "0".to_string(),
            expected: "1..=3600",
        };
        let err: DomainError = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
    }
}
