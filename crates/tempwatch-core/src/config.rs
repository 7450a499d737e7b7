//! Monitor configuration and its validation rules.
//!
//! A `Configuration` is only ever replaced wholesale: updates arrive as a
//! [`ConfigPatch`], are merged onto the current value, and the merged result
//! is validated as a unit. A rejected update leaves the previous value intact.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Limits
// ============================================================================

/// Highest accepted alert threshold in °C.
pub const MAX_THRESHOLD_C: f32 = 150.0;

/// Accepted poll interval range in seconds.
pub const POLL_INTERVAL_RANGE_SEC: (u64, u64) = (1, 3600);

/// Accepted base cooldown range in seconds.
pub const BASE_COOLDOWN_RANGE_SEC: (u64, u64) = (1, 600);

// ============================================================================
// Configuration
// ============================================================================

/// Runtime configuration shared by the poller, alert engine and dashboard.
///
/// Field names match the persisted JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    /// Alert threshold in °C
    pub temperature_threshold_c: f32,

    /// Seconds between sensor polls
    pub poll_interval_sec: u64,

    /// Initial cooldown between repeated alerts, in seconds
    pub base_cooldown_sec: u64,

    /// Whether the daemon writes a log file
    pub enable_logging: bool,

    /// Log file location (daemon default when absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            temperature_threshold_c: 60.0,
            poll_interval_sec: 20,
            base_cooldown_sec: 20,
            enable_logging: true,
            log_file_path: None,
        }
    }
}

impl Configuration {
    /// Poll interval as a `Duration`.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_sec)
    }

    /// Base alert cooldown as a `Duration`.
    pub fn base_cooldown(&self) -> Duration {
        Duration::from_secs(self.base_cooldown_sec)
    }

    /// Checks every field against its accepted range.
    ///
    /// # Errors
    ///
    /// Returns the first `ConfigError` found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let threshold = self.temperature_threshold_c;
        if !threshold.is_finite() {
            return Err(ConfigError::NotFinite {
                field: "temperature_threshold_c",
            });
        }
        if threshold <= 0.0 || threshold > MAX_THRESHOLD_C {
            return Err(ConfigError::OutOfRange {
                field: "temperature_threshold_c",
                value: threshold.to_string(),
                expected: "greater than 0 and at most 150",
            });
        }

        let (min, max) = POLL_INTERVAL_RANGE_SEC;
        if !(min..=max).contains(&self.poll_interval_sec) {
            return Err(ConfigError::OutOfRange {
                field: "poll_interval_sec",
                value: self.poll_interval_sec.to_string(),
                expected: "1..=3600",
            });
        }

        let (min, max) = BASE_COOLDOWN_RANGE_SEC;
        if !(min..=max).contains(&self.base_cooldown_sec) {
            return Err(ConfigError::OutOfRange {
                field: "base_cooldown_sec",
                value: self.base_cooldown_sec.to_string(),
                expected: "1..=600",
            });
        }

        if let Some(path) = &self.log_file_path {
            if path.trim().is_empty() {
                return Err(ConfigError::EmptyPath {
                    field: "log_file_path",
                });
            }
        }

        Ok(())
    }

    /// Returns a copy with the patch applied. The result is not validated.
    #[must_use]
    pub fn merged(&self, patch: &ConfigPatch) -> Self {
        Self {
            temperature_threshold_c: patch
                .temperature_threshold_c
                .unwrap_or(self.temperature_threshold_c),
            poll_interval_sec: patch.poll_interval_sec.unwrap_or(self.poll_interval_sec),
            base_cooldown_sec: patch.base_cooldown_sec.unwrap_or(self.base_cooldown_sec),
            enable_logging: patch.enable_logging.unwrap_or(self.enable_logging),
            log_file_path: match &patch.log_file_path {
                Some(path) => Some(path.clone()),
                None => self.log_file_path.clone(),
            },
        }
    }

    /// Parses and validates a persisted configuration document.
    ///
    /// # Errors
    ///
    /// - `DomainError::ParseError` if the JSON does not match the schema
    /// - `DomainError::InvalidConfiguration` if a value is out of range
    pub fn from_json(json: &str) -> DomainResult<Self> {
        let config: Configuration =
            serde_json::from_str(json).map_err(|e| DomainError::parse("configuration", e))?;
        config.validate()?;
        Ok(config)
    }
}

// ============================================================================
// Partial Updates
// ============================================================================

/// A partial configuration update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature_threshold_c: Option<f32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poll_interval_sec: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_cooldown_sec: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_logging: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file_path: Option<String>,
}

impl ConfigPatch {
    /// Patch that only changes the threshold.
    pub fn threshold(value: f32) -> Self {
        Self {
            temperature_threshold_c: Some(value),
            ..Self::default()
        }
    }

    /// Returns true if the patch changes nothing.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons a configuration is rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {value} (expected {expected})")]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid {field}: value must be a finite number")]
    NotFinite { field: &'static str },

    #[error("invalid {field}: path must not be empty")]
    EmptyPath { field: &'static str },
}

impl ConfigError {
    /// Name of the offending field.
    pub fn field(&self) -> &'static str {
        match self {
            Self::OutOfRange { field, .. }
            | Self::NotFinite { field }
            | Self::EmptyPath { field } => field,
        }
    }
}
