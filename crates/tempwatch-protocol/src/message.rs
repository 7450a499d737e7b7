//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tempwatch_core::{ConfigError, Configuration};
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

/// Machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidConfiguration,
    InvalidAction,
    Unavailable,
}

/// Error body returned for rejected requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: ErrorCode,

    /// Offending field, when the error concerns one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl ErrorResponse {
    pub fn new(code: ErrorCode, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code,
            field: None,
        }
    }

    /// Names the offending field.
    #[must_use]
    pub fn with_field(mut self, field: Option<String>) -> Self {
        self.field = field;
        self
    }

    /// Builds the body for a rejected configuration update.
    pub fn invalid_configuration(err: &ConfigError) -> Self {
        Self {
            error: err.to_string(),
            code: ErrorCode::InvalidConfiguration,
            field: Some(err.field().to_string()),
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Body returned after an accepted configuration update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigUpdateResponse {
    pub success: bool,
    pub config: Configuration,
    pub previous: Configuration,
}

impl ConfigUpdateResponse {
    pub fn applied(config: Configuration, previous: Configuration) -> Self {
        Self {
            success: true,
            config,
            previous,
        }
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Monitoring control actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Pause,
    Resume,
}

impl Action {
    /// Whether monitoring is paused after this action.
    pub fn paused(&self) -> bool {
        matches!(self, Self::Pause)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pause => write!(f, "pause"),
            Self::Resume => write!(f, "resume"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action: {0}")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pause" => Ok(Self::Pause),
            "resume" => Ok(Self::Resume),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// `POST /api/action` body.
///
/// The action is kept as a string so that unknown values can be answered
/// with a structured error instead of an extractor rejection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionRequest {
    pub action: String,
}

impl ActionRequest {
    pub fn new(action: Action) -> Self {
        Self {
            action: action.to_string(),
        }
    }

    /// Parses the requested action.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAction` for anything other than `pause` or `resume`.
    pub fn parse(&self) -> Result<Action, UnknownAction> {
        self.action.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub success: bool,
    pub action: Action,
    pub monitoring_paused: bool,
}

// ============================================================================
// Logs
// ============================================================================

/// One line of the recent-log feed served at `GET /api/logs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

// ============================================================================
// Health
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            service: service.into(),
            version: version.into(),
            timestamp: Utc::now(),
        }
    }
}
