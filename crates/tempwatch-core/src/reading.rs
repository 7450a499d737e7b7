//! Sensor readings and the failures a sensor query can report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One raw value reported by a sensor backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorSample {
    /// Backend label (e.g. "NVIDIA GeForce RTX 3080", "amdgpu edge")
    pub label: String,

    /// Temperature in °C
    pub celsius: f32,
}

impl SensorSample {
    pub fn new(label: impl Into<String>, celsius: f32) -> Self {
        Self {
            label: label.into(),
            celsius,
        }
    }
}

/// The merged result of one poll tick.
///
/// `temperature_c` is `None` when the sensor was unreachable or returned
/// nothing usable. Readings are not retained after being merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    pub sensor: Option<String>,
    pub temperature_c: Option<f32>,
}

impl Reading {
    /// Builds a reading from the hottest finite sample.
    ///
    /// Returns an absent reading when no sample carries a finite value.
    pub fn from_samples(samples: &[SensorSample], timestamp: DateTime<Utc>) -> Self {
        let hottest = samples
            .iter()
            .filter(|s| s.celsius.is_finite())
            .max_by(|a, b| a.celsius.total_cmp(&b.celsius));

        match hottest {
            Some(sample) => Self {
                timestamp,
                sensor: Some(sample.label.clone()),
                temperature_c: Some(sample.celsius),
            },
            None => Self::absent(timestamp),
        }
    }

    /// A reading with no data.
    pub fn absent(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            sensor: None,
            temperature_c: None,
        }
    }

    pub fn is_absent(&self) -> bool {
        self.temperature_c.is_none()
    }
}

/// Failures a sensor query can report. All are recoverable; the next tick
/// simply polls again.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SensorError {
    /// No sensor is present or the driver is not loaded
    #[error("sensor unavailable: {0}")]
    Unavailable(String),

    /// The driver answered with an error
    #[error("sensor driver error: {0}")]
    Driver(String),

    /// The sensor worker has shut down
    #[error("sensor worker stopped")]
    WorkerStopped,
}
