//! Immutable, serializable views of the monitor at one instant.
//!
//! A [`Snapshot`] is built in one step from a [`SnapshotInput`]; reading and
//! configuration always come from the same merge. The same structure is
//! returned by the pull query and pushed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::alert::AlertState;
use crate::config::Configuration;
use crate::reading::Reading;
use crate::tier::IconTier;

// ============================================================================
// Sensor Status
// ============================================================================

/// Connection state of the temperature source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    /// The last poll produced a temperature.
    Connected,

    /// No usable reading yet.
    #[default]
    NoData,

    /// The last poll failed.
    Unavailable,
}

// ============================================================================
// Alert View
// ============================================================================

/// Wire view of [`AlertState`] with durations flattened to seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertView {
    pub overheating: bool,
    pub cooldown_sec: u64,
    pub last_alert: Option<DateTime<Utc>>,
    pub alerts_sent: u64,
}

impl From<&AlertState> for AlertView {
    fn from(state: &AlertState) -> Self {
        Self {
            overheating: state.overheating,
            cooldown_sec: state.cooldown.as_secs(),
            last_alert: state.last_alert,
            alerts_sent: state.alerts_sent,
        }
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// The merge of latest reading, configuration and alert state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Increases by one per snapshot built by the coordinator
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,

    /// Hottest sensor value in °C
    pub temperature_c: Option<f32>,
    pub sensor: Option<String>,
    pub reading_at: Option<DateTime<Utc>>,
    pub sensor_status: SensorStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_error: Option<String>,

    pub config: Configuration,
    pub alert: AlertView,
    pub monitoring_paused: bool,

    pub tier: IconTier,
    pub tooltip: String,
    pub uptime_seconds: u64,
}

impl Snapshot {
    /// Whether the reading is at or above the configured threshold.
    pub fn is_over_threshold(&self) -> bool {
        self.tier == IconTier::OverThreshold
    }
}

/// Everything needed to build a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotInput<'a> {
    pub sequence: u64,
    pub generated_at: DateTime<Utc>,
    pub reading: Option<&'a Reading>,
    pub sensor_error: Option<&'a str>,
    pub config: &'a Configuration,
    pub alert: &'a AlertState,
    pub monitoring_paused: bool,
    pub uptime_seconds: u64,
}

impl<'a> SnapshotInput<'a> {
    /// Input with no reading yet.
    pub fn new(config: &'a Configuration, alert: &'a AlertState) -> Self {
        Self {
            sequence: 0,
            generated_at: Utc::now(),
            reading: None,
            sensor_error: None,
            config,
            alert,
            monitoring_paused: false,
            uptime_seconds: 0,
        }
    }

    pub fn reading(mut self, reading: Option<&'a Reading>) -> Self {
        self.reading = reading;
        self
    }

    pub fn sensor_error(mut self, error: Option<&'a str>) -> Self {
        self.sensor_error = error;
        self
    }

    pub fn sequence(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }

    pub fn at(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = generated_at;
        self
    }

    pub fn paused(mut self, paused: bool) -> Self {
        self.monitoring_paused = paused;
        self
    }

    pub fn uptime(mut self, seconds: u64) -> Self {
        self.uptime_seconds = seconds;
        self
    }

    /// Builds the snapshot.
    pub fn build(self) -> Snapshot {
        let threshold = self.config.temperature_threshold_c;
        let temperature_c = self.reading.and_then(|r| r.temperature_c);
        let sensor = self.reading.and_then(|r| r.sensor.clone());

        let sensor_status = match (self.sensor_error, temperature_c) {
            (Some(_), _) => SensorStatus::Unavailable,
            (None, Some(_)) => SensorStatus::Connected,
            (None, None) => SensorStatus::NoData,
        };

        Snapshot {
            sequence: self.sequence,
            generated_at: self.generated_at,
            temperature_c,
            reading_at: self.reading.map(|r| r.timestamp),
            tooltip: tooltip(sensor.as_deref(), temperature_c, threshold),
            sensor,
            sensor_status,
            sensor_error: self.sensor_error.map(str::to_string),
            config: self.config.clone(),
            alert: AlertView::from(self.alert),
            monitoring_paused: self.monitoring_paused,
            tier: IconTier::classify(temperature_c, threshold),
            uptime_seconds: self.uptime_seconds,
        }
    }
}

/// Short tray tooltip text.
pub fn tooltip(label: Option<&str>, temperature_c: Option<f32>, threshold_c: f32) -> String {
    match temperature_c {
        Some(t) => format!(
            "{}: {:.1}°C (limit {:.1}°C)",
            label.unwrap_or("Temperature"),
            t,
            threshold_c
        ),
        None => "No sensor data".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::NotificationEngine;

    #[test]
    fn test_initial_snapshot_has_no_data() {
        let config = Configuration::default();
        let engine = NotificationEngine::default();
        let snapshot = SnapshotInput::new(&config, engine.state()).build();

        assert_eq!(snapshot.sensor_status, SensorStatus::NoData);
        assert_eq!(snapshot.temperature_c, None);
        assert_eq!(snapshot.tier, IconTier::Normal);
        assert_eq!(snapshot.tooltip, "No sensor data");
        assert_eq!(snapshot.alert.cooldown_sec, 20);
        assert!(!snapshot.alert.overheating);
    }

    #[test]
    fn test_snapshot_merges_reading_and_config() {
        let config = Configuration::default();
        let engine = NotificationEngine::default();
        let reading = Reading {
            timestamp: Utc::now(),
            sensor: Some("GPU".to_string()),
            temperature_c: Some(61.3),
        };
        let snapshot = SnapshotInput::new(&config, engine.state())
            .reading(Some(&reading))
            .sequence(7)
            .uptime(42)
            .build();

        assert_eq!(snapshot.sequence, 7);
        assert_eq!(snapshot.uptime_seconds, 42);
        assert_eq!(snapshot.sensor_status, SensorStatus::Connected);
        assert_eq!(snapshot.reading_at, Some(reading.timestamp));
        assert!(snapshot.is_over_threshold());
        assert_eq!(snapshot.tooltip, "GPU: 61.3°C (limit 60.0°C)");
    }

    #[test]
    fn test_failed_poll_is_unavailable() {
        let config = Configuration::default();
        let engine = NotificationEngine::default();
        let snapshot = SnapshotInput::new(&config, engine.state())
            .sensor_error(Some("driver not loaded"))
            .build();

        assert_eq!(snapshot.sensor_status, SensorStatus::Unavailable);
        assert_eq!(snapshot.sensor_error.as_deref(), Some("driver not loaded"));
    }

    #[test]
    fn test_json_shape() {
        let config = Configuration::default();
        let engine = NotificationEngine::default();
        let snapshot = SnapshotInput::new(&config, engine.state())
            .paused(true)
            .build();
        let json = serde_json::to_value(&snapshot).unwrap();

        assert_eq!(json["sensor_status"], "no_data");
        assert_eq!(json["monitoring_paused"], true);
        assert_eq!(json["tier"], "normal");
        assert_eq!(json["config"]["temperature_threshold_c"], 60.0);
        assert!(json.get("sensor_error").is_none());

        let back: Snapshot = serde_json::from_value(json).unwrap();
        assert_eq!(back, snapshot);
    }
}
