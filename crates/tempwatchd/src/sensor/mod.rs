//! Sensor poller running on a dedicated worker thread.
//!
//! Sensor queries may block inside the driver, so the backend lives on its
//! own thread. The coordinator asks for a poll with [`SensorPoller::request`]
//! and receives a [`PollOutcome`] on its event channel.
//!
//! ```text
//! Coordinator ── request (bounded 1) ──▶ tempwatch-sensor thread
//!      ▲                                        │ Sensor::read()
//!      └──────────── PollOutcome (mpsc) ────────┘
//! ```
//!
//! A failed query becomes an absent reading; the poller never stops on a
//! sensor error.

use std::io;
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{Sender, TrySendError};
use tempwatch_core::{Reading, SensorError, SensorSample};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod components;
#[cfg(feature = "nvml")]
mod nvml;

pub use components::ComponentSensor;
#[cfg(feature = "nvml")]
pub use nvml::NvmlSensor;

// ============================================================================
// Sensor Trait
// ============================================================================

/// A temperature source.
///
/// Implementations may block; they are only ever called from the poller
/// thread. Calls should return within a second.
pub trait Sensor: Send + 'static {
    /// Short backend name for logs.
    fn name(&self) -> &str;

    /// Queries every channel the backend knows about.
    ///
    /// # Errors
    ///
    /// Returns `SensorError` if the backend cannot be queried.
    fn read(&mut self) -> Result<Vec<SensorSample>, SensorError>;
}

impl Sensor for Box<dyn Sensor> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read(&mut self) -> Result<Vec<SensorSample>, SensorError> {
        (**self).read()
    }
}

/// Picks the best available backend.
///
/// With the `nvml` feature the NVIDIA driver is tried first; otherwise, or
/// if it is unavailable, platform components are used. Both honor `filter`.
pub fn open_default(filter: Option<String>) -> Box<dyn Sensor> {
    let filter = LabelFilter::new(filter);

    #[cfg(feature = "nvml")]
    {
        match NvmlSensor::init(filter.clone()) {
            Ok(sensor) => {
                info!(backend = sensor.name(), filter = ?filter.as_str(), "Using NVML sensor");
                return Box::new(sensor);
            }
            Err(e) => info!(error = %e, "NVML unavailable, falling back to system components"),
        }
    }

    let sensor = ComponentSensor::new(filter.clone());
    info!(backend = sensor.name(), filter = ?filter.as_str(), "Using system component sensor");
    Box::new(sensor)
}

/// Case-insensitive substring match on sensor labels. An empty filter
/// matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelFilter(Option<String>);

impl LabelFilter {
    pub fn new(filter: Option<String>) -> Self {
        Self(
            filter
                .map(|f| f.trim().to_lowercase())
                .filter(|f| !f.is_empty()),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        self.0.as_deref()
    }

    pub fn matches(&self, label: &str) -> bool {
        match &self.0 {
            Some(filter) => label.to_lowercase().contains(filter.as_str()),
            None => true,
        }
    }

    /// Error reported when nothing survives the filter.
    pub fn nothing_matched(&self, what: &str) -> SensorError {
        SensorError::Unavailable(match &self.0 {
            Some(f) => format!("no {what} matching '{f}' reports a temperature"),
            None => format!("no {what} reports a temperature"),
        })
    }
}

// ============================================================================
// Poll Outcome
// ============================================================================

/// Result of one poll request.
#[derive(Debug, Clone, PartialEq)]
pub struct PollOutcome {
    /// Merged reading; absent when the query failed
    pub reading: Reading,

    /// Present when the query failed
    pub error: Option<SensorError>,
}

impl PollOutcome {
    /// Reduces a backend result to one reading.
    pub fn from_result(result: Result<Vec<SensorSample>, SensorError>) -> Self {
        let now = Utc::now();
        match result {
            Ok(samples) if samples.is_empty() => Self::failed(SensorError::Unavailable(
                "no temperature sensors reported".to_string(),
            )),
            Ok(samples) => Self {
                reading: Reading::from_samples(&samples, now),
                error: None,
            },
            Err(e) => Self::failed(e),
        }
    }

    pub fn failed(error: SensorError) -> Self {
        Self {
            reading: Reading::absent(Utc::now()),
            error: Some(error),
        }
    }
}

// ============================================================================
// Poller
// ============================================================================

/// Handle to the sensor worker thread.
///
/// Dropping the poller closes the request channel; the worker exits after
/// its current query.
pub struct SensorPoller {
    requests: Option<Sender<()>>,
    worker: Option<JoinHandle<()>>,
}

impl SensorPoller {
    /// Starts the worker thread that owns `sensor`.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the thread cannot be spawned.
    pub fn spawn<S: Sensor>(
        mut sensor: S,
        results: mpsc::UnboundedSender<PollOutcome>,
    ) -> io::Result<Self> {
        let (requests, incoming) = crossbeam_channel::bounded::<()>(1);

        let worker = thread::Builder::new()
            .name("tempwatch-sensor".to_string())
            .spawn(move || {
                debug!(backend = sensor.name(), "Sensor worker started");

                for () in incoming.iter() {
                    let outcome = PollOutcome::from_result(sensor.read());
                    if let Some(e) = &outcome.error {
                        warn!(backend = sensor.name(), error = %e, "Sensor query failed");
                    }
                    if results.send(outcome).is_err() {
                        break;
                    }
                }

                debug!("Sensor worker stopped");
            })?;

        Ok(Self {
            requests: Some(requests),
            worker: Some(worker),
        })
    }

    /// Asks for one poll. Returns false if a request is already pending or
    /// the worker has stopped.
    pub fn request(&self) -> bool {
        let Some(requests) = &self.requests else {
            return false;
        };
        match requests.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => {
                debug!("Sensor busy, skipping tick");
                false
            }
            Err(TrySendError::Disconnected(())) => false,
        }
    }

    /// Closes the request channel and waits for the worker to finish its
    /// current query.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Sensor worker panicked");
            }
        }
    }
}

impl Drop for SensorPoller {
    fn drop(&mut self) {
        self.requests.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::time::Duration;

    struct ScriptedSensor {
        script: VecDeque<Result<Vec<SensorSample>, SensorError>>,
    }

    impl Sensor for ScriptedSensor {
        fn name(&self) -> &str {
            "scripted"
        }

        fn read(&mut self) -> Result<Vec<SensorSample>, SensorError> {
            self.script
                .pop_front()
                .unwrap_or_else(|| Err(SensorError::Unavailable("script exhausted".to_string())))
        }
    }

    #[test]
    fn test_label_filter_is_case_insensitive() {
        assert!(LabelFilter::new(None).matches("anything"));
        assert!(LabelFilter::new(Some("amdgpu".to_string())).matches("AMDGPU edge"));
        assert!(LabelFilter::new(Some("RTX".to_string())).matches("NVIDIA GeForce rtx 3080"));
        assert!(!LabelFilter::new(Some("nvme".to_string())).matches("coretemp Package id 0"));
    }

    #[test]
    fn test_blank_label_filter_matches_everything() {
        let filter = LabelFilter::new(Some("   ".to_string()));
        assert_eq!(filter.as_str(), None);
        assert!(filter.matches("GPU 0"));
    }

    #[test]
    fn test_nothing_matched_names_the_filter() {
        let err = LabelFilter::new(Some("RTX".to_string())).nothing_matched("GPU");
        assert_eq!(
            err,
            SensorError::Unavailable("no GPU matching 'rtx' reports a temperature".to_string())
        );
    }

    #[test]
    fn test_empty_backend_result_is_failure() {
        let outcome = PollOutcome::from_result(Ok(vec![]));
        assert!(outcome.reading.is_absent());
        assert!(matches!(outcome.error, Some(SensorError::Unavailable(_))));
    }

    #[tokio::test]
    async fn test_poller_reports_failures_and_keeps_going() {
        let sensor = ScriptedSensor {
            script: VecDeque::from(vec![
                Err(SensorError::Driver("timeout".to_string())),
                Ok(vec![SensorSample::new("gpu", 55.0)]),
            ]),
        };
        let (tx, mut rx) = mpsc::unbounded_channel();
        let poller = SensorPoller::spawn(sensor, tx).unwrap();

        assert!(poller.request());
        let first = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(first.reading.is_absent());
        assert_eq!(first.error, Some(SensorError::Driver("timeout".to_string())));

        assert!(poller.request());
        let second = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.reading.temperature_c, Some(55.0));
        assert!(second.error.is_none());

        poller.shutdown();
    }

    #[tokio::test]
    async fn test_worker_exits_when_results_closed() {
        let sensor = ScriptedSensor {
            script: VecDeque::new(),
        };
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let poller = SensorPoller::spawn(sensor, tx).unwrap();
        poller.request();
        poller.shutdown();
    }
}
