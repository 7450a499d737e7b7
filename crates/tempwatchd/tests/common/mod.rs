//! Shared fixtures for the daemon integration tests.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

#![allow(dead_code)]

use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tempfile::TempDir;
use tempwatch_core::{
    AlertPolicy, Configuration, NotificationEngine, SensorError, SensorSample, Snapshot,
};
use tempwatchd::coordinator::{
    command_channel, initial_snapshot, Coordinator, CoordinatorHandle, CoordinatorParts,
    LaunchTargets,
};
use tempwatchd::hub::{spawn_hub, HubHandle};
use tempwatchd::launcher::Launcher;
use tempwatchd::log_feed::RecentLogs;
use tempwatchd::notify::{Notification, NotificationDispatcher, Notifier, NotifyError};
use tempwatchd::persist::spawn_persister;
use tempwatchd::sensor::{Sensor, SensorPoller};
use tempwatchd::server::AppState;
use tempwatchd::store::StateStore;
use tempwatchd::tray::{TrayBackend, TrayBridge};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub const DASHBOARD_URL: &str = "http://127.0.0.1:18235/";

// ============================================================================
// Test Doubles
// ============================================================================

/// Sensor whose next result is set by the test.
#[derive(Clone)]
pub struct ManualSensor {
    next: Arc<Mutex<Result<Vec<SensorSample>, SensorError>>>,
}

impl ManualSensor {
    pub fn new() -> Self {
        Self {
            next: Arc::new(Mutex::new(Err(SensorError::Unavailable(
                "not set".to_string(),
            )))),
        }
    }

    pub fn set_celsius(&self, celsius: f32) {
        *self.next.lock().unwrap() = Ok(vec![SensorSample::new("gpu", celsius)]);
    }

    pub fn set_error(&self, error: SensorError) {
        *self.next.lock().unwrap() = Err(error);
    }
}

impl Sensor for ManualSensor {
    fn name(&self) -> &str {
        "manual"
    }

    fn read(&mut self) -> Result<Vec<SensorSample>, SensorError> {
        self.next.lock().unwrap().clone()
    }
}

#[derive(Clone, Default)]
pub struct RecordingNotifier {
    pub seen: Arc<Mutex<Vec<Notification>>>,
}

impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        self.seen.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingLauncher {
    pub opened: Mutex<Vec<String>>,
}

impl Launcher for RecordingLauncher {
    fn open(&self, target: &str) -> io::Result<()> {
        self.opened.lock().unwrap().push(target.to_string());
        Ok(())
    }
}

// ============================================================================
// Running Daemon
// ============================================================================

/// A coordinator with all workers running, minus the HTTP listener.
pub struct TestDaemon {
    pub store: StateStore,
    pub hub: HubHandle,
    pub coordinator: CoordinatorHandle,
    pub sensor: ManualSensor,
    pub notifications: Arc<Mutex<Vec<Notification>>>,
    pub launcher: Arc<RecordingLauncher>,
    pub logs: RecentLogs,
    pub cancel: CancellationToken,
    pub config_path: PathBuf,
    pub task: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl TestDaemon {
    pub fn spawn() -> Self {
        Self::spawn_with(Configuration::default(), None)
    }

    pub fn spawn_with(config: Configuration, tray: Option<Box<dyn TrayBackend>>) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");
        let config_path = temp_dir.path().join("config.json");
        let log_path = temp_dir.path().join("tempwatch.log");

        let store = StateStore::new(config.clone());
        let engine = NotificationEngine::new(AlertPolicy::from_config(&config));
        let hub = spawn_hub(initial_snapshot(&store, &engine));

        let sensor = ManualSensor::new();
        let (results_tx, readings) = mpsc::unbounded_channel();
        let poller = SensorPoller::spawn(sensor.clone(), results_tx).expect("spawn sensor");

        let notifier = RecordingNotifier::default();
        let notifications = notifier.seen.clone();
        let dispatcher =
            NotificationDispatcher::spawn(notifier, RecordingNotifier::default()).expect("spawn notifier");

        let tray = tray.map(|backend| TrayBridge::spawn(backend).expect("spawn tray"));
        let (persister, _persist_task) = spawn_persister(config_path.clone());
        let launcher = Arc::new(RecordingLauncher::default());
        let cancel = CancellationToken::new();
        let (handle, commands) = command_channel();

        let coordinator = Coordinator::new(CoordinatorParts {
            store: store.clone(),
            hub: hub.clone(),
            engine,
            poller,
            readings,
            tray,
            notifier: dispatcher,
            persister: Some(persister),
            launcher: launcher.clone(),
            targets: LaunchTargets {
                dashboard_url: DASHBOARD_URL.to_string(),
                default_log_path: log_path,
                config_path: config_path.clone(),
            },
            commands,
            cancel: cancel.clone(),
        });
        let task = tokio::spawn(coordinator.run());

        Self {
            store,
            hub,
            coordinator: handle,
            sensor,
            notifications,
            launcher,
            logs: RecentLogs::new(),
            cancel,
            config_path,
            task,
            _temp_dir: temp_dir,
        }
    }

    pub fn app_state(&self) -> AppState {
        AppState {
            coordinator: self.coordinator.clone(),
            hub: self.hub.clone(),
            store: self.store.clone(),
            logs: self.logs.clone(),
            cancel: self.cancel.clone(),
        }
    }

    /// Polls the hub until `pred` holds for the current snapshot.
    pub async fn wait_for<F>(&self, timeout: Duration, pred: F) -> Snapshot
    where
        F: Fn(&Snapshot) -> bool,
    {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let snapshot = self.hub.current().await.expect("hub running");
            if pred(&snapshot) {
                return snapshot;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "condition not met within {timeout:?}; last snapshot: {snapshot:?}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    pub async fn stop(self) {
        self.cancel.cancel();
        self.task.await.expect("coordinator task");
    }
}

/// Configuration with the shortest accepted poll interval.
pub fn fast_config() -> Configuration {
    Configuration {
        poll_interval_sec: 1,
        ..Configuration::default()
    }
}
