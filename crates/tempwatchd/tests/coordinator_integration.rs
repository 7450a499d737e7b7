//! End-to-end tests for the coordinator with real worker threads.
//!
//! The sensor, notifier and launcher are test doubles; the poller thread,
//! notification worker, tray thread, hub actor and persister are real.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

mod common;

use std::time::Duration;

use common::{fast_config, TestDaemon, DASHBOARD_URL};
use tempwatch_core::{
    ConfigPatch, Configuration, IconTier, SensorError, SensorStatus, TrayCommand, TrayGesture,
};
use tempwatchd::coordinator::{CoordinatorError, STARTUP_MESSAGE};
use tempwatchd::tray::{TrayBackend, TrayError, TrayFlow, TrayIo};

const WAIT: Duration = Duration::from_secs(5);

/// Polls a condition that is reached from a worker thread.
async fn eventually<F>(what: &str, cond: F)
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + WAIT;
    while !cond() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// Tray that replays gestures once it is ready.
struct ScriptedTray {
    gestures: Vec<TrayGesture>,
}

impl TrayBackend for ScriptedTray {
    fn name(&self) -> &str {
        "scripted"
    }

    fn run(self: Box<Self>, mut io: TrayIo) -> Result<(), TrayError> {
        io.ready.ready();
        for gesture in &self.gestures {
            if io.sink.handle(gesture) == TrayFlow::Exit {
                return Ok(());
            }
        }
        while io.updates.recv().is_ok() {}
        Ok(())
    }
}

// ============================================================================
// Startup / Alerts
// ============================================================================

#[tokio::test]
async fn startup_notification_is_sent() {
    let daemon = TestDaemon::spawn();
    let seen = daemon.notifications.clone();

    eventually("startup notification", || {
        seen.lock().unwrap().iter().any(|n| n.body == STARTUP_MESSAGE)
    })
    .await;

    daemon.stop().await;
}

#[tokio::test]
async fn over_threshold_reading_raises_one_alert() {
    let daemon = TestDaemon::spawn_with(fast_config(), None);
    daemon.sensor.set_celsius(72.0);

    let snapshot = daemon
        .wait_for(WAIT, |s| s.alert.alerts_sent >= 1)
        .await;
    assert!(snapshot.alert.overheating);
    assert_eq!(snapshot.tier, IconTier::OverThreshold);
    assert_eq!(snapshot.sensor_status, SensorStatus::Connected);

    let seen = daemon.notifications.clone();
    eventually("alert notification", || {
        seen.lock()
            .unwrap()
            .iter()
            .any(|n| n.body.contains("72.0°C") && n.body.contains("60.0°C"))
    })
    .await;

    daemon.stop().await;
}

// ============================================================================
// Sensor Failures
// ============================================================================

#[tokio::test]
async fn sensor_recovers_on_next_tick() {
    let daemon = TestDaemon::spawn_with(fast_config(), None);
    daemon
        .sensor
        .set_error(SensorError::Driver("device lost".to_string()));

    let failed = daemon
        .wait_for(WAIT, |s| {
            s.sensor_error
                .as_deref()
                .is_some_and(|e| e.contains("device lost"))
        })
        .await;
    assert_eq!(failed.sensor_status, SensorStatus::Unavailable);
    assert_eq!(failed.tier, IconTier::Normal);

    daemon.sensor.set_celsius(45.0);
    let recovered = daemon
        .wait_for(WAIT, |s| s.sensor_status == SensorStatus::Connected)
        .await;
    assert_eq!(recovered.temperature_c, Some(45.0));
    assert!(recovered.sensor_error.is_none());
    assert!(recovered.sequence > failed.sequence);

    daemon.stop().await;
}

#[tokio::test]
async fn paused_monitoring_raises_no_alert() {
    let daemon = TestDaemon::spawn_with(fast_config(), None);
    assert!(daemon.coordinator.set_paused(true).await.unwrap());

    daemon.sensor.set_celsius(90.0);
    tokio::time::sleep(Duration::from_millis(2500)).await;

    let snapshot = daemon.hub.current().await.unwrap();
    assert!(snapshot.monitoring_paused);
    assert_eq!(snapshot.alert.alerts_sent, 0);

    daemon.stop().await;
}

// ============================================================================
// Configuration
// ============================================================================

#[tokio::test]
async fn invalid_threshold_leaves_config_unchanged() {
    let daemon = TestDaemon::spawn();

    let err = daemon
        .coordinator
        .update_config(ConfigPatch::threshold(-5.0))
        .await
        .unwrap_err();
    assert!(matches!(err, CoordinatorError::InvalidConfiguration(_)));

    assert_eq!(daemon.store.config().temperature_threshold_c, 60.0);
    let snapshot = daemon.hub.current().await.unwrap();
    assert_eq!(snapshot.config.temperature_threshold_c, 60.0);

    daemon.stop().await;
}

#[tokio::test]
async fn accepted_update_is_persisted() {
    let daemon = TestDaemon::spawn();

    let update = daemon
        .coordinator
        .update_config(ConfigPatch {
            temperature_threshold_c: Some(80.0),
            poll_interval_sec: Some(3),
            ..ConfigPatch::default()
        })
        .await
        .unwrap();
    assert_eq!(update.previous, Configuration::default());
    assert_eq!(update.config.poll_interval_sec, 3);

    let path = daemon.config_path.clone();
    eventually("config file", || {
        std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| Configuration::from_json(&s).ok())
            .is_some_and(|c| c.temperature_threshold_c == 80.0)
    })
    .await;

    daemon.stop().await;
}

// ============================================================================
// Tray
// ============================================================================

#[tokio::test]
async fn tray_gestures_open_targets_and_quit_stops() {
    let tray = ScriptedTray {
        gestures: vec![
            TrayGesture::PrimaryClick,
            TrayGesture::SecondaryClick,
            TrayGesture::MenuItem(TrayCommand::ViewLogs.menu_id().to_string()),
            TrayGesture::MenuItem(TrayCommand::EditSettings.menu_id().to_string()),
            TrayGesture::MenuItem(TrayCommand::Quit.menu_id().to_string()),
        ],
    };
    let daemon = TestDaemon::spawn_with(Configuration::default(), Some(Box::new(tray)));

    // Quit cancels the shared token and ends the coordinator on its own.
    tokio::time::timeout(WAIT, daemon.cancel.cancelled())
        .await
        .expect("quit cancels");

    let launcher = daemon.launcher.clone();
    eventually("three launches", || launcher.opened.lock().unwrap().len() == 3).await;

    let opened = launcher.opened.lock().unwrap().clone();
    assert_eq!(opened[0], DASHBOARD_URL);
    assert!(opened[1].ends_with("tempwatch.log"));
    assert!(std::path::Path::new(&opened[1]).exists());
    assert!(opened[2].ends_with("config.json"));

    tokio::time::timeout(WAIT, daemon.task)
        .await
        .expect("coordinator exits")
        .unwrap();
}
