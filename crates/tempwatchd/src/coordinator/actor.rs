//! The coordinator loop.
//!
//! One task multiplexes every event source with `tokio::select!` and handles
//! events strictly one at a time. Each event that changes observable state
//! ends by building exactly one snapshot and handing it to the hub and the
//! tray, neither of which is awaited.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Closed event sources disable their branch instead of erroring
//! - Worker threads are joined off the async runtime at shutdown

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tempwatch_core::{
    AlertDecision, AlertPolicy, ConfigPatch, NotificationEngine, Snapshot, SnapshotInput,
    TrayCommand,
};
use tokio::sync::mpsc;
use tokio::time::{interval_at, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::handle::{ConfigUpdate, CoordinatorCommand, CoordinatorError};
use crate::hub::HubHandle;
use crate::launcher::Launcher;
use crate::logging::open_log_file;
use crate::notify::{Notification, NotificationDispatcher};
use crate::persist::PersisterHandle;
use crate::sensor::{PollOutcome, SensorPoller};
use crate::store::StateStore;
use crate::tray::{TrayBridge, TrayUpdate};

/// Message sent once the monitor is up.
pub const STARTUP_MESSAGE: &str = "Temperature monitor started";

/// Where tray commands point the launcher.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchTargets {
    pub dashboard_url: String,

    /// Log file for ViewLogs when the configuration names none
    pub default_log_path: PathBuf,

    pub config_path: PathBuf,
}

/// One unit of work for the coordinator.
#[derive(Debug)]
pub enum Event {
    Tick,
    Reading(PollOutcome),
    Tray(TrayCommand),
    TrayClosed,
    Command(CoordinatorCommand),
    Shutdown,
}

/// Whether the loop keeps going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Exclusive owner of the alert engine and every worker handle.
pub struct Coordinator {
    store: StateStore,
    hub: HubHandle,
    engine: NotificationEngine,

    poller: SensorPoller,
    readings: mpsc::UnboundedReceiver<PollOutcome>,

    tray: Option<TrayBridge>,
    tray_commands: Option<mpsc::UnboundedReceiver<TrayCommand>>,

    notifier: NotificationDispatcher,
    persister: Option<PersisterHandle>,
    launcher: Arc<dyn Launcher>,
    targets: LaunchTargets,

    commands: mpsc::Receiver<CoordinatorCommand>,
    cancel: CancellationToken,

    ticker: Interval,
    poll_interval: Duration,
    sensor_error: Option<String>,
    sequence: u64,
    started: Instant,
}

/// Everything the coordinator takes ownership of.
pub struct CoordinatorParts {
    pub store: StateStore,
    pub hub: HubHandle,
    pub engine: NotificationEngine,
    pub poller: SensorPoller,
    pub readings: mpsc::UnboundedReceiver<PollOutcome>,
    pub tray: Option<(TrayBridge, mpsc::UnboundedReceiver<TrayCommand>)>,
    pub notifier: NotificationDispatcher,
    pub persister: Option<PersisterHandle>,
    pub launcher: Arc<dyn Launcher>,
    pub targets: LaunchTargets,
    pub commands: mpsc::Receiver<CoordinatorCommand>,
    pub cancel: CancellationToken,
}

impl Coordinator {
    /// Assembles a coordinator. The first tick fires immediately.
    ///
    /// Must be called inside a tokio runtime.
    pub fn new(parts: CoordinatorParts) -> Self {
        let poll_interval = parts.store.config().poll_interval();
        let (tray, tray_commands) = match parts.tray {
            Some((bridge, commands)) => (Some(bridge), Some(commands)),
            None => (None, None),
        };

        Self {
            store: parts.store,
            hub: parts.hub,
            engine: parts.engine,
            poller: parts.poller,
            readings: parts.readings,
            tray,
            tray_commands,
            notifier: parts.notifier,
            persister: parts.persister,
            launcher: parts.launcher,
            targets: parts.targets,
            commands: parts.commands,
            cancel: parts.cancel,
            ticker: new_ticker(poll_interval, Duration::ZERO),
            poll_interval,
            sensor_error: None,
            sequence: 0,
            started: Instant::now(),
        }
    }

    /// Runs until shutdown, then tears down the worker threads.
    pub async fn run(mut self) {
        info!(
            poll_interval_sec = self.poll_interval.as_secs(),
            "Coordinator starting"
        );
        self.startup();

        loop {
            let event = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Event::Shutdown,
                Some(cmd) = self.commands.recv() => Event::Command(cmd),
                cmd = recv_tray(&mut self.tray_commands) => match cmd {
                    Some(cmd) => Event::Tray(cmd),
                    None => Event::TrayClosed,
                },
                Some(outcome) = self.readings.recv() => Event::Reading(outcome),
                _ = self.ticker.tick() => Event::Tick,
            };

            if self.handle(event) == Flow::Stop {
                break;
            }
        }

        self.shutdown().await;
    }

    /// Publishes the first snapshot and announces startup.
    pub fn startup(&mut self) {
        self.publish();
        if let Err(e) = self.notifier.notify(Notification::status(STARTUP_MESSAGE)) {
            warn!(error = %e, "Startup notification not queued");
        }
    }

    /// Processes one event.
    pub fn handle(&mut self, event: Event) -> Flow {
        match event {
            Event::Tick => self.on_tick(),
            Event::Reading(outcome) => self.on_reading(outcome),
            Event::Tray(cmd) => return self.on_tray_command(cmd),
            Event::TrayClosed => {
                debug!("Tray command channel closed");
                self.tray_commands = None;
            }
            Event::Command(cmd) => self.on_command(cmd),
            Event::Shutdown => {
                info!("Coordinator shutting down");
                return Flow::Stop;
            }
        }
        Flow::Continue
    }

    /// Current alert engine, for inspection.
    pub fn engine(&self) -> &NotificationEngine {
        &self.engine
    }

    // ------------------------------------------------------------------------
    // Event handlers
    // ------------------------------------------------------------------------

    fn on_tick(&mut self) {
        if self.store.is_paused() {
            debug!("Monitoring paused, skipping poll");
            return;
        }
        self.poller.request();
    }

    fn on_reading(&mut self, outcome: PollOutcome) {
        let PollOutcome { reading, error } = outcome;
        let temperature_c = reading.temperature_c;
        let sensor = reading.sensor.clone();

        self.sensor_error = error.map(|e| e.to_string());
        self.store.record_reading(reading);

        if !self.store.is_paused() {
            let threshold_c = self.store.config().temperature_threshold_c;
            let decision = self.engine.observe(temperature_c, threshold_c, Utc::now());
            self.act_on(decision, sensor.as_deref());
        }

        self.publish();
    }

    fn act_on(&mut self, decision: AlertDecision, sensor: Option<&str>) {
        match decision {
            AlertDecision::Alert {
                temperature_c,
                threshold_c,
                new_episode,
                next_cooldown,
            } => {
                warn!(
                    sensor,
                    temperature_c,
                    threshold_c,
                    new_episode,
                    next_cooldown_sec = next_cooldown.as_secs(),
                    "Temperature above threshold"
                );
                let notification = Notification::temperature_alert(sensor, temperature_c, threshold_c);
                if let Err(e) = self.notifier.notify(notification) {
                    warn!(error = %e, "Alert notification not queued");
                }
            }
            AlertDecision::Recovered => info!(sensor, "Temperature back below threshold"),
            AlertDecision::Suppressed { remaining } => {
                debug!(remaining_sec = remaining.as_secs(), "Alert suppressed by cooldown")
            }
            AlertDecision::Cooling { below_streak } => debug!(below_streak, "Cooling down"),
            AlertDecision::Normal | AlertDecision::NoData => {}
        }
    }

    fn on_tray_command(&mut self, cmd: TrayCommand) -> Flow {
        let (target, ensure_file) = match cmd {
            TrayCommand::OpenDashboard => (self.targets.dashboard_url.clone(), None),
            TrayCommand::ViewLogs => {
                let path = self.current_log_path();
                (path.display().to_string(), Some(path))
            }
            TrayCommand::EditSettings => (self.targets.config_path.display().to_string(), None),
            TrayCommand::Quit => {
                info!("Quit requested from tray");
                self.cancel.cancel();
                return Flow::Stop;
            }
        };
        self.launch(cmd, target, ensure_file);
        Flow::Continue
    }

    /// Log file named by the live configuration.
    fn current_log_path(&self) -> PathBuf {
        self.store
            .config()
            .log_file_path
            .map(PathBuf::from)
            .unwrap_or_else(|| self.targets.default_log_path.clone())
    }

    /// Opens `target` on the blocking pool. `ensure_file` is created first so
    /// the viewer has something to show.
    fn launch(&self, cmd: TrayCommand, target: String, ensure_file: Option<PathBuf>) {
        let launcher = Arc::clone(&self.launcher);
        tokio::task::spawn_blocking(move || {
            if let Some(path) = ensure_file {
                if let Err(e) = open_log_file(&path) {
                    warn!(path = %path.display(), error = %e, "Cannot create log file");
                }
            }
            match launcher.open(&target) {
                Ok(()) => debug!(command = %cmd, target = %target, "Opened"),
                Err(e) => warn!(command = %cmd, target = %target, error = %e, "Failed to open"),
            }
        });
    }

    fn on_command(&mut self, cmd: CoordinatorCommand) {
        match cmd {
            CoordinatorCommand::UpdateConfig { patch, respond_to } => {
                let result = self.apply_patch(patch);
                let _ = respond_to.send(result);
            }
            CoordinatorCommand::SetPaused { paused, respond_to } => {
                let was = self.store.set_paused(paused);
                if was != paused {
                    info!(paused, "Monitoring {}", if paused { "paused" } else { "resumed" });
                }
                self.publish();
                let _ = respond_to.send(paused);
            }
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<ConfigUpdate, CoordinatorError> {
        let candidate = self.store.config().merged(&patch);
        let previous = match self.store.replace_config(candidate.clone()) {
            Ok(previous) => previous,
            Err(e) => {
                warn!(field = e.field(), error = %e, "Rejected configuration update");
                return Err(e.into());
            }
        };

        let dwell = self.engine.policy().reset_dwell;
        self.engine
            .reconfigure(AlertPolicy::from_config(&candidate).with_reset_dwell(dwell));

        let interval = candidate.poll_interval();
        if interval != self.poll_interval {
            self.poll_interval = interval;
            self.ticker = new_ticker(interval, interval);
        }

        if let Some(persister) = &self.persister {
            if !persister.save(candidate.clone()) {
                warn!("Config persister stopped, change kept in memory only");
            }
        }

        info!(
            threshold = candidate.temperature_threshold_c,
            poll_interval_sec = candidate.poll_interval_sec,
            base_cooldown_sec = candidate.base_cooldown_sec,
            "Configuration updated"
        );
        self.publish();

        Ok(ConfigUpdate {
            config: candidate,
            previous,
        })
    }

    // ------------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------------

    fn build_snapshot(&mut self) -> Snapshot {
        let state = self.store.snapshot();
        self.sequence += 1;

        SnapshotInput::new(&state.config, self.engine.state())
            .reading(state.reading.as_ref())
            .sensor_error(self.sensor_error.as_deref())
            .sequence(self.sequence)
            .paused(state.monitoring_paused)
            .uptime(self.started.elapsed().as_secs())
            .build()
    }

    fn publish(&mut self) {
        let snapshot = self.build_snapshot();

        if let Some(tray) = &self.tray {
            if !tray.update(TrayUpdate::from(&snapshot)) {
                debug!("Tray gone, dropping indicator updates");
                self.tray = None;
            }
        }

        if let Err(e) = self.hub.publish(snapshot) {
            warn!(error = %e, "Snapshot not published");
        }
    }

    /// Joins the worker threads off the runtime.
    pub async fn shutdown(self) {
        let Coordinator {
            poller,
            tray,
            notifier,
            ..
        } = self;

        let joined = tokio::task::spawn_blocking(move || {
            poller.shutdown();
            if let Some(tray) = tray {
                tray.shutdown();
            }
            notifier.shutdown();
        })
        .await;

        if let Err(e) = joined {
            warn!(error = %e, "Worker teardown failed");
        }
        info!("Coordinator stopped");
    }
}

fn new_ticker(period: Duration, first_after: Duration) -> Interval {
    let mut ticker = interval_at(tokio::time::Instant::now() + first_after, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    ticker
}

async fn recv_tray(rx: &mut Option<mpsc::UnboundedReceiver<TrayCommand>>) -> Option<TrayCommand> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}
