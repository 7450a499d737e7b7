//! tempwatch daemon - temperature polling, alerting and live feed
//!
//! This crate wires the runtime around the pure domain in `tempwatch-core`:
//! - `coordinator` - the single task that sequences every state change
//! - `sensor` - sensor worker thread and backends
//! - `notify` - notification worker thread with fallback delivery
//! - `tray` - tray indicator bridge and backends
//! - `hub` - broadcast actor for push clients
//! - `store` - the shared state store
//! - `server` - HTTP and WebSocket surface
//! - `logging`, `log_feed` - subscriber setup and the recent-log ring
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                         tempwatchd                               │
//! ├──────────────────────────────────────────────────────────────────┤
//! │                                                                  │
//! │  tempwatch-sensor ──PollOutcome──┐        ┌──▶ HubActor ──▶ WS   │
//! │  (thread)                        ▼        │    (task)            │
//! │  tempwatch-tray ──TrayCommand──▶ Coordinator ──▶ tempwatch-tray  │
//! │  (thread)                        ▲  (task)│                      │
//! │  axum server ──CoordinatorCommand┘        └──▶ tempwatch-notify  │
//! │                                                 (thread)         │
//! │            StateStore (RwLock) shared by server + coordinator    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! Production code in this crate follows the panic-free policy:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

use std::process;
use std::sync::Arc;

use anyhow::{Context, Result};
use tempwatch_core::{AlertPolicy, NotificationEngine};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub mod coordinator;
pub mod hub;
pub mod launcher;
pub mod log_feed;
pub mod logging;
pub mod notify;
pub mod persist;
pub mod sensor;
pub mod server;
pub mod settings;
pub mod store;
pub mod tray;

use coordinator::{command_channel, initial_snapshot, Coordinator, CoordinatorParts, LaunchTargets};
use hub::spawn_hub;
use launcher::SystemLauncher;
use log_feed::RecentLogs;
use notify::{ConsoleNotifier, NotificationDispatcher};
use persist::spawn_persister;
use sensor::SensorPoller;
use server::AppState;
use settings::Settings;
use store::StateStore;
use tray::TrayBridge;

/// Runs the daemon until SIGINT/SIGTERM or a tray Quit.
///
/// # Errors
///
/// Returns an error if settings are invalid, a worker thread cannot start, or
/// the HTTP listener cannot bind.
#[tokio::main]
pub async fn run() -> Result<()> {
    let settings = Settings::from_env().context("Invalid environment settings")?;
    let config = settings::load_configuration(&settings.config_path)
        .context("Failed to load configuration")?;
    let recent_logs = RecentLogs::new();
    let log_guard =
        logging::init(&config, &recent_logs).context("Failed to initialize logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        config = %settings.config_path.display(),
        log_file = ?log_guard.file_path(),
        "tempwatch daemon starting"
    );

    let cancel = CancellationToken::new();
    let shutdown_token = cancel.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let store = StateStore::new(config.clone());
    let engine = NotificationEngine::new(AlertPolicy::from_config(&config));
    let hub = spawn_hub(initial_snapshot(&store, &engine));

    let (results_tx, readings) = mpsc::unbounded_channel();
    let poller = SensorPoller::spawn(sensor::open_default(settings.sensor_filter.clone()), results_tx)
        .context("Failed to start sensor worker")?;

    let tray = match TrayBridge::spawn(tray::backend_for(settings.tray)) {
        Ok(pair) => Some(pair),
        Err(e) => {
            warn!(error = %e, "Tray unavailable, continuing without indicator");
            None
        }
    };

    let notifier = NotificationDispatcher::spawn(notify::primary_for(settings.notifier), ConsoleNotifier)
        .context("Failed to start notification worker")?;

    let (persister, persist_task) = spawn_persister(settings.config_path.clone());
    let (coordinator_handle, commands) = command_channel();

    let coordinator = Coordinator::new(CoordinatorParts {
        store: store.clone(),
        hub: hub.clone(),
        engine,
        poller,
        readings,
        tray,
        notifier,
        persister: Some(persister),
        launcher: Arc::new(SystemLauncher),
        targets: LaunchTargets {
            dashboard_url: settings.dashboard_url(),
            default_log_path: settings::default_log_path(),
            config_path: settings.config_path.clone(),
        },
        commands,
        cancel: cancel.clone(),
    });
    let coordinator_task = tokio::spawn(coordinator.run());

    let state = AppState {
        coordinator: coordinator_handle,
        hub,
        store,
        logs: recent_logs,
        cancel: cancel.clone(),
    };
    let served = match server::bind(settings.bind).await {
        Ok(listener) => server::serve(listener, state).await,
        Err(e) => Err(e),
    };
    if served.is_err() {
        cancel.cancel();
    }

    if let Err(e) = coordinator_task.await {
        warn!(error = %e, "Coordinator task failed");
    }
    if let Err(e) = persist_task.await {
        warn!(error = %e, "Config persister task failed");
    }

    served.context("HTTP server failed")?;
    info!("tempwatch daemon stopped");
    drop(log_guard);
    Ok(())
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
