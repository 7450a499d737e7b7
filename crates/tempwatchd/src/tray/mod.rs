//! Tray bridge: runs the indicator backend on its own thread.
//!
//! The backend owns the native UI objects and pumps their events. It sees the
//! rest of the system only through two channels:
//!
//! ```text
//!  Coordinator ── TrayUpdate (crossbeam) ──▶ tempwatch-tray thread
//!       ▲                                         │ TrayGesture
//!       └──── TrayCommand (tokio unbounded) ◀─────┘ TrayEventSink
//! ```
//!
//! Each gesture produces at most one command, in order. The bridge thread is
//! the only producer on the command channel.

use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use tempwatch_core::{IconTier, Snapshot, TrayCommand, TrayGesture};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

mod headless;
#[cfg(all(feature = "native-tray", windows))]
mod native;

pub use headless::HeadlessTray;
#[cfg(all(feature = "native-tray", windows))]
pub use native::NativeTray;

use crate::settings::TrayMode;

/// How long [`TrayBridge::spawn`] waits for the backend to come up.
pub const READY_TIMEOUT: Duration = Duration::from_secs(5);

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum TrayError {
    #[error("failed to spawn tray thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("tray initialization failed: {0}")]
    Init(String),

    #[error("tray backend did not report ready within {0:?}")]
    ReadyTimeout(Duration),

    #[error("tray backend error: {0}")]
    Backend(String),
}

// ============================================================================
// Messages
// ============================================================================

/// What the indicator should display.
#[derive(Debug, Clone, PartialEq)]
pub struct TrayUpdate {
    pub tier: IconTier,
    pub tooltip: String,
}

impl From<&Snapshot> for TrayUpdate {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            tier: snapshot.tier,
            tooltip: snapshot.tooltip.clone(),
        }
    }
}

/// Whether the backend loop should keep running after a gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrayFlow {
    Continue,
    Exit,
}

/// Converts gestures into commands for the coordinator.
#[derive(Debug, Clone)]
pub struct TrayEventSink {
    commands: mpsc::UnboundedSender<TrayCommand>,
}

impl TrayEventSink {
    pub fn new(commands: mpsc::UnboundedSender<TrayCommand>) -> Self {
        Self { commands }
    }

    /// Forwards the command for `gesture`, if it has one.
    ///
    /// Returns `TrayFlow::Exit` after Quit or once the coordinator is gone.
    pub fn handle(&self, gesture: &TrayGesture) -> TrayFlow {
        let Some(command) = gesture.command() else {
            if gesture.opens_menu() {
                debug!("Tray context menu opened");
            }
            return TrayFlow::Continue;
        };

        info!(command = %command, "Tray command");
        if self.commands.send(command).is_err() {
            debug!("Coordinator gone, stopping tray");
            return TrayFlow::Exit;
        }

        match command {
            TrayCommand::Quit => TrayFlow::Exit,
            _ => TrayFlow::Continue,
        }
    }
}

/// One-shot readiness report from the backend to the bridge.
#[derive(Debug)]
pub struct ReadySignal {
    sender: Option<Sender<Result<(), String>>>,
}

impl ReadySignal {
    /// Reports successful initialization.
    pub fn ready(&mut self) {
        self.report(Ok(()));
    }

    /// Reports failed initialization.
    pub fn failed(&mut self, reason: impl Into<String>) {
        self.report(Err(reason.into()));
    }

    fn report(&mut self, result: Result<(), String>) {
        if let Some(sender) = self.sender.take() {
            let _ = sender.send(result);
        }
    }
}

/// Channels handed to a backend's run loop.
#[derive(Debug)]
pub struct TrayIo {
    pub updates: Receiver<TrayUpdate>,
    pub sink: TrayEventSink,
    pub ready: ReadySignal,
}

// ============================================================================
// Backend Trait
// ============================================================================

/// A tray indicator implementation.
///
/// `run` is called once on the tray thread. It must signal readiness, then
/// loop until the update channel disconnects or the sink returns
/// `TrayFlow::Exit`.
pub trait TrayBackend: Send + 'static {
    fn name(&self) -> &str;

    /// Runs the backend loop.
    ///
    /// # Errors
    ///
    /// Returns `TrayError` if the native objects cannot be created or fail.
    fn run(self: Box<Self>, io: TrayIo) -> Result<(), TrayError>;
}

/// Builds the backend for a mode, falling back to headless when the native
/// backend is not compiled in.
pub fn backend_for(mode: TrayMode) -> Box<dyn TrayBackend> {
    match mode {
        TrayMode::Headless => Box::new(HeadlessTray::default()),
        TrayMode::Native => native_backend(),
    }
}

#[cfg(all(feature = "native-tray", windows))]
fn native_backend() -> Box<dyn TrayBackend> {
    Box::new(NativeTray::default())
}

#[cfg(not(all(feature = "native-tray", windows)))]
fn native_backend() -> Box<dyn TrayBackend> {
    warn!("Native tray not available in this build, running headless");
    Box::new(HeadlessTray::default())
}

// ============================================================================
// Bridge
// ============================================================================

/// Owner side of the tray thread.
pub struct TrayBridge {
    updates: Option<Sender<TrayUpdate>>,
    worker: Option<JoinHandle<()>>,
}

impl TrayBridge {
    /// Starts `backend` on the `tempwatch-tray` thread and waits until it is
    /// ready.
    ///
    /// # Errors
    ///
    /// Returns `TrayError` if the thread cannot start or the backend fails
    /// or times out during initialization.
    pub fn spawn(
        backend: Box<dyn TrayBackend>,
    ) -> Result<(Self, mpsc::UnboundedReceiver<TrayCommand>), TrayError> {
        let (update_tx, update_rx) = crossbeam_channel::unbounded();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

        let io = TrayIo {
            updates: update_rx,
            sink: TrayEventSink::new(command_tx),
            ready: ReadySignal {
                sender: Some(ready_tx),
            },
        };

        let worker = thread::Builder::new()
            .name("tempwatch-tray".to_string())
            .spawn(move || {
                let name = backend.name().to_string();
                debug!(backend = %name, "Tray thread started");
                match backend.run(io) {
                    Ok(()) => debug!(backend = %name, "Tray thread stopped"),
                    Err(e) => warn!(backend = %name, error = %e, "Tray backend stopped with error"),
                }
            })?;

        match ready_rx.recv_timeout(READY_TIMEOUT) {
            Ok(Ok(())) => {}
            Ok(Err(reason)) => return Err(TrayError::Init(reason)),
            Err(RecvTimeoutError::Timeout) => return Err(TrayError::ReadyTimeout(READY_TIMEOUT)),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(TrayError::Init("backend exited before ready".to_string()))
            }
        }

        Ok((
            Self {
                updates: Some(update_tx),
                worker: Some(worker),
            },
            command_rx,
        ))
    }

    /// Sends new display state. Returns false if the backend has exited.
    pub fn update(&self, update: TrayUpdate) -> bool {
        self.updates
            .as_ref()
            .is_some_and(|tx| tx.send(update).is_ok())
    }

    /// Closes the update channel and waits for the backend to exit.
    pub fn shutdown(mut self) {
        self.updates.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Tray thread panicked");
            }
        }
    }
}

/// Square RGBA glyph: a filled disc in the tier color on a transparent field.
pub fn glyph_rgba(tier: IconTier, size: u32) -> Vec<u8> {
    let color = tier.color();
    let center = (size as f32 - 1.0) / 2.0;
    let radius = size as f32 / 2.0 - 1.0;

    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let dx = x as f32 - center;
            let dy = y as f32 - center;
            if dx * dx + dy * dy <= radius * radius {
                pixels.extend_from_slice(&color);
            } else {
                pixels.extend_from_slice(&[0, 0, 0, 0]);
            }
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedTray {
        gestures: Vec<TrayGesture>,
        fail_init: bool,
    }

    impl TrayBackend for ScriptedTray {
        fn name(&self) -> &str {
            "scripted"
        }

        fn run(self: Box<Self>, mut io: TrayIo) -> Result<(), TrayError> {
            if self.fail_init {
                io.ready.failed("no display");
                return Err(TrayError::Init("no display".to_string()));
            }
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

    #[tokio::test]
    async fn test_gestures_become_commands_in_order() {
        let backend = ScriptedTray {
            gestures: vec![
                TrayGesture::PrimaryClick,
                TrayGesture::SecondaryClick,
                TrayGesture::DoubleClick,
                TrayGesture::MenuItem("view_logs".to_string()),
                TrayGesture::MenuItem("edit_settings".to_string()),
            ],
            fail_init: false,
        };
        let (bridge, mut commands) = TrayBridge::spawn(Box::new(backend)).unwrap();

        assert_eq!(commands.recv().await, Some(TrayCommand::OpenDashboard));
        assert_eq!(commands.recv().await, Some(TrayCommand::ViewLogs));
        assert_eq!(commands.recv().await, Some(TrayCommand::EditSettings));

        bridge.shutdown();
        assert_eq!(commands.recv().await, None);
    }

    #[tokio::test]
    async fn test_rapid_activations_deliver_each_command_once() {
        const ACTIVATIONS: usize = 100;
        let cycle = [
            TrayCommand::OpenDashboard,
            TrayCommand::ViewLogs,
            TrayCommand::EditSettings,
        ];
        let expected: Vec<TrayCommand> = (0..ACTIVATIONS).map(|i| cycle[i % cycle.len()]).collect();

        // Menu openings in between must not produce commands of their own.
        let gestures = expected
            .iter()
            .flat_map(|cmd| {
                [
                    TrayGesture::SecondaryClick,
                    TrayGesture::MenuItem(cmd.menu_id().to_string()),
                ]
            })
            .collect();
        let backend = ScriptedTray {
            gestures,
            fail_init: false,
        };
        let (bridge, mut commands) = TrayBridge::spawn(Box::new(backend)).unwrap();
        bridge.shutdown();

        let mut received = Vec::new();
        while let Some(cmd) = commands.recv().await {
            received.push(cmd);
        }
        assert_eq!(received.len(), ACTIVATIONS);
        assert_eq!(received, expected);
    }

    #[tokio::test]
    async fn test_quit_ends_backend() {
        let backend = ScriptedTray {
            gestures: vec![
                TrayGesture::MenuItem("quit".to_string()),
                TrayGesture::DoubleClick,
            ],
            fail_init: false,
        };
        let (bridge, mut commands) = TrayBridge::spawn(Box::new(backend)).unwrap();

        assert_eq!(commands.recv().await, Some(TrayCommand::Quit));
        assert_eq!(commands.recv().await, None);
        assert!(!bridge.update(TrayUpdate {
            tier: IconTier::Normal,
            tooltip: String::new(),
        }));
        bridge.shutdown();
    }

    #[test]
    fn test_init_failure_is_reported() {
        let backend = ScriptedTray {
            gestures: vec![],
            fail_init: true,
        };
        let err = TrayBridge::spawn(Box::new(backend)).err().unwrap();
        assert!(matches!(err, TrayError::Init(reason) if reason == "no display"));
    }

    #[test]
    fn test_glyph_has_tier_color_at_center() {
        let size = 16;
        let pixels = glyph_rgba(IconTier::OverThreshold, size);
        assert_eq!(pixels.len(), (size * size * 4) as usize);

        let center = ((size / 2) * size + size / 2) as usize * 4;
        assert_eq!(&pixels[center..center + 4], &IconTier::OverThreshold.color());
        assert_eq!(&pixels[0..4], &[0, 0, 0, 0]);
    }
}
