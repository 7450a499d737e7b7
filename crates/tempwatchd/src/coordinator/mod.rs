//! Coordinator: the single task that sequences every state change.
//!
//! ```text
//!   ticker ──────┐
//!   PollOutcome ─┤                    ┌──▶ StateStore (write)
//!   TrayCommand ─┼──▶ Coordinator ────┼──▶ HubHandle::publish(Snapshot)
//!   commands ────┤   (one event at    ├──▶ TrayBridge::update
//!   cancel ──────┘    a time)         └──▶ NotificationDispatcher
//! ```
//!
//! Events are handled one at a time, so a snapshot always pairs a reading
//! with the configuration that was current when it was merged. Fan-out is
//! queued, never awaited.

use tempwatch_core::{NotificationEngine, Snapshot, SnapshotInput};
use tokio::sync::mpsc;

mod actor;
mod handle;

pub use actor::{Coordinator, CoordinatorParts, Event, Flow, LaunchTargets, STARTUP_MESSAGE};
pub use handle::{ConfigUpdate, CoordinatorCommand, CoordinatorError, CoordinatorHandle};

use crate::store::StateStore;

/// Command channel depth.
const COMMAND_BUFFER: usize = 32;

/// Creates the command channel: the handle for clients and the receiver for
/// [`CoordinatorParts::commands`].
pub fn command_channel() -> (CoordinatorHandle, mpsc::Receiver<CoordinatorCommand>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    (CoordinatorHandle::new(tx), rx)
}

/// Snapshot used to seed the hub before the coordinator starts.
pub fn initial_snapshot(store: &StateStore, engine: &NotificationEngine) -> Snapshot {
    let state = store.snapshot();
    SnapshotInput::new(&state.config, engine.state())
        .reading(state.reading.as_ref())
        .paused(state.monitoring_paused)
        .build()
}
