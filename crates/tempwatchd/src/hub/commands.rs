//! Hub actor commands and errors.

use std::sync::Arc;

use tempwatch_core::Snapshot;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use super::arena::ClientId;

/// A registered push client: its id and the stream of serialized snapshots.
#[derive(Debug)]
pub struct Subscription {
    pub id: ClientId,
    pub receiver: mpsc::Receiver<Arc<str>>,
}

#[derive(Debug)]
pub enum HubCommand {
    /// Add a client. The current snapshot is queued for it before replying.
    Register {
        respond_to: oneshot::Sender<Subscription>,
    },

    /// Remove a client that disconnected.
    Unregister { id: ClientId },

    /// Replace the current snapshot and fan it out.
    Publish { snapshot: Box<Snapshot> },

    /// Pull query for the current snapshot.
    Current {
        respond_to: oneshot::Sender<Snapshot>,
    },

    ClientCount {
        respond_to: oneshot::Sender<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HubError {
    #[error("broadcast hub stopped")]
    ChannelClosed,
}
