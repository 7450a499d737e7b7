//! Client interface for the hub actor.

use tempwatch_core::Snapshot;
use tokio::sync::{mpsc, oneshot};

use super::arena::ClientId;
use super::commands::{HubCommand, HubError, Subscription};

/// Cheap-to-clone handle to the broadcast hub.
#[derive(Clone, Debug)]
pub struct HubHandle {
    sender: mpsc::UnboundedSender<HubCommand>,
}

impl HubHandle {
    pub fn new(sender: mpsc::UnboundedSender<HubCommand>) -> Self {
        Self { sender }
    }

    /// Registers a push client. The current snapshot is already queued on
    /// the returned receiver.
    ///
    /// # Errors
    ///
    /// Returns `HubError::ChannelClosed` if the hub has stopped.
    pub async fn register(&self) -> Result<Subscription, HubError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Register { respond_to: tx })
            .map_err(|_| HubError::ChannelClosed)?;
        rx.await.map_err(|_| HubError::ChannelClosed)
    }

    /// Removes a client. Unknown ids are ignored.
    pub fn unregister(&self, id: ClientId) {
        let _ = self.sender.send(HubCommand::Unregister { id });
    }

    /// Queues a snapshot for fan-out without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns `HubError::ChannelClosed` if the hub has stopped.
    pub fn publish(&self, snapshot: Snapshot) -> Result<(), HubError> {
        self.sender
            .send(HubCommand::Publish {
                snapshot: Box::new(snapshot),
            })
            .map_err(|_| HubError::ChannelClosed)
    }

    /// The most recently published snapshot.
    ///
    /// # Errors
    ///
    /// Returns `HubError::ChannelClosed` if the hub has stopped.
    pub async fn current(&self) -> Result<Snapshot, HubError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::Current { respond_to: tx })
            .map_err(|_| HubError::ChannelClosed)?;
        rx.await.map_err(|_| HubError::ChannelClosed)
    }

    /// Number of registered push clients.
    ///
    /// # Errors
    ///
    /// Returns `HubError::ChannelClosed` if the hub has stopped.
    pub async fn client_count(&self) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(HubCommand::ClientCount { respond_to: tx })
            .map_err(|_| HubError::ChannelClosed)?;
        rx.await.map_err(|_| HubError::ChannelClosed)
    }
}
