//! Commands, errors and the client handle for the coordinator.

use std::io;

use tempwatch_core::{ConfigError, ConfigPatch, Configuration};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    InvalidConfiguration(#[from] ConfigError),

    #[error("failed to start worker thread: {0}")]
    Spawn(#[from] io::Error),

    #[error("coordinator stopped")]
    ChannelClosed,
}

// ============================================================================
// Commands
// ============================================================================

/// An accepted configuration change.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigUpdate {
    pub config: Configuration,
    pub previous: Configuration,
}

#[derive(Debug)]
pub enum CoordinatorCommand {
    /// Merge, validate and apply a configuration patch.
    UpdateConfig {
        patch: ConfigPatch,
        respond_to: oneshot::Sender<Result<ConfigUpdate, CoordinatorError>>,
    },

    /// Pause or resume monitoring. Replies with the new flag.
    SetPaused {
        paused: bool,
        respond_to: oneshot::Sender<bool>,
    },
}

// ============================================================================
// Handle
// ============================================================================

/// Cheap-to-clone handle for sending commands to the coordinator.
#[derive(Clone, Debug)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<CoordinatorCommand>,
}

impl CoordinatorHandle {
    pub fn new(sender: mpsc::Sender<CoordinatorCommand>) -> Self {
        Self { sender }
    }

    /// Applies a configuration patch. On success a fresh snapshot has already
    /// been published when this returns.
    ///
    /// # Errors
    ///
    /// - `CoordinatorError::InvalidConfiguration` if the merged configuration
    ///   is rejected; nothing changes
    /// - `CoordinatorError::ChannelClosed` if the coordinator has stopped
    pub async fn update_config(&self, patch: ConfigPatch) -> Result<ConfigUpdate, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorCommand::UpdateConfig {
                patch,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)?
    }

    /// Pauses or resumes monitoring.
    ///
    /// # Errors
    ///
    /// Returns `CoordinatorError::ChannelClosed` if the coordinator has
    /// stopped.
    pub async fn set_paused(&self, paused: bool) -> Result<bool, CoordinatorError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CoordinatorCommand::SetPaused {
                paused,
                respond_to: tx,
            })
            .await
            .map_err(|_| CoordinatorError::ChannelClosed)?;
        rx.await.map_err(|_| CoordinatorError::ChannelClosed)
    }
}
