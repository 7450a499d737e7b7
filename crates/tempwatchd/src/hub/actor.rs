//! Hub actor - owns the client set and the current snapshot.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Reply channel failures are ignored; the caller went away
//! - A failed delivery removes the client instead of erroring

use std::sync::Arc;

use tempwatch_core::Snapshot;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::arena::{ClientArena, ClientId};
use super::commands::{HubCommand, Subscription};

/// Per-client queue depth. A client this far behind is dropped.
pub const CLIENT_BUFFER: usize = 16;

type ClientSender = mpsc::Sender<Arc<str>>;

pub struct HubActor {
    receiver: mpsc::UnboundedReceiver<HubCommand>,
    clients: ClientArena<ClientSender>,
    current: Snapshot,
    current_json: Arc<str>,
}

impl HubActor {
    pub fn new(receiver: mpsc::UnboundedReceiver<HubCommand>, initial: Snapshot) -> Self {
        let current_json = serialize(&initial);
        Self {
            receiver,
            clients: ClientArena::new(),
            current: initial,
            current_json,
        }
    }

    /// Processes commands until every handle is dropped.
    pub async fn run(mut self) {
        info!("Broadcast hub starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(clients = self.clients.len(), "Broadcast hub stopped");
    }

    fn handle_command(&mut self, cmd: HubCommand) {
        match cmd {
            HubCommand::Register { respond_to } => {
                let subscription = self.handle_register();
                if let Err(subscription) = respond_to.send(subscription) {
                    self.clients.remove(subscription.id);
                }
            }
            HubCommand::Unregister { id } => {
                if self.clients.remove(id).is_some() {
                    debug!(client = %id, clients = self.clients.len(), "Client unregistered");
                }
            }
            HubCommand::Publish { snapshot } => self.handle_publish(*snapshot),
            HubCommand::Current { respond_to } => {
                let _ = respond_to.send(self.current.clone());
            }
            HubCommand::ClientCount { respond_to } => {
                let _ = respond_to.send(self.clients.len());
            }
        }
    }

    fn handle_register(&mut self) -> Subscription {
        let (sender, receiver) = mpsc::channel(CLIENT_BUFFER);

        // A fresh channel always has room for the first frame.
        let _ = sender.try_send(Arc::clone(&self.current_json));

        let id = self.clients.insert(sender);
        debug!(client = %id, clients = self.clients.len(), "Client registered");
        Subscription { id, receiver }
    }

    fn handle_publish(&mut self, snapshot: Snapshot) {
        self.current_json = serialize(&snapshot);
        self.current = snapshot;

        let mut failed: Vec<ClientId> = Vec::new();
        for (id, client) in self.clients.iter() {
            if client.try_send(Arc::clone(&self.current_json)).is_err() {
                failed.push(id);
            }
        }

        for id in failed {
            self.clients.remove(id);
            debug!(client = %id, "Removed failed client");
        }
    }
}

fn serialize(snapshot: &Snapshot) -> Arc<str> {
    match serde_json::to_string(snapshot) {
        Ok(json) => Arc::from(json),
        Err(e) => {
            warn!(error = %e, "Failed to serialize snapshot");
            Arc::from("{}")
        }
    }
}
