//! Broadcast hub using the actor pattern.
//!
//! The hub owns the set of push clients and the current snapshot. Every
//! published snapshot is serialized once and offered to each client with a
//! non-blocking send; a client whose queue is full or closed is removed on
//! the spot. New clients get the current snapshot before anything else.
//!
//! ```text
//! ┌─────────────┐  HubCommand   ┌─────────────┐  Arc<str> JSON  ┌──────────┐
//! │ Coordinator │──────────────▶│  HubActor   │────────────────▶│ client 0 │
//! │ HTTP server │   (mpsc)      │ ClientArena │   (mpsc, 16)    │ client 1 │
//! └─────────────┘               └─────────────┘                 └──────────┘
//! ```

use tempwatch_core::Snapshot;
use tokio::sync::mpsc;

mod actor;
mod arena;
mod commands;
mod handle;

pub use actor::{HubActor, CLIENT_BUFFER};
pub use arena::{ClientArena, ClientId};
pub use commands::{HubCommand, HubError, Subscription};
pub use handle::HubHandle;

/// Spawns the hub actor seeded with `initial` and returns its handle.
///
/// The actor stops once every handle is dropped.
pub fn spawn_hub(initial: Snapshot) -> HubHandle {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(HubActor::new(rx, initial).run());
    HubHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempwatch_core::{Configuration, NotificationEngine, SnapshotInput};

    fn snapshot(sequence: u64) -> Snapshot {
        let config = Configuration::default();
        let engine = NotificationEngine::default();
        SnapshotInput::new(&config, engine.state())
            .sequence(sequence)
            .build()
    }

    fn sequence_of(frame: &str) -> u64 {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        value["sequence"].as_u64().unwrap()
    }

    #[tokio::test]
    async fn test_register_receives_current_immediately() {
        let hub = spawn_hub(snapshot(0));
        hub.publish(snapshot(1)).unwrap();
        hub.publish(snapshot(2)).unwrap();

        let mut sub = hub.register().await.unwrap();
        let first = sub.receiver.try_recv().unwrap();
        assert_eq!(sequence_of(&first), 2);
    }

    #[tokio::test]
    async fn test_publish_reaches_all_clients() {
        let hub = spawn_hub(snapshot(0));
        let mut a = hub.register().await.unwrap();
        let mut b = hub.register().await.unwrap();

        hub.publish(snapshot(5)).unwrap();

        for sub in [&mut a, &mut b] {
            assert_eq!(sequence_of(&sub.receiver.recv().await.unwrap()), 0);
            assert_eq!(sequence_of(&sub.receiver.recv().await.unwrap()), 5);
        }
        assert_eq!(hub.current().await.unwrap().sequence, 5);
    }

    #[tokio::test]
    async fn test_closed_client_removed_on_next_publish() {
        let hub = spawn_hub(snapshot(0));
        let gone = hub.register().await.unwrap();
        let mut alive = hub.register().await.unwrap();
        drop(gone);
        assert_eq!(hub.client_count().await.unwrap(), 2);

        hub.publish(snapshot(1)).unwrap();

        assert_eq!(hub.client_count().await.unwrap(), 1);
        assert_eq!(sequence_of(&alive.receiver.recv().await.unwrap()), 0);
        assert_eq!(sequence_of(&alive.receiver.recv().await.unwrap()), 1);
    }

    #[tokio::test]
    async fn test_slow_client_dropped_without_blocking_others() {
        let hub = spawn_hub(snapshot(0));
        let _stalled = hub.register().await.unwrap();
        let mut reader = hub.register().await.unwrap();

        for seq in 1..=(CLIENT_BUFFER as u64 + 4) {
            hub.publish(snapshot(seq)).unwrap();
            let frame = tokio::time::timeout(Duration::from_secs(1), reader.receiver.recv())
                .await
                .unwrap()
                .unwrap();
            assert_eq!(sequence_of(&frame), seq - 1);
        }

        assert_eq!(hub.client_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unregister() {
        let hub = spawn_hub(snapshot(0));
        let sub = hub.register().await.unwrap();
        hub.unregister(sub.id);
        assert_eq!(hub.client_count().await.unwrap(), 0);
    }
}
