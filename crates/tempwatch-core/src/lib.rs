//! tempwatch core - shared domain types for temperature monitoring
//!
//! This crate holds everything that can be reasoned about without a runtime:
//! the validated configuration, sensor readings, the alert state machine,
//! snapshots, and the tray command vocabulary. The daemon (`tempwatchd`)
//! drives these types from its coordinator loop.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod alert;
pub mod config;
pub mod error;
pub mod reading;
pub mod snapshot;
pub mod tier;
pub mod tray;

// Re-exports for convenience
pub use alert::{AlertDecision, AlertPolicy, AlertState, NotificationEngine, DEFAULT_MAX_COOLDOWN};
pub use config::{ConfigError, ConfigPatch, Configuration};
pub use error::{DomainError, DomainResult};
pub use reading::{Reading, SensorError, SensorSample};
pub use snapshot::{AlertView, SensorStatus, Snapshot, SnapshotInput};
pub use tier::{IconTier, APPROACH_MARGIN_C};
pub use tray::{TrayCommand, TrayGesture, MENU_ITEMS};
