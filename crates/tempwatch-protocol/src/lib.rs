//! tempwatch protocol - wire bodies for the daemon's network surface
//!
//! Request and response bodies exchanged with dashboard clients over HTTP,
//! plus the route table. Snapshots themselves live in `tempwatch-core` and
//! are sent as-is.

pub mod message;
pub mod routes;

pub use message::{
    Action, ActionRequest, ActionResponse, ConfigUpdateResponse, ErrorCode, ErrorResponse,
    HealthResponse, LogEntry, UnknownAction,
};
