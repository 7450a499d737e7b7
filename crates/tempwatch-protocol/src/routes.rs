//! Route paths served by the daemon.

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:18235";

pub const STATUS: &str = "/api/status";
pub const CONFIG: &str = "/api/config";
pub const ACTION: &str = "/api/action";
pub const LOGS: &str = "/api/logs";
pub const WS: &str = "/api/ws";
pub const HEALTH: &str = "/health";
