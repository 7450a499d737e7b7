//! In-memory feed of recent log lines for the dashboard.
//!
//! [`RecentLogsLayer`] sits beside the fmt layers and copies every event that
//! passes the global filter into a bounded ring. `GET /api/logs` serves the
//! ring oldest first.

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::Arc;

use chrono::Utc;
use parking_lot::Mutex;
use tempwatch_protocol::LogEntry;
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Number of entries kept.
pub const RECENT_LOG_CAPACITY: usize = 100;

/// Shared ring of the most recent log entries.
#[derive(Debug, Clone)]
pub struct RecentLogs {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for RecentLogs {
    fn default() -> Self {
        Self::with_capacity(RECENT_LOG_CAPACITY)
    }
}

impl RecentLogs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn push(&self, entry: LogEntry) {
        let mut entries = self.entries.lock();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Copy of the ring, oldest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Layer that feeds this ring.
    pub fn layer(&self) -> RecentLogsLayer {
        RecentLogsLayer { logs: self.clone() }
    }
}

/// `tracing` layer that records events into [`RecentLogs`].
#[derive(Debug, Clone)]
pub struct RecentLogsLayer {
    logs: RecentLogs,
}

impl<S: Subscriber> Layer<S> for RecentLogsLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        self.logs.push(LogEntry {
            timestamp: Utc::now(),
            level: event.metadata().level().to_string(),
            message: visitor.finish(),
        });
    }
}

/// Flattens an event into `message key=value ...`.
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl MessageVisitor {
    fn finish(self) -> String {
        if self.message.is_empty() {
            self.fields.trim_start().to_string()
        } else {
            self.message + &self.fields
        }
    }
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{info, warn};
    use tracing_subscriber::layer::SubscriberExt;

    fn entry(message: &str) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: "INFO".to_string(),
            message: message.to_string(),
        }
    }

    #[test]
    fn test_ring_keeps_newest_in_order() {
        let logs = RecentLogs::with_capacity(3);
        for i in 0..5 {
            logs.push(entry(&format!("line {i}")));
        }

        let messages: Vec<_> = logs.entries().into_iter().map(|e| e.message).collect();
        assert_eq!(messages, ["line 2", "line 3", "line 4"]);
    }

    #[test]
    fn test_default_capacity_is_one_hundred() {
        let logs = RecentLogs::new();
        for i in 0..150 {
            logs.push(entry(&i.to_string()));
        }
        assert_eq!(logs.len(), RECENT_LOG_CAPACITY);
        assert_eq!(logs.entries()[0].message, "50");
        assert_eq!(logs.entries()[99].message, "149");
    }

    #[test]
    fn test_layer_records_level_message_and_fields() {
        let logs = RecentLogs::new();
        let subscriber = tracing_subscriber::registry().with(logs.layer());

        tracing::subscriber::with_default(subscriber, || {
            info!(sensor = "gpu", "Using sensor");
            warn!(temperature_c = 72.5, "Temperature above threshold");
            info!("plain {}", 3);
        });

        let entries = logs.entries();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].level, "INFO");
        assert_eq!(entries[0].message, "Using sensor sensor=gpu");
        assert_eq!(entries[1].level, "WARN");
        assert_eq!(entries[1].message, "Temperature above threshold temperature_c=72.5");
        assert_eq!(entries[2].message, "plain 3");
    }
}
