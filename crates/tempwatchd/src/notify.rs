//! Notification delivery on a dedicated worker thread.
//!
//! Desktop notification calls can block, so they run on the
//! `tempwatch-notify` thread. When the primary notifier fails, the fallback
//! notifier gets the same message. Delivery failures never feed back into
//! alert state.

use std::io;
use std::process::Command;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::settings::NotifierMode;

/// Application name shown as the notification source.
pub const APP_NAME: &str = "Temperature Monitor";

// ============================================================================
// Notification
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub severity: Severity,
}

impl Notification {
    /// Over-threshold alert.
    pub fn temperature_alert(label: Option<&str>, temperature_c: f32, threshold_c: f32) -> Self {
        Self {
            title: "Temperature Alert".to_string(),
            body: format!(
                "{}: {:.1}°C (threshold {:.1}°C)",
                label.unwrap_or("Temperature"),
                temperature_c,
                threshold_c
            ),
            severity: Severity::Warning,
        }
    }

    /// Informational status message.
    pub fn status(message: impl Into<String>) -> Self {
        Self {
            title: APP_NAME.to_string(),
            body: message.into(),
            severity: Severity::Info,
        }
    }
}

// ============================================================================
// Notifiers
// ============================================================================

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("desktop notifications are not supported on {0}")]
    Unsupported(&'static str),

    #[error("failed to run {program}: {source}")]
    Spawn {
        program: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("{program} exited with {status}")]
    Command {
        program: &'static str,
        status: String,
    },

    #[error("notification worker stopped")]
    WorkerStopped,
}

/// A notification channel. Called only from the notify thread.
pub trait Notifier: Send + 'static {
    fn name(&self) -> &str;

    /// Shows one notification.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError` if the notification could not be shown.
    fn deliver(&mut self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Native desktop notifications through the platform command line tool.
#[derive(Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    fn command(notification: &Notification) -> Result<(&'static str, Command), NotifyError> {
        if cfg!(target_os = "linux") {
            let urgency = match notification.severity {
                Severity::Info => "normal",
                Severity::Warning => "critical",
            };
            let mut cmd = Command::new("notify-send");
            cmd.args(["-a", APP_NAME, "-u", urgency])
                .arg(&notification.title)
                .arg(&notification.body);
            Ok(("notify-send", cmd))
        } else if cfg!(target_os = "macos") {
            let script = format!(
                "display notification {} with title {}",
                applescript_quote(&notification.body),
                applescript_quote(&notification.title)
            );
            let mut cmd = Command::new("osascript");
            cmd.arg("-e").arg(script);
            Ok(("osascript", cmd))
        } else {
            Err(NotifyError::Unsupported(std::env::consts::OS))
        }
    }
}

fn applescript_quote(text: &str) -> String {
    format!("\"{}\"", text.replace('\\', "\\\\").replace('"', "\\\""))
}

impl Notifier for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        let (program, mut cmd) = Self::command(notification)?;
        let status = cmd
            .status()
            .map_err(|source| NotifyError::Spawn { program, source })?;
        if status.success() {
            Ok(())
        } else {
            Err(NotifyError::Command {
                program,
                status: status.to_string(),
            })
        }
    }
}

/// Writes notifications to the log. Never fails.
#[derive(Debug, Default)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn name(&self) -> &str {
        "console"
    }

    fn deliver(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        match notification.severity {
            Severity::Warning => warn!(
                title = %notification.title,
                "NOTIFICATION: {}",
                notification.body
            ),
            Severity::Info => info!(
                title = %notification.title,
                "NOTIFICATION: {}",
                notification.body
            ),
        }
        Ok(())
    }
}

/// Builds the primary notifier for a mode.
pub fn primary_for(mode: NotifierMode) -> Box<dyn Notifier> {
    match mode {
        NotifierMode::Desktop => Box::new(DesktopNotifier),
        NotifierMode::Console => Box::new(ConsoleNotifier),
    }
}

impl Notifier for Box<dyn Notifier> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn deliver(&mut self, notification: &Notification) -> Result<(), NotifyError> {
        (**self).deliver(notification)
    }
}

// ============================================================================
// Dispatcher
// ============================================================================

/// Handle to the notification worker thread.
pub struct NotificationDispatcher {
    sender: Option<Sender<Notification>>,
    worker: Option<JoinHandle<()>>,
}

impl NotificationDispatcher {
    /// Starts the worker that owns both notifiers.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the thread cannot be spawned.
    pub fn spawn<P, F>(mut primary: P, mut fallback: F) -> io::Result<Self>
    where
        P: Notifier,
        F: Notifier,
    {
        let (sender, receiver) = crossbeam_channel::unbounded::<Notification>();

        let worker = thread::Builder::new()
            .name("tempwatch-notify".to_string())
            .spawn(move || {
                debug!(primary = primary.name(), fallback = fallback.name(), "Notify worker started");

                for notification in receiver.iter() {
                    deliver_with_fallback(&mut primary, &mut fallback, &notification);
                }

                debug!("Notify worker stopped");
            })?;

        Ok(Self {
            sender: Some(sender),
            worker: Some(worker),
        })
    }

    /// Queues a notification without waiting for delivery.
    ///
    /// # Errors
    ///
    /// Returns `NotifyError::WorkerStopped` if the worker has exited.
    pub fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sender
            .as_ref()
            .ok_or(NotifyError::WorkerStopped)?
            .send(notification)
            .map_err(|_| NotifyError::WorkerStopped)
    }

    /// Closes the queue and waits for pending notifications to be delivered.
    pub fn shutdown(mut self) {
        self.sender.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Notify worker panicked");
            }
        }
    }
}

/// Delivers through `primary`, or through `fallback` if that fails.
pub fn deliver_with_fallback<P, F>(primary: &mut P, fallback: &mut F, notification: &Notification)
where
    P: Notifier + ?Sized,
    F: Notifier + ?Sized,
{
    match primary.deliver(notification) {
        Ok(()) => debug!(notifier = primary.name(), title = %notification.title, "Notification delivered"),
        Err(e) => {
            warn!(notifier = primary.name(), error = %e, "Notification failed, using fallback");
            if let Err(e) = fallback.deliver(notification) {
                error!(notifier = fallback.name(), error = %e, "Fallback notification failed");
            }
        }
    }
}
