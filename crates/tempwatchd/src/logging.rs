//! Tracing subscriber setup.
//!
//! Logs always go to stderr and to the in-memory recent-log feed. When the
//! configuration enables logging, a third plain-text layer appends to the
//! log file through a non-blocking writer, so no task ever waits on disk.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tempwatch_core::Configuration;
use thiserror::Error;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter};

use crate::log_feed::RecentLogs;
use crate::settings::log_path;

/// Filter used when `RUST_LOG` is unset or invalid.
pub const DEFAULT_DIRECTIVES: &str = "tempwatchd=info,tempwatch_core=info";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("failed to open log file {path}: {source}")]
    OpenFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Keeps the file writer alive. Dropping it flushes pending lines.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    file_path: Option<PathBuf>,
    _file_guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    /// Log file in use, if file logging is active.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns `LoggingError` if the log file cannot be opened or a global
/// subscriber is already installed.
pub fn init(config: &Configuration, recent: &RecentLogs) -> Result<LoggingGuard, LoggingError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));

    let (file_layer, file_path, file_guard) = if config.enable_logging {
        let path = log_path(config);
        let (writer, guard) = file_writer(&path)?;
        let layer = fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(writer);
        (Some(layer), Some(path), Some(guard))
    } else {
        (None, None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(io::stderr))
        .with(recent.layer())
        .with(file_layer)
        .try_init()?;

    Ok(LoggingGuard {
        file_path,
        _file_guard: file_guard,
    })
}

/// Non-blocking appender for `path`. Lines are written by a background
/// thread that lives as long as the returned guard.
///
/// # Errors
///
/// Returns `LoggingError::OpenFile` if the file cannot be created.
pub fn file_writer(path: &Path) -> Result<(NonBlocking, WorkerGuard), LoggingError> {
    let open_error = |source| LoggingError::OpenFile {
        path: path.to_path_buf(),
        source,
    };

    // Fails early, with the path in the error, if the location is unusable.
    open_log_file(path).map_err(open_error)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| open_error(io::Error::new(io::ErrorKind::InvalidInput, "no file name")))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let appender = tracing_appender::rolling::never(dir, file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Opens `path` for appending, creating parent directories as needed.
///
/// # Errors
///
/// Returns the underlying I/O error.
pub fn open_log_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    OpenOptions::new().create(true).append(true).open(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tracing::info;

    #[test]
    fn test_open_log_file_creates_and_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("tempwatch.log");

        writeln!(open_log_file(&path).unwrap(), "one").unwrap();
        writeln!(open_log_file(&path).unwrap(), "two").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn test_file_writer_appends_off_thread() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("tempwatch.log");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "earlier\n").unwrap();

        let (writer, guard) = file_writer(&path).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(writer));
        tracing::subscriber::with_default(subscriber, || {
            info!(threshold = 60.0, "Configuration updated");
        });
        // Dropping the guard flushes the background writer.
        drop(guard);

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("earlier\n"));
        assert!(contents.contains("Configuration updated"));
        assert!(contents.contains("threshold=60.0"));
    }

    #[test]
    fn test_file_writer_rejects_directory_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = file_writer(dir.path()).err().unwrap();
        assert!(matches!(err, LoggingError::OpenFile { .. }));
    }

    #[test]
    fn test_default_directives_parse() {
        assert!(DEFAULT_DIRECTIVES
            .split(',')
            .all(|d| d.parse::<tracing_subscriber::filter::Directive>().is_ok()));
    }
}
