//! Ordered, atomic persistence of accepted configurations.
//!
//! The coordinator hands every accepted [`Configuration`] to the persister
//! and moves on. Writes happen one at a time in arrival order; a failed write
//! is logged and the in-memory configuration stays authoritative.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tempwatch_core::Configuration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Writes `bytes` to a sibling temp file and renames it over `path`.
///
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns any I/O error from directory creation, writing or renaming.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp = temp_path(path);
    {
        let mut file = fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
    }
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

// ============================================================================
// Persister Task
// ============================================================================

/// Cheap-to-clone handle for queueing configuration writes.
#[derive(Clone, Debug)]
pub struct PersisterHandle {
    sender: mpsc::UnboundedSender<Configuration>,
}

impl PersisterHandle {
    /// Queues a configuration for writing. Returns false if the persister has
    /// stopped.
    pub fn save(&self, config: Configuration) -> bool {
        self.sender.send(config).is_ok()
    }
}

/// Spawns the persister task for `path`.
///
/// The task exits once every handle is dropped and the queue is drained.
pub fn spawn_persister(path: PathBuf) -> (PersisterHandle, JoinHandle<()>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(path, receiver));
    (PersisterHandle { sender }, task)
}

async fn run(path: PathBuf, mut receiver: mpsc::UnboundedReceiver<Configuration>) {
    debug!(path = %path.display(), "Config persister started");

    while let Some(config) = receiver.recv().await {
        let target = path.clone();
        let result = tokio::task::spawn_blocking(move || save(&target, &config)).await;

        match result {
            Ok(Ok(())) => info!(path = %path.display(), "Configuration saved"),
            Ok(Err(e)) => warn!(path = %path.display(), error = %e, "Failed to save configuration"),
            Err(e) => warn!(error = %e, "Configuration write task failed"),
        }
    }

    debug!("Config persister stopped");
}

fn save(path: &Path, config: &Configuration) -> io::Result<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    write_atomic(path, json.as_bytes())
}
