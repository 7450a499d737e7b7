//! Opens URLs and files with the desktop's default handler.

use std::io;
use std::process::{Command, Stdio};

use tracing::debug;

/// Hands a URL or path to an external viewer.
pub trait Launcher: Send + Sync + 'static {
    /// Hands `target` to the viewer. May block until the viewer has
    /// accepted it; callers run this off the async runtime.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the viewer cannot be started.
    fn open(&self, target: &str) -> io::Result<()>;
}

/// Uses `xdg-open`, `open`, or `cmd /C start` depending on the platform.
///
/// These openers detach the real viewer and exit, so `open` waits for them
/// and reaps the child.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

impl SystemLauncher {
    fn command(target: &str) -> Command {
        if cfg!(target_os = "windows") {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", "start", ""]).arg(target);
            cmd
        } else if cfg!(target_os = "macos") {
            let mut cmd = Command::new("open");
            cmd.arg(target);
            cmd
        } else {
            let mut cmd = Command::new("xdg-open");
            cmd.arg(target);
            cmd
        }
    }
}

impl Launcher for SystemLauncher {
    fn open(&self, target: &str) -> io::Result<()> {
        run_opener(Self::command(target))
    }
}

/// Runs an opener to completion with stdio detached.
///
/// # Errors
///
/// Returns the spawn or wait error, or an error carrying the exit status if
/// the opener reports failure.
fn run_opener(mut cmd: Command) -> io::Result<()> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    let pid = child.id();
    let status = child.wait()?;
    debug!(pid, %status, "Opener exited");

    if status.success() {
        Ok(())
    } else {
        Err(io::Error::other(format!("opener exited with {status}")))
    }
}
