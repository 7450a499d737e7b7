//! tempwatch daemon
//!
//! Polls hardware temperature, raises desktop alerts with an adaptive
//! cooldown, shows a tray indicator, and serves a live dashboard feed.
//!
//! # Usage
//!
//! ```bash
//! # Start in the foreground
//! tempwatchd
//!
//! # Listen on another address and use a specific config file
//! TEMPWATCH_BIND=0.0.0.0:18235 TEMPWATCH_CONFIG=./config.json tempwatchd
//!
//! # Enable debug logging
//! RUST_LOG=tempwatchd=debug tempwatchd
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown

fn main() -> anyhow::Result<()> {
    tempwatchd::run()
}
