//! Shared state store.
//!
//! The only state shared across threads. Readers get a consistent copy;
//! writers replace whole values under a short exclusive lock. The lock is
//! never held across an `.await`.

use std::sync::Arc;

use parking_lot::RwLock;
use tempwatch_core::{ConfigError, Configuration, Reading};

/// Everything the store holds, copied out as a unit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SharedState {
    pub config: Configuration,
    pub reading: Option<Reading>,
    pub monitoring_paused: bool,
}

/// Cheap-to-clone handle to the shared state.
#[derive(Debug, Clone, Default)]
pub struct StateStore {
    inner: Arc<RwLock<SharedState>>,
}

impl StateStore {
    /// Creates a store seeded with `config`.
    pub fn new(config: Configuration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(SharedState {
                config,
                ..SharedState::default()
            })),
        }
    }

    /// Consistent copy of the whole state.
    pub fn snapshot(&self) -> SharedState {
        self.inner.read().clone()
    }

    /// Current configuration.
    pub fn config(&self) -> Configuration {
        self.inner.read().config.clone()
    }

    pub fn is_paused(&self) -> bool {
        self.inner.read().monitoring_paused
    }

    /// Validates and installs a new configuration.
    ///
    /// Returns the configuration it replaced.
    ///
    /// # Errors
    ///
    /// Returns the validation error; the stored value is unchanged.
    pub fn replace_config(&self, config: Configuration) -> Result<Configuration, ConfigError> {
        config.validate()?;
        let mut state = self.inner.write();
        Ok(std::mem::replace(&mut state.config, config))
    }

    /// Stores the latest reading.
    pub fn record_reading(&self, reading: Reading) {
        self.inner.write().reading = Some(reading);
    }

    /// Sets the pause flag, returning the previous value.
    pub fn set_paused(&self, paused: bool) -> bool {
        std::mem::replace(&mut self.inner.write().monitoring_paused, paused)
    }
}
