//! Process settings and configuration file loading.
//!
//! Settings come from the environment; the monitor [`Configuration`] comes
//! from a JSON file that is created with defaults on first start.

use std::env;
use std::fs;
use std::io;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tempwatch_core::Configuration;
use tempwatch_protocol::routes::DEFAULT_BIND;
use thiserror::Error;
use tracing::{info, warn};

use crate::persist::write_atomic;

pub const ENV_BIND: &str = "TEMPWATCH_BIND";
pub const ENV_CONFIG: &str = "TEMPWATCH_CONFIG";
pub const ENV_SENSOR_FILTER: &str = "TEMPWATCH_SENSOR_FILTER";
pub const ENV_TRAY: &str = "TEMPWATCH_TRAY";
pub const ENV_NOTIFIER: &str = "TEMPWATCH_NOTIFIER";

const APP_DIR: &str = "tempwatch";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("invalid {var} value '{value}': {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: String,
    },

    #[error("no configuration directory available; set TEMPWATCH_CONFIG")]
    NoConfigDir,

    #[error("failed to write default configuration to {path}: {source}")]
    WriteDefaults {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ============================================================================
// Modes
// ============================================================================

/// Which tray backend to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrayMode {
    #[default]
    Headless,
    Native,
}

impl FromStr for TrayMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "headless" => Ok(Self::Headless),
            "native" => Ok(Self::Native),
            other => Err(format!("expected 'headless' or 'native', got '{other}'")),
        }
    }
}

/// Which primary notifier to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NotifierMode {
    #[default]
    Desktop,
    Console,
}

impl FromStr for NotifierMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "desktop" => Ok(Self::Desktop),
            "console" => Ok(Self::Console),
            other => Err(format!("expected 'desktop' or 'console', got '{other}'")),
        }
    }
}

// ============================================================================
// Settings
// ============================================================================

/// Process-level settings that are not part of the persisted configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub bind: SocketAddr,
    pub config_path: PathBuf,
    pub sensor_filter: Option<String>,
    pub tray: TrayMode,
    pub notifier: NotifierMode,
}

impl Settings {
    /// Reads settings from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if a variable holds an unparseable value or
    /// no config location can be determined.
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through an arbitrary lookup function.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_raw = lookup(ENV_BIND).unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw
            .parse::<SocketAddr>()
            .map_err(|e| SettingsError::InvalidValue {
                var: ENV_BIND,
                value: bind_raw.clone(),
                reason: e.to_string(),
            })?;

        let config_path = match lookup(ENV_CONFIG) {
            Some(path) if !path.trim().is_empty() => PathBuf::from(path),
            _ => default_config_path().ok_or(SettingsError::NoConfigDir)?,
        };

        let sensor_filter = lookup(ENV_SENSOR_FILTER).filter(|f| !f.trim().is_empty());

        let tray = parse_mode(&lookup, ENV_TRAY)?;
        let notifier = parse_mode(&lookup, ENV_NOTIFIER)?;

        Ok(Self {
            bind,
            config_path,
            sensor_filter,
            tray,
            notifier,
        })
    }

    /// URL of the dashboard served on the bind address.
    pub fn dashboard_url(&self) -> String {
        format!("http://{}/", self.bind)
    }
}

fn parse_mode<F, T>(lookup: &F, var: &'static str) -> Result<T, SettingsError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr<Err = String> + Default,
{
    match lookup(var) {
        Some(value) => value.parse().map_err(|reason| SettingsError::InvalidValue {
            var,
            value,
            reason,
        }),
        None => Ok(T::default()),
    }
}

/// `<config dir>/tempwatch/config.json`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.json"))
}

/// `<local data dir>/tempwatch/tempwatch.log`, falling back to the temp dir.
pub fn default_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(env::temp_dir)
        .join(APP_DIR)
        .join("tempwatch.log")
}

/// Effective log file location for a configuration.
pub fn log_path(config: &Configuration) -> PathBuf {
    config
        .log_file_path
        .as_deref()
        .map(PathBuf::from)
        .unwrap_or_else(default_log_path)
}

// ============================================================================
// Configuration File
// ============================================================================

/// Loads the configuration file.
///
/// A missing file is created with defaults. A file that cannot be read or
/// parsed is left untouched and defaults are used.
///
/// # Errors
///
/// Returns `SettingsError::WriteDefaults` only if creating a missing file
/// fails.
pub fn load_configuration(path: &Path) -> Result<Configuration, SettingsError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(parse_or_default(path, &contents)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let config = Configuration::default();
            write_defaults(path, &config)?;
            info!(path = %path.display(), "Created default configuration");
            Ok(config)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read configuration, using defaults");
            Ok(Configuration::default())
        }
    }
}

fn parse_or_default(path: &Path, contents: &str) -> Configuration {
    match Configuration::from_json(contents) {
        Ok(config) => {
            info!(
                path = %path.display(),
                threshold = config.temperature_threshold_c,
                poll_interval_sec = config.poll_interval_sec,
                "Loaded configuration"
            );
            config
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Invalid configuration, using defaults");
            Configuration::default()
        }
    }
}

fn write_defaults(path: &Path, config: &Configuration) -> Result<(), SettingsError> {
    let json = serde_json::to_string_pretty(config).map_err(|e| SettingsError::WriteDefaults {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::InvalidData, e),
    })?;
    write_atomic(path, json.as_bytes()).map_err(|source| SettingsError::WriteDefaults {
        path: path.to_path_buf(),
        source,
    })
}
