//! Modem configuration
//!
//! Device path, baud rate and response deadlines, passed explicitly to
//! [`ModemSession::open`](crate::protocol::ModemSession::open). Stored as JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::protocol::{DEFAULT_BAUD_RATE, DEFAULT_SEND_TIMEOUT_MS, DEFAULT_TIMEOUT_MS};

/// Errors loading or saving a configuration file
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid configuration in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Could not find a configuration directory")]
    NoConfigDir,
}

/// Connection settings for one modem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Serial device (e.g., "/dev/ttyUSB0" or "COM3")
    pub device: String,

    /// Baud rate
    pub baud_rate: u32,

    /// Deadline for a command's full response in milliseconds
    pub timeout_ms: u64,

    /// Deadline for sending a message in milliseconds
    pub send_timeout_ms: u64,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            device: "/dev/ttyUSB0".to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            send_timeout_ms: DEFAULT_SEND_TIMEOUT_MS,
        }
    }
}

impl ModemConfig {
    /// Default location, `<config dir>/sms-modem/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let base = dirs::config_dir()
            .or_else(dirs::home_dir)
            .ok_or(ConfigError::NoConfigDir)?;
        Ok(base.join("sms-modem").join("config.json"))
    }

    /// Load from a JSON file; missing keys take their defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("loaded modem config from {}", path.display());
        Ok(config)
    }

    /// Load from `path`, or the default location when `None`, falling back to
    /// defaults if the file doesn't exist
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::default_path()?,
        };
        if !path.exists() {
            debug!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    /// Write as pretty-printed JSON, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| io_err(io::Error::new(io::ErrorKind::InvalidData, e)))?;
        fs::write(path, content).map_err(io_err)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}
