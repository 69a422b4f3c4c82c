//! Configuration and credential persistence.
//!
//! The OAuth client id/secret and the current token pair live in a single
//! JSON file under the user config dir. Saves are atomic (temp file +
//! rename) behind an advisory lock, so a refreshed token can never be lost
//! to a torn write even if two runs race.

use crate::api::auth::{OAuthToken, ObserverError, TokenObserver};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directory (under the user config dir) and file the config lives in.
const CONFIG_DIR: &str = "netatmo-sync";
const CONFIG_FILE: &str = "config.json";

/// Persisted configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// OAuth application client id.
    #[serde(default)]
    pub client_id: String,
    /// OAuth application client secret.
    #[serde(default)]
    pub client_secret: String,
    /// Current token pair, written back on every refresh.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<OAuthToken>,
}

/// Config errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Filesystem failure.
    #[error("IO error: {0}")]
    Io(String),

    /// The file exists but is not valid config JSON.
    #[error("config parse error: {0}")]
    Parse(String),

    /// No user config directory on this platform.
    #[error("no user config directory available")]
    NoConfigDir,

    /// Advisory lock could not be taken.
    #[error("lock error: {0}")]
    Lock(String),
}

/// Loads and saves the config file.
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    /// Store at an explicit path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default per-user location.
    pub fn open_default() -> Result<Self, ConfigError> {
        let dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(Self::new(dir.join(CONFIG_DIR).join(CONFIG_FILE)))
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the config; a missing file reads as the default (empty) config.
    pub fn load(&self) -> Result<Config, ConfigError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "no config file yet");
                return Ok(Config::default());
            }
            Err(e) => return Err(ConfigError::Io(e.to_string())),
        };
        serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Save the config atomically under an advisory lock.
    pub fn save(&self, config: &Config) -> Result<(), ConfigError> {
        let parent = self
            .path
            .parent()
            .ok_or_else(|| ConfigError::Io("config path has no parent".to_string()))?;
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;

        // Advisory lock guarding against a concurrent run saving a token
        // refresh at the same time; released on drop at the end of the save.
        let lock_path = self.path.with_extension("lock");
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .map_err(|e| ConfigError::Lock(e.to_string()))?;
        let mut lock = RwLock::new(lock_file);
        let _guard = lock
            .write()
            .map_err(|e| ConfigError::Lock(e.to_string()))?;

        let text = serde_json::to_string_pretty(config)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        tmp.write_all(text.as_bytes())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        tmp.persist(&self.path)
            .map_err(|e| ConfigError::Io(e.to_string()))?;

        debug!(path = %self.path.display(), "config saved");
        Ok(())
    }
}

impl TokenObserver for ConfigStore {
    fn token_refreshed(&self, token: &OAuthToken) -> Result<(), ObserverError> {
        let mut config = self.load()?;
        config.token = Some(token.clone());
        self.save(&config)?;
        Ok(())
    }
}
