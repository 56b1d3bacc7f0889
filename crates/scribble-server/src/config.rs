//! Configuration file loading
//!
//! One TOML file configures the whole server:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:8000"
//!
//! [game.evaluation]
//! pass_threshold = 0.7
//!
//! [openai]
//! vision_model = "gpt-4o"
//! ```
//!
//! Every table is optional. The API key normally comes from `OPENAI_API_KEY`.

use scribble_core::config::{ConfigError, GameConfig};
use scribble_openai::OpenAiConfig;
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Failures while loading configuration
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// File exists but could not be read
    #[error("failed to read {}: {source}", path.display())]
    Read {
        /// File path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// File is not valid TOML for this schema
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        /// File path
        path: PathBuf,
        /// Underlying TOML error
        #[source]
        source: toml::de::Error,
    },

    /// Values parsed but are out of range
    #[error("invalid configuration: {0}")]
    Invalid(#[from] ConfigError),
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Listen address
    pub bind: SocketAddr,
    /// Interval between expired-session sweeps
    pub sweep_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8000)),
            sweep_interval_secs: 60,
        }
    }
}

/// Everything the binary needs
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener
    pub server: ServerSettings,
    /// Game rules
    pub game: GameConfig,
    /// Capability backend
    pub openai: OpenAiConfig,
}

impl ServerConfig {
    /// Load from `path`; a missing file yields defaults
    ///
    /// # Errors
    /// `Read` or `Parse` when the file exists but is unusable
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(LoadError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        toml::from_str(&text).map_err(|source| LoadError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Override the API key when `key` is set and non-empty
    #[must_use]
    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        if let Some(key) = key.filter(|k| !k.trim().is_empty()) {
            self.openai.api_key = Some(key);
        }
        self
    }

    /// Check game rules and server settings
    ///
    /// # Errors
    /// The first out-of-range setting
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.game.validate()?;
        if self.server.sweep_interval_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "server.sweep_interval_secs",
                message: "must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Session sweep interval
    #[inline]
    #[must_use]
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.server.sweep_interval_secs)
    }

    /// Effective configuration as TOML, without the API key
    ///
    /// # Errors
    /// Serialization failure
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
