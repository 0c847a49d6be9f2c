//! Relay configuration, loaded from a JSON file.
//!
//! ```json
//! {
//!   "bind": "0.0.0.0:25580",
//!   "join_sync_delay_ms": 1000,
//!   "debug": {
//!     "enabled": true,
//!     "payload_hex_max_bytes": 64,
//!     "log_recipients": false
//!   }
//! }
//! ```
//!
//! Every field is optional; missing fields take their defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use avatar_relay_engine::{EngineConfig, TraceConfig};
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading a [`RelayConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The text is not valid JSON for a `RelayConfig`.
    #[error("invalid config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level relay settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,

    /// Delay before cached models are pushed to a newly joined
    /// participant, in milliseconds.
    pub join_sync_delay_ms: u64,

    /// Verbose relay tracing.
    pub debug: TraceConfig,
}

impl RelayConfig {
    pub const DEFAULT_BIND: &'static str = "127.0.0.1:25580";

    /// Reads and parses a config file.
    ///
    /// # Errors
    /// [`ConfigError::Read`] if the file cannot be read,
    /// [`ConfigError::Parse`] if its contents are invalid.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Parses a config from JSON text.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    /// The engine settings this config describes.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            join_sync_delay: Duration::from_millis(self.join_sync_delay_ms),
            trace: self.debug.clone(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind: Self::DEFAULT_BIND.to_string(),
            join_sync_delay_ms: 1000,
            debug: TraceConfig::default(),
        }
    }
}
