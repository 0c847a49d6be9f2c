//! Engine settings: join-sync delay and verbose tracing.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// TraceConfig
// ---------------------------------------------------------------------------

/// Verbose relay tracing, for diagnosing "my friend can't see my model"
/// reports in the field.
///
/// Everything here is off by default; with `enabled = false` the engine
/// only logs header-decode warnings.
///
/// `#[serde(default)]` lets a config file set any subset of fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfig {
    /// Log every received/forwarded message and every synthesized sync.
    pub enabled: bool,

    /// Render at most this many leading bytes of each message as hex.
    /// 0 disables hex output.
    pub payload_hex_max_bytes: usize,

    /// Log one line per recipient on every broadcast. Very noisy.
    pub log_recipients: bool,
}

// ---------------------------------------------------------------------------
// EngineConfig
// ---------------------------------------------------------------------------

/// Settings for a [`RelayEngine`](crate::RelayEngine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// How long to wait after a participant joins before pushing cached
    /// models to them. Many clients finish registering their channels
    /// only after entering the world and drop anything sent earlier.
    pub join_sync_delay: Duration,

    /// Verbose tracing settings.
    pub trace: TraceConfig,
}

impl EngineConfig {
    /// Default join-sync delay: one second (20 server ticks).
    pub const DEFAULT_JOIN_SYNC_DELAY: Duration = Duration::from_secs(1);
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            join_sync_delay: Self::DEFAULT_JOIN_SYNC_DELAY,
            trace: TraceConfig::default(),
        }
    }
}

/// Renders up to `max` leading bytes of `data` as lowercase hex pairs
/// separated by spaces. `None` when there is nothing to render.
pub fn hex_preview(data: &[u8], max: usize) -> Option<String> {
    if max == 0 || data.is_empty() {
        return None;
    }
    let shown = &data[..max.min(data.len())];
    let mut out = String::with_capacity(shown.len() * 3);
    for (i, byte) in shown.iter().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{byte:02x}"));
    }
    Some(out)
}
