//! Daemon settings, read from a TOML file.
//!
//! ```toml
//! entries_dir = "/usr/share/data-sync/entries"
//! state_file = "/run/data-sync/state.json"
//! role_refresh = "PT30S"
//! notify_settle = "PT0.2S"
//!
//! [transport]
//! kind = "rsync"
//! module = "data-sync"
//! port = 873
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::error::ConfigError;

pub const DEFAULT_ENTRIES_DIR: &str = "/usr/share/data-sync/entries";
pub const DEFAULT_STATE_FILE: &str = "/run/data-sync/state.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Rsync,
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TransportSettings {
    pub kind: TransportKind,
    /// rsync executable.
    pub binary: String,
    /// rsync daemon module exported by the peer, rooted at `/`.
    pub module: String,
    pub port: u16,
    pub timeout_secs: u64,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportKind::Rsync,
            binary: "rsync".to_string(),
            module: "data-sync".to_string(),
            port: 873,
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct RawSettings {
    entries_dir: PathBuf,
    state_file: PathBuf,
    role_refresh: Option<String>,
    notify_settle: String,
    transport: TransportSettings,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            entries_dir: PathBuf::from(DEFAULT_ENTRIES_DIR),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            role_refresh: None,
            notify_settle: "PT0.2S".to_string(),
            transport: TransportSettings::default(),
        }
    }
}

/// Resolved daemon settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub entries_dir: PathBuf,
    pub state_file: PathBuf,
    /// Re-fetch cadence for the node role; `None` fetches once at bootstrap.
    pub role_refresh: Option<Duration>,
    /// Quiet period used to coalesce change notifications.
    pub notify_settle: Duration,
    pub transport: TransportSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            entries_dir: PathBuf::from(DEFAULT_ENTRIES_DIR),
            state_file: PathBuf::from(DEFAULT_STATE_FILE),
            role_refresh: None,
            notify_settle: Duration::from_millis(200),
            transport: TransportSettings::default(),
        }
    }
}

impl Settings {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let raw: RawSettings = toml::from_str(text).map_err(|e| ConfigError::Settings(e.to_string()))?;
        Ok(Self {
            entries_dir: raw.entries_dir,
            state_file: raw.state_file,
            role_refresh: raw.role_refresh.as_deref().map(parse_duration).transpose()?,
            notify_settle: parse_duration(&raw.notify_settle)?,
            transport: raw.transport,
        })
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&text)
    }
}
