//! Sync entry model and per-entry validation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::duration::parse_duration;
use crate::error::ConfigError;
use crate::sync::filter::{PathFilter, GLOB_PREFIX};

/// Which role is allowed to initiate a copy for an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncDirection {
    Active2Passive,
    Passive2Active,
    Bidirectional,
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Active2Passive => "Active2Passive",
            Self::Passive2Active => "Passive2Active",
            Self::Bidirectional => "Bidirectional",
        };
        f.write_str(name)
    }
}

/// When an entry is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncType {
    /// On change notifications for the path.
    Immediate,
    /// Every `periodicity`, never immediately on start.
    Periodic { periodicity: Duration },
}

/// Extra attempts after a failed copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self::default()
    }

    /// Total attempts per cycle, the first one included.
    pub fn total_attempts(&self) -> u32 {
        self.attempts.saturating_add(1)
    }
}

/// Whether the entry describes a single file or a directory tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    Directory,
}

/// One validated sync entry, identified by `path`.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub path: PathBuf,
    pub destination_path: Option<PathBuf>,
    pub description: Option<String>,
    pub direction: SyncDirection,
    pub sync_type: SyncType,
    pub retry: RetryPolicy,
    pub kind: EntryKind,
    pub filter: PathFilter,
}

impl SyncConfig {
    /// Counterpart location on the peer; mirrors `path` when unset.
    pub fn destination(&self) -> &Path {
        self.destination_path.as_deref().unwrap_or(&self.path)
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn periodicity(&self) -> Option<Duration> {
        match self.sync_type {
            SyncType::Periodic { periodicity } => Some(periodicity),
            SyncType::Immediate => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
enum RawSyncType {
    Immediate,
    Periodic,
}

/// Entry as written in the config document, before validation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct RawEntry {
    path: String,
    destination_path: Option<String>,
    description: Option<String>,
    sync_direction: SyncDirection,
    sync_type: RawSyncType,
    periodicity: Option<String>,
    retry_attempts: Option<u32>,
    retry_interval: Option<String>,
    exclude_files_list: Option<Vec<String>>,
    include_files_list: Option<Vec<String>>,
}

impl RawEntry {
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Check every cross-field rule and build the validated entry.
    pub(crate) fn validate(self, kind: EntryKind) -> Result<SyncConfig, ConfigError> {
        let path = absolute("Path", &self.path)?;
        let destination_path = self
            .destination_path
            .as_deref()
            .map(|dest| absolute("DestinationPath", dest))
            .transpose()?;

        let sync_type = match self.sync_type {
            RawSyncType::Immediate => SyncType::Immediate,
            RawSyncType::Periodic => {
                let literal = self
                    .periodicity
                    .as_deref()
                    .ok_or_else(|| ConfigError::MissingPeriodicity { path: self.path.clone() })?;
                let periodicity = parse_duration(literal)?;
                if periodicity.is_zero() {
                    return Err(ConfigError::ZeroPeriodicity { path: self.path.clone() });
                }
                SyncType::Periodic { periodicity }
            }
        };

        let attempts = self.retry_attempts.unwrap_or(0);
        let retry = if attempts > 0 {
            let literal = self
                .retry_interval
                .as_deref()
                .ok_or_else(|| ConfigError::MissingRetryInterval { path: self.path.clone() })?;
            RetryPolicy {
                attempts,
                interval: parse_duration(literal)?,
            }
        } else {
            RetryPolicy::none()
        };

        let has_lists = self.include_files_list.is_some() || self.exclude_files_list.is_some();
        let filter = match kind {
            EntryKind::File if has_lists => {
                return Err(ConfigError::FilterOnFile { path: self.path.clone() });
            }
            EntryKind::File => PathFilter::allow_all(),
            EntryKind::Directory => {
                let include = relative_list(&path, self.include_files_list.unwrap_or_default());
                let exclude = relative_list(&path, self.exclude_files_list.unwrap_or_default());
                PathFilter::new(&include, &exclude)?
            }
        };

        Ok(SyncConfig {
            path,
            destination_path,
            description: self.description,
            direction: self.sync_direction,
            sync_type,
            retry,
            kind,
            filter,
        })
    }
}

fn absolute(field: &'static str, value: &str) -> Result<PathBuf, ConfigError> {
    let path = PathBuf::from(value);
    if path.is_absolute() {
        Ok(path)
    } else {
        Err(ConfigError::RelativePath {
            field,
            value: value.to_string(),
        })
    }
}

/// Make list items relative to the entry root. Absolute items outside the
/// root just lose their leading separator. A `glob:` marker is kept.
fn relative_list(root: &Path, items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .filter_map(|item| {
            let (marker, body) = match item.strip_prefix(GLOB_PREFIX) {
                Some(body) => (GLOB_PREFIX, body),
                None => ("", item.as_str()),
            };
            let relative = match Path::new(body).strip_prefix(root) {
                Ok(rel) => rel.to_string_lossy().into_owned(),
                Err(_) => body.trim_start_matches('/').to_string(),
            };
            (!relative.is_empty()).then(|| format!("{marker}{relative}"))
        })
        .collect()
}
