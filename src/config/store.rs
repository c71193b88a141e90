//! Loading and lookup of the configured sync entries.
//!
//! Loading degrades gracefully: an unreadable document or a malformed entry
//! is logged and skipped, the remaining entries are still tracked.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::entry::{EntryKind, RawEntry, SyncConfig};
use crate::error::ConfigError;

/// Top-level shape of a config document. Entries stay untyped here so that
/// one malformed entry cannot fail the whole document.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Document {
    #[serde(default)]
    files: Vec<serde_json::Value>,
    #[serde(default)]
    directories: Vec<serde_json::Value>,
}

/// Validated entries keyed by their `Path`.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    entries: BTreeMap<PathBuf, Arc<SyncConfig>>,
    rejected: Vec<String>,
}

impl ConfigStore {
    /// Load every `*.json` document in `dir`, in file name order.
    pub async fn load_dir(dir: &Path) -> Result<Self, ConfigError> {
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|source| ConfigError::Read { path: dir.to_path_buf(), source })?;

        let mut documents = Vec::new();
        loop {
            match read_dir.next_entry().await {
                Ok(Some(entry)) => {
                    let path = entry.path();
                    if path.extension().is_some_and(|ext| ext == "json") {
                        documents.push(path);
                    }
                }
                Ok(None) => break,
                Err(source) => {
                    return Err(ConfigError::Read { path: dir.to_path_buf(), source });
                }
            }
        }
        documents.sort();

        let mut store = Self::default();
        for path in documents {
            let text = match tokio::fs::read_to_string(&path).await {
                Ok(text) => text,
                Err(source) => {
                    let err = ConfigError::Read { path: path.clone(), source };
                    warn!(error = %err, "skipping unreadable config document");
                    store.rejected.push(err.to_string());
                    continue;
                }
            };
            if let Err(err) = store.merge_document(&path, &text) {
                warn!(error = %err, "skipping malformed config document");
                store.rejected.push(err.to_string());
            }
        }

        info!(
            dir = %dir.display(),
            entries = store.len(),
            rejected = store.rejected.len(),
            "loaded data sync configuration"
        );
        Ok(store)
    }

    /// Load a single document from text.
    pub fn load_str(text: &str) -> Result<Self, ConfigError> {
        let mut store = Self::default();
        store.merge_document(Path::new("<inline>"), text)?;
        Ok(store)
    }

    fn merge_document(&mut self, origin: &Path, text: &str) -> Result<(), ConfigError> {
        let document: Document = serde_json::from_str(text).map_err(|source| ConfigError::Document {
            path: origin.to_path_buf(),
            source,
        })?;

        let tagged = document
            .files
            .into_iter()
            .map(|v| (EntryKind::File, v))
            .chain(document.directories.into_iter().map(|v| (EntryKind::Directory, v)));

        for (kind, value) in tagged {
            match self.insert_value(kind, value) {
                Ok(path) => debug!(path = %path.display(), ?kind, "accepted sync entry"),
                Err(err) => {
                    warn!(document = %origin.display(), error = %err, "rejected sync entry");
                    self.rejected.push(err.to_string());
                }
            }
        }
        Ok(())
    }

    fn insert_value(&mut self, kind: EntryKind, value: serde_json::Value) -> Result<PathBuf, ConfigError> {
        let raw: RawEntry = serde_json::from_value(value)?;
        if self.entries.contains_key(Path::new(raw.path())) {
            return Err(ConfigError::Duplicate { path: raw.path().to_string() });
        }
        let entry = raw.validate(kind)?;
        let path = entry.path.clone();
        self.entries.insert(path.clone(), Arc::new(entry));
        Ok(path)
    }

    /// Whether an entry with this identity is held.
    pub fn contains(&self, path: &Path) -> bool {
        self.entries.contains_key(path)
    }

    /// Containment keyed by a config descriptor (an entry object as written
    /// in the document); its `Path` field is the identity.
    pub fn contains_descriptor(&self, descriptor: &serde_json::Value) -> bool {
        descriptor
            .get("Path")
            .and_then(serde_json::Value::as_str)
            .is_some_and(|path| self.contains(Path::new(path)))
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<SyncConfig>> {
        self.entries.get(path)
    }

    pub fn entries(&self) -> impl Iterator<Item = &Arc<SyncConfig>> {
        self.entries.values()
    }

    /// Reasons for every entry or document rejected while loading.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
