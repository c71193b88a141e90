//! External data read from a state document kept by the redundancy manager.
//!
//! ```json
//! { "Role": "Active", "PeerAddress": "10.0.0.2",
//!   "Credentials": { "Username": "sync", "Password": "..." } }
//! ```
//!
//! The document is re-read on every query so role changes written by the
//! redundancy manager are picked up by the next fetch.

use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::ExternalDataError;
use crate::ext_data::{Credentials, ExternalDataProvider, PeerAddress, Role};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StateDocument {
    role: Option<Role>,
    peer_address: Option<PeerAddress>,
    credentials: Option<Credentials>,
}

#[derive(Debug, Clone)]
pub struct FileExternalData {
    path: PathBuf,
}

impl FileExternalData {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read(&self) -> Result<StateDocument, ExternalDataError> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|source| ExternalDataError::Io { path: self.path.clone(), source })?;
        serde_json::from_str(&text).map_err(|e| ExternalDataError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ExternalDataProvider for FileExternalData {
    async fn fetch_role(&self) -> Result<Role, ExternalDataError> {
        self.read().await?.role.ok_or(ExternalDataError::Missing { field: "Role" })
    }

    async fn fetch_peer_address(&self) -> Result<PeerAddress, ExternalDataError> {
        self.read()
            .await?
            .peer_address
            .ok_or(ExternalDataError::Missing { field: "PeerAddress" })
    }

    async fn fetch_credentials(&self) -> Result<Credentials, ExternalDataError> {
        self.read()
            .await?
            .credentials
            .ok_or(ExternalDataError::Missing { field: "Credentials" })
    }
}
