//! Node role, sibling address and transfer credentials.
//!
//! The values come from an external authority through an
//! [`ExternalDataProvider`] and are published into [`ExternalData`], a shared
//! single-writer/many-reader state that scheduler tasks read on every cycle.

pub mod file;
pub mod mock;

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::error::ExternalDataError;

pub use file::FileExternalData;
pub use mock::{MockExternalData, MockReply};

/// Role of this node in the redundant pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
pub enum Role {
    Active,
    Passive,
    /// Before the first successful fetch, or after a failed one.
    #[default]
    Unknown,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Active => "Active",
            Role::Passive => "Passive",
            Role::Unknown => "Unknown",
        };
        f.write_str(name)
    }
}

/// Network identity of the sibling node (host name or IP address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct PeerAddress(pub String);

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Opaque credentials for authenticating transfers to the sibling.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything a transport needs to reach the sibling node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerLink {
    pub address: PeerAddress,
    pub credentials: Credentials,
}

/// Source of role, peer address and credentials.
///
/// Each query either returns a value, fails, or never completes; callers
/// must not block unrelated work on them.
#[async_trait]
pub trait ExternalDataProvider: Send + Sync {
    async fn fetch_role(&self) -> Result<Role, ExternalDataError>;

    async fn fetch_peer_address(&self) -> Result<PeerAddress, ExternalDataError>;

    async fn fetch_credentials(&self) -> Result<Credentials, ExternalDataError>;
}

/// Shared, latest-known external data.
#[derive(Debug, Clone)]
pub struct ExternalData {
    role: Arc<watch::Sender<Role>>,
    peer_address: Arc<watch::Sender<Option<PeerAddress>>>,
    credentials: Arc<watch::Sender<Option<Credentials>>>,
}

impl Default for ExternalData {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternalData {
    pub fn new() -> Self {
        Self {
            role: Arc::new(watch::Sender::new(Role::Unknown)),
            peer_address: Arc::new(watch::Sender::new(None)),
            credentials: Arc::new(watch::Sender::new(None)),
        }
    }

    /// Current role, re-read on every evaluation.
    pub fn role(&self) -> Role {
        *self.role.borrow()
    }

    pub fn set_role(&self, role: Role) {
        let previous = self.role.send_replace(role);
        if previous != role {
            info!(%previous, current = %role, "node role changed");
        }
    }

    pub fn subscribe_role(&self) -> watch::Receiver<Role> {
        self.role.subscribe()
    }

    pub fn peer_address(&self) -> Option<PeerAddress> {
        self.peer_address.borrow().clone()
    }

    pub fn credentials(&self) -> Option<Credentials> {
        self.credentials.borrow().clone()
    }

    /// Peer address and credentials, once both resolved.
    pub fn peer_link(&self) -> Option<PeerLink> {
        Some(PeerLink {
            address: self.peer_address()?,
            credentials: self.credentials()?,
        })
    }

    /// Fetch the role; a failure resets it to [`Role::Unknown`].
    pub async fn refresh_role(&self, provider: &dyn ExternalDataProvider) {
        match provider.fetch_role().await {
            Ok(role) => self.set_role(role),
            Err(err) => {
                warn!(error = %err, "failed to fetch node role");
                self.set_role(Role::Unknown);
            }
        }
    }

    pub async fn refresh_peer_address(&self, provider: &dyn ExternalDataProvider) {
        match provider.fetch_peer_address().await {
            Ok(address) => {
                info!(peer = %address, "resolved sibling address");
                self.peer_address.send_replace(Some(address));
            }
            Err(err) => warn!(error = %err, "failed to fetch sibling address"),
        }
    }

    pub async fn refresh_credentials(&self, provider: &dyn ExternalDataProvider) {
        match provider.fetch_credentials().await {
            Ok(credentials) => {
                self.credentials.send_replace(Some(credentials));
            }
            Err(err) => warn!(error = %err, "failed to fetch transfer credentials"),
        }
    }
}
