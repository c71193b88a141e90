use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::error::SyncError;
use crate::ext_data::PeerLink;

/// Where one side of a transfer lives.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Location {
    /// On this node.
    Local(PathBuf),
    /// On the sibling node.
    Peer(PathBuf),
}

impl Location {
    pub fn path(&self) -> &Path {
        match self {
            Location::Local(path) | Location::Peer(path) => path,
        }
    }

    pub fn is_peer(&self) -> bool {
        matches!(self, Location::Peer(_))
    }

    /// Same side, with `relative` appended.
    pub fn join(&self, relative: &Path) -> Location {
        match self {
            Location::Local(path) => Location::Local(path.join(relative)),
            Location::Peer(path) => Location::Peer(path.join(relative)),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Local(path) => write!(f, "{}", path.display()),
            Location::Peer(path) => write!(f, "peer:{}", path.display()),
        }
    }
}

/// Result of copying one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyResult {
    Copied { bytes: u64 },
    /// Destination already held identical content.
    Unchanged,
}

/// A copy prepared by [`Transport::stage_file`] but not yet visible at `to`.
#[derive(Debug)]
pub struct StagedCopy {
    pub to: Location,
    pub state: Staged,
}

#[derive(Debug)]
pub enum Staged {
    /// Destination already holds the content.
    Unchanged,
    /// Content sits in a local temp file beside the destination.
    Written { temp: PathBuf, bytes: u64 },
    /// Content is transferred at commit.
    Deferred { from: Location },
}

/// Pluggable copy primitive between this node and its sibling.
///
/// `peer` is `None` until the sibling's address and credentials resolve;
/// transports that need it must fail with [`SyncError::PeerUnavailable`].
///
/// Copies are two-phase: staging does the transfer without touching the
/// destination, commit makes it visible. A reader of the destination sees
/// either the old or the new content, never a partial write.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Relative paths of every regular file below the directory at `root`.
    async fn list_files(&self, root: &Location, peer: Option<&PeerLink>) -> Result<Vec<PathBuf>, SyncError>;

    async fn stage_file(
        &self,
        from: &Location,
        to: &Location,
        peer: Option<&PeerLink>,
    ) -> Result<StagedCopy, SyncError>;

    async fn commit(&self, staged: StagedCopy, peer: Option<&PeerLink>) -> Result<CopyResult, SyncError>;

    /// Drop a staged copy, leaving the destination untouched.
    async fn discard(&self, staged: StagedCopy);

    /// Stage and commit one file.
    async fn copy_file(
        &self,
        from: &Location,
        to: &Location,
        peer: Option<&PeerLink>,
    ) -> Result<CopyResult, SyncError> {
        let staged = self.stage_file(from, to, peer).await?;
        self.commit(staged, peer).await
    }

    /// Short name for logs.
    fn name(&self) -> &'static str;
}
