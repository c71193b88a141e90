use async_trait::async_trait;
use jwalk::WalkDir;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::SyncError;
use crate::ext_data::PeerLink;
use crate::fs::backend::{CopyResult, Location, Staged, StagedCopy, Transport};
use crate::sync::hash::holds_content;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Transport that resolves both sides on the local filesystem.
///
/// Used when the sibling's storage is mounted locally, and in tests; peer
/// locations are treated as plain local paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalTransport;

impl LocalTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for LocalTransport {
    async fn list_files(&self, root: &Location, _peer: Option<&PeerLink>) -> Result<Vec<PathBuf>, SyncError> {
        let root = root.path().to_path_buf();
        tokio::task::spawn_blocking(move || walk_files(&root))
            .await
            .map_err(|e| SyncError::Transfer(format!("directory walk aborted: {e}")))?
    }

    async fn stage_file(
        &self,
        from: &Location,
        to: &Location,
        _peer: Option<&PeerLink>,
    ) -> Result<StagedCopy, SyncError> {
        let src = from.path();
        let dst = to.path();

        let meta = tokio::fs::metadata(src).await.map_err(|e| SyncError::io(src, e))?;
        if !meta.is_file() {
            return Err(SyncError::io(src, std::io::Error::other("not a regular file")));
        }

        let data = tokio::fs::read(src).await.map_err(|e| SyncError::io(src, e))?;
        if holds_content(dst, &data).await? {
            return Ok(StagedCopy {
                to: to.clone(),
                state: Staged::Unchanged,
            });
        }

        let temp = write_temp(dst, &data, Some(meta.permissions())).await?;
        Ok(StagedCopy {
            to: to.clone(),
            state: Staged::Written {
                temp,
                bytes: data.len() as u64,
            },
        })
    }

    async fn commit(&self, staged: StagedCopy, _peer: Option<&PeerLink>) -> Result<CopyResult, SyncError> {
        commit_local(staged).await
    }

    async fn discard(&self, staged: StagedCopy) {
        discard_local(staged).await;
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// Relative paths of all regular files below `root`, sorted. Symlinks and
/// special files (FIFOs, sockets, devices) are skipped.
fn walk_files(root: &Path) -> Result<Vec<PathBuf>, SyncError> {
    let meta = std::fs::metadata(root).map_err(|e| SyncError::io(root, e))?;
    if !meta.is_dir() {
        return Err(SyncError::io(root, std::io::Error::other("not a directory")));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(root)
        .skip_hidden(false)
        .follow_links(false)
        .sort(true)
        .parallelism(jwalk::Parallelism::Serial)
    {
        let entry = entry.map_err(|e| SyncError::io(root, std::io::Error::other(e)))?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            continue;
        }
        let path = entry.path();
        if !file_type.is_file() {
            debug!(path = %path.display(), "skipping non-regular file");
            continue;
        }
        if let Ok(relative) = path.strip_prefix(root) {
            files.push(relative.to_path_buf());
        }
    }
    files.sort();
    Ok(files)
}

/// Hidden temp name beside `dst`, unique within this process.
pub(crate) fn temp_path_for(dst: &Path) -> PathBuf {
    let temp_name = format!(
        ".{}.{}.{}.tmp",
        dst.file_name().map(|n| n.to_string_lossy()).unwrap_or_default(),
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    );
    dst.with_file_name(temp_name)
}

/// Write `data` to a fsynced temp file beside `dst` and return its path.
/// The temp file is removed if any step fails.
pub async fn write_temp(
    dst: &Path,
    data: &[u8],
    permissions: Option<std::fs::Permissions>,
) -> Result<PathBuf, SyncError> {
    let parent = dst.parent().unwrap_or_else(|| Path::new("/"));
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| SyncError::io(parent, e))?;

    let temp_path = temp_path_for(dst);
    let result = async {
        let mut file = tokio::fs::File::create(&temp_path)
            .await
            .map_err(|e| SyncError::io(&temp_path, e))?;
        file.write_all(data).await.map_err(|e| SyncError::io(&temp_path, e))?;
        file.sync_all().await.map_err(|e| SyncError::io(&temp_path, e))?;
        drop(file);

        if let Some(permissions) = permissions {
            tokio::fs::set_permissions(&temp_path, permissions)
                .await
                .map_err(|e| SyncError::io(&temp_path, e))?;
        }
        Ok::<(), SyncError>(())
    }
    .await;

    match result {
        Ok(()) => Ok(temp_path),
        Err(err) => {
            let _ = tokio::fs::remove_file(&temp_path).await;
            Err(err)
        }
    }
}

/// Rename a locally staged temp file over its destination.
pub(crate) async fn commit_local(staged: StagedCopy) -> Result<CopyResult, SyncError> {
    let dst = staged.to.path();
    match staged.state {
        Staged::Unchanged => Ok(CopyResult::Unchanged),
        Staged::Written { temp, bytes } => match tokio::fs::rename(&temp, dst).await {
            Ok(()) => Ok(CopyResult::Copied { bytes }),
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp).await;
                Err(SyncError::io(dst, e))
            }
        },
        Staged::Deferred { from } => Err(SyncError::Transfer(format!(
            "copy from {from} to {} was never staged locally",
            staged.to
        ))),
    }
}

pub(crate) async fn discard_local(staged: StagedCopy) {
    if let Staged::Written { temp, .. } = staged.state {
        if let Err(err) = tokio::fs::remove_file(&temp).await {
            debug!(path = %temp.display(), error = %err, "failed to remove staged file");
        }
    }
}
