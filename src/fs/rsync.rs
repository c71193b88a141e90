//! Remote transport driving `rsync` against the sibling node's rsync daemon.
//!
//! Peer paths become `rsync://user@host:port/module/<absolute path>`; the
//! module is expected to be rooted at `/`. rsync writes into a temp file and
//! renames it, so each destination is replaced atomically.
//!
//! Pulls are staged into a local temp file and committed by rename. Pushes
//! can only be renamed by the remote rsync, so their upload runs at commit
//! time; a peer lost in the middle of a directory commit keeps the files
//! already uploaded until the next cycle.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use crate::config::TransportSettings;
use crate::error::SyncError;
use crate::ext_data::PeerLink;
use crate::fs::backend::{CopyResult, Location, Staged, StagedCopy, Transport};
use crate::fs::local::{commit_local, discard_local, temp_path_for};
use crate::sync::hash::holds_content;

#[derive(Debug, Clone)]
pub struct RsyncTransport {
    binary: String,
    module: String,
    port: u16,
    timeout: Duration,
}

impl RsyncTransport {
    pub fn new(settings: &TransportSettings) -> Self {
        Self {
            binary: settings.binary.clone(),
            module: settings.module.clone(),
            port: settings.port,
            timeout: Duration::from_secs(settings.timeout_secs),
        }
    }

    fn remote_url(&self, link: &PeerLink, path: &Path) -> String {
        let host = &link.address.0;
        let host = if host.contains(':') {
            format!("[{host}]")
        } else {
            host.clone()
        };
        let path = path.to_string_lossy();
        format!(
            "rsync://{}@{}:{}/{}/{}",
            link.credentials.username,
            host,
            self.port,
            self.module,
            path.trim_start_matches('/')
        )
    }

    fn endpoint(&self, location: &Location, peer: Option<&PeerLink>) -> Result<String, SyncError> {
        match location {
            Location::Local(path) => Ok(path.to_string_lossy().into_owned()),
            Location::Peer(path) => {
                let link = peer.ok_or(SyncError::PeerUnavailable)?;
                Ok(self.remote_url(link, path))
            }
        }
    }

    fn copy_args(&self, from: String, to: String) -> Vec<String> {
        vec![
            "--archive".to_string(),
            "--checksum".to_string(),
            "--mkpath".to_string(),
            format!("--timeout={}", self.timeout.as_secs()),
            "--out-format=%l".to_string(),
            from,
            to,
        ]
    }

    fn list_args(&self, root: String) -> Vec<String> {
        vec![
            "--list-only".to_string(),
            "--recursive".to_string(),
            format!("--timeout={}", self.timeout.as_secs()),
            format!("{}/", root.trim_end_matches('/')),
        ]
    }

    async fn run(&self, args: Vec<String>, peer: Option<&PeerLink>) -> Result<String, SyncError> {
        debug!(binary = %self.binary, ?args, "running rsync");
        let mut command = Command::new(&self.binary);
        command.args(&args).kill_on_drop(true);
        if let Some(link) = peer {
            command.env("RSYNC_PASSWORD", &link.credentials.password);
        }

        let output = command
            .output()
            .await
            .map_err(|e| SyncError::Transfer(format!("failed to start {}: {e}", self.binary)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).into_owned())
        } else {
            let peer_name = peer.map(|l| l.address.0.clone()).unwrap_or_else(|| "local".to_string());
            Err(classify_exit(
                output.status.code(),
                &String::from_utf8_lossy(&output.stderr),
                peer_name,
            ))
        }
    }
}

/// Map an rsync exit code onto the sync error taxonomy.
fn classify_exit(code: Option<i32>, stderr: &str, peer: String) -> SyncError {
    let reason = stderr.trim().to_string();
    match code {
        Some(5) => SyncError::Authentication { peer },
        Some(10 | 12 | 30 | 35) => SyncError::PeerUnreachable { peer, reason },
        Some(code) => SyncError::Transfer(format!("rsync exited with {code}: {reason}")),
        None => SyncError::Transfer(format!("rsync killed by signal: {reason}")),
    }
}

/// Regular file paths from `rsync --list-only --recursive` output.
fn parse_listing(stdout: &str) -> Vec<PathBuf> {
    stdout
        .lines()
        .filter(|line| line.starts_with('-'))
        .filter_map(|line| skip_fields(line, 4))
        .map(PathBuf::from)
        .collect()
}

fn skip_fields(line: &str, count: usize) -> Option<&str> {
    let mut rest = line.trim_start();
    for _ in 0..count {
        let idx = rest.find(char::is_whitespace)?;
        rest = rest[idx..].trim_start();
    }
    (!rest.is_empty()).then_some(rest)
}

#[async_trait]
impl Transport for RsyncTransport {
    async fn list_files(&self, root: &Location, peer: Option<&PeerLink>) -> Result<Vec<PathBuf>, SyncError> {
        let root = self.endpoint(root, peer)?;
        let stdout = self.run(self.list_args(root), peer).await?;
        Ok(parse_listing(&stdout))
    }

    async fn stage_file(
        &self,
        from: &Location,
        to: &Location,
        peer: Option<&PeerLink>,
    ) -> Result<StagedCopy, SyncError> {
        if to.is_peer() {
            if let Location::Local(src) = from {
                let meta = tokio::fs::metadata(src).await.map_err(|e| SyncError::io(src, e))?;
                if !meta.is_file() {
                    return Err(SyncError::io(src, std::io::Error::other("not a regular file")));
                }
            }
            return Ok(StagedCopy {
                to: to.clone(),
                state: Staged::Deferred { from: from.clone() },
            });
        }

        let dst = to.path();
        let parent = dst.parent().unwrap_or_else(|| Path::new("/"));
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| SyncError::io(parent, e))?;

        let temp = temp_path_for(dst);
        let staged = async {
            let args = self.copy_args(self.endpoint(from, peer)?, temp.to_string_lossy().into_owned());
            self.run(args, peer).await?;
            let data = tokio::fs::read(&temp).await.map_err(|e| SyncError::io(&temp, e))?;
            let state = if holds_content(dst, &data).await? {
                let _ = tokio::fs::remove_file(&temp).await;
                Staged::Unchanged
            } else {
                Staged::Written {
                    temp: temp.clone(),
                    bytes: data.len() as u64,
                }
            };
            Ok::<_, SyncError>(StagedCopy { to: to.clone(), state })
        }
        .await;

        if staged.is_err() {
            let _ = tokio::fs::remove_file(&temp).await;
        }
        staged
    }

    async fn commit(&self, staged: StagedCopy, peer: Option<&PeerLink>) -> Result<CopyResult, SyncError> {
        let StagedCopy { to, state } = staged;
        let from = match state {
            Staged::Deferred { from } => from,
            state => return commit_local(StagedCopy { to, state }).await,
        };
        let args = self.copy_args(self.endpoint(&from, peer)?, self.endpoint(&to, peer)?);
        let stdout = self.run(args, peer).await?;

        let bytes: u64 = stdout.lines().filter_map(|l| l.trim().parse::<u64>().ok()).sum();
        if stdout.trim().is_empty() {
            Ok(CopyResult::Unchanged)
        } else {
            Ok(CopyResult::Copied { bytes })
        }
    }

    async fn discard(&self, staged: StagedCopy) {
        discard_local(staged).await;
    }

    fn name(&self) -> &'static str {
        "rsync"
    }
}
