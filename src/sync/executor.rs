//! One copy cycle for one entry, with retry.
//!
//! Every attempt starts again from the source as it is at that moment;
//! nothing carries over from a failed attempt. Exhausting the attempts is
//! reported to the caller and only affects this entry's current cycle.
//!
//! Directory attempts stage every candidate before committing any of them,
//! so an attempt that fails while staging leaves the destination tree as it
//! was.

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::config::{EntryKind, SyncConfig};
use crate::error::SyncError;
use crate::ext_data::{ExternalData, PeerLink, Role};
use crate::fs::{CopyResult, StagedCopy, Transport};
use crate::runtime::StopSignal;
use crate::sync::gating::TransferPlan;
use crate::sync::status::CycleOutcome;

pub struct SyncExecutor {
    transport: Arc<dyn Transport>,
    ext_data: ExternalData,
    stop: StopSignal,
}

impl SyncExecutor {
    pub fn new(transport: Arc<dyn Transport>, ext_data: ExternalData, stop: StopSignal) -> Self {
        Self {
            transport,
            ext_data,
            stop,
        }
    }

    /// Copy `entry` in the direction `role` permits.
    ///
    /// Returns [`CycleOutcome::Skipped`] when gated off, the last attempt's
    /// error once every attempt failed, and [`SyncError::Cancelled`] when a
    /// stop request interrupts the cycle.
    pub async fn execute_copy(&self, entry: &SyncConfig, role: Role) -> Result<CycleOutcome, SyncError> {
        let Some(plan) = TransferPlan::resolve(entry, role) else {
            return Ok(CycleOutcome::Skipped);
        };

        let total = entry.retry.total_attempts();
        let mut attempt = 1;
        loop {
            if self.stop.is_stopped() {
                return Err(SyncError::Cancelled);
            }

            let err = match self.attempt(entry, &plan).await {
                Ok(outcome) => {
                    match &outcome {
                        CycleOutcome::Copied { files, bytes } => info!(
                            path = %entry.path.display(),
                            from = %plan.from,
                            to = %plan.to,
                            files,
                            bytes,
                            attempt,
                            "synced"
                        ),
                        _ => debug!(path = %entry.path.display(), "destination already up to date"),
                    }
                    return Ok(outcome);
                }
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            if attempt >= total {
                error!(
                    path = %entry.path.display(),
                    attempts = total,
                    error = %err,
                    "sync failed, giving up until next cycle"
                );
                return Err(err);
            }

            warn!(
                path = %entry.path.display(),
                attempt,
                of = total,
                error = %err,
                retry_in = ?entry.retry.interval,
                "sync attempt failed"
            );
            if !self.stop.sleep(entry.retry.interval).await {
                return Err(SyncError::Cancelled);
            }
            attempt += 1;
        }
    }

    async fn attempt(&self, entry: &SyncConfig, plan: &TransferPlan) -> Result<CycleOutcome, SyncError> {
        let peer = self.ext_data.peer_link();
        match entry.kind {
            EntryKind::File => {
                let result = self.transport.copy_file(&plan.from, &plan.to, peer.as_ref()).await?;
                Ok(summarize([result]))
            }
            EntryKind::Directory => {
                let candidates: Vec<PathBuf> = self
                    .transport
                    .list_files(&plan.from, peer.as_ref())
                    .await?
                    .into_iter()
                    .filter(|relative| entry.filter.admits(relative))
                    .collect();
                let results = self.copy_tree(plan, &candidates, peer.as_ref()).await?;
                Ok(summarize(results))
            }
        }
    }

    async fn copy_tree(
        &self,
        plan: &TransferPlan,
        candidates: &[PathBuf],
        peer: Option<&PeerLink>,
    ) -> Result<Vec<CopyResult>, SyncError> {
        let mut staged = Vec::with_capacity(candidates.len());
        for relative in candidates {
            let step = if self.stop.is_stopped() {
                Err(SyncError::Cancelled)
            } else {
                self.transport
                    .stage_file(&plan.from.join(relative), &plan.to.join(relative), peer)
                    .await
            };
            match step {
                Ok(copy) => staged.push(copy),
                Err(err) => {
                    debug!(failed = %relative.display(), staged = staged.len(), "discarding staged copies");
                    self.discard_all(staged).await;
                    return Err(err);
                }
            }
        }

        let mut results = Vec::with_capacity(staged.len());
        let mut pending = staged.into_iter();
        while let Some(copy) = pending.next() {
            match self.transport.commit(copy, peer).await {
                Ok(result) => results.push(result),
                Err(err) => {
                    self.discard_all(pending).await;
                    return Err(err);
                }
            }
        }
        Ok(results)
    }

    async fn discard_all(&self, staged: impl IntoIterator<Item = StagedCopy>) {
        for copy in staged {
            self.transport.discard(copy).await;
        }
    }
}

fn summarize(results: impl IntoIterator<Item = CopyResult>) -> CycleOutcome {
    let (mut files, mut bytes) = (0usize, 0u64);
    for result in results {
        if let CopyResult::Copied { bytes: n } = result {
            files += 1;
            bytes += n;
        }
    }
    if files == 0 {
        CycleOutcome::Unchanged
    } else {
        CycleOutcome::Copied { files, bytes }
    }
}
