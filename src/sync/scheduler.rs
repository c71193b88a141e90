//! Per-entry scheduling: `Idle -> Waiting -> Evaluating -> Executing -> Waiting ...`
//! until the stop signal moves the task to `Stopped`.
//!
//! A cycle (evaluate, then copy with all its retries) always finishes before
//! the entry waits again, so one entry never has two copies in flight.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::{SyncConfig, SyncType};
use crate::error::SyncError;
use crate::ext_data::ExternalData;
use crate::runtime::StopSignal;
use crate::sync::executor::SyncExecutor;
use crate::sync::gating::gate;
use crate::sync::status::{CycleOutcome, SchedulerState, StatusBoard};
use crate::sync::watcher::ChangeWatcher;

/// Delay before retrying a watch on a path that could not be watched.
pub const WATCH_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Default quiet period for coalescing a burst of change notifications.
pub const DEFAULT_NOTIFY_SETTLE: Duration = Duration::from_millis(200);

pub struct SyncScheduler {
    entry: Arc<SyncConfig>,
    executor: Arc<SyncExecutor>,
    ext_data: ExternalData,
    stop: StopSignal,
    status: StatusBoard,
    notify_settle: Duration,
}

impl SyncScheduler {
    pub fn new(
        entry: Arc<SyncConfig>,
        executor: Arc<SyncExecutor>,
        ext_data: ExternalData,
        stop: StopSignal,
        status: StatusBoard,
    ) -> Self {
        Self {
            entry,
            executor,
            ext_data,
            stop,
            status,
            notify_settle: DEFAULT_NOTIFY_SETTLE,
        }
    }

    pub fn with_notify_settle(mut self, settle: Duration) -> Self {
        self.notify_settle = settle;
        self
    }

    /// Drive the entry until stop is requested.
    pub async fn run(self) {
        self.status.register(&self.entry.path);
        self.transition(SchedulerState::Idle);

        match self.entry.sync_type {
            SyncType::Periodic { periodicity } => self.run_periodic(periodicity).await,
            SyncType::Immediate => self.run_immediate().await,
        }

        self.transition(SchedulerState::Stopped);
    }

    async fn run_periodic(&self, periodicity: Duration) {
        loop {
            self.transition(SchedulerState::Waiting);
            if !self.stop.sleep(periodicity).await {
                return;
            }
            self.cycle().await;
            if self.stop.is_stopped() {
                return;
            }
        }
    }

    async fn run_immediate(&self) {
        loop {
            let Some(mut watcher) = self.open_watcher().await else {
                return;
            };
            self.transition(SchedulerState::Waiting);

            loop {
                let change = tokio::select! {
                    biased;
                    _ = self.stop.stopped() => return,
                    change = watcher.next_change() => change,
                };
                let Some(change) = change else {
                    debug!(path = %self.entry.path.display(), "watcher closed, re-establishing");
                    break;
                };
                debug!(path = %self.entry.path.display(), kind = ?change.kind, "change notification");

                if !self.stop.sleep(self.notify_settle).await {
                    return;
                }
                watcher.drain();

                self.cycle().await;
                if self.stop.is_stopped() {
                    return;
                }
                self.transition(SchedulerState::Waiting);
            }
        }
    }

    async fn open_watcher(&self) -> Option<ChangeWatcher> {
        let mut reported = false;
        loop {
            match ChangeWatcher::new(&self.entry.path, self.entry.is_directory()) {
                Ok(watcher) => return Some(watcher),
                Err(err) if !reported => {
                    warn!(path = %self.entry.path.display(), error = %err, "cannot watch path, will keep trying");
                    reported = true;
                }
                Err(err) => debug!(path = %self.entry.path.display(), error = %err, "watch still unavailable"),
            }
            if !self.stop.sleep(WATCH_RETRY_INTERVAL).await {
                return None;
            }
        }
    }

    /// Evaluate the gate for the current role and copy if permitted.
    async fn cycle(&self) {
        self.transition(SchedulerState::Evaluating);
        let role = self.ext_data.role();

        if !gate(self.entry.direction, role).permits() {
            debug!(
                path = %self.entry.path.display(),
                direction = %self.entry.direction,
                %role,
                "gated off for current role"
            );
            self.status.record(&self.entry.path, CycleOutcome::Skipped);
            return;
        }

        self.transition(SchedulerState::Executing);
        let outcome = match self.executor.execute_copy(&self.entry, role).await {
            Ok(outcome) => outcome,
            Err(SyncError::Cancelled) => CycleOutcome::Cancelled,
            Err(err) => CycleOutcome::Failed {
                attempts: self.entry.retry.total_attempts(),
                error: err.to_string(),
            },
        };
        self.status.record(&self.entry.path, outcome);
    }

    fn transition(&self, state: SchedulerState) {
        debug!(path = %self.entry.path.display(), ?state, "scheduler state");
        self.status.set_state(&self.entry.path, state);
    }
}
