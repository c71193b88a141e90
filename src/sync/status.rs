//! Per-entry sync status, the observable record of every cycle.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};

/// Where a scheduler currently is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Waiting,
    Evaluating,
    Executing,
    Stopped,
}

/// Result of one cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// At least one file was written.
    Copied { files: usize, bytes: u64 },
    /// Destination already matched the source.
    Unchanged,
    /// Gated off for the current role.
    Skipped,
    /// Every attempt failed; reported, never fatal.
    Failed { attempts: u32, error: String },
    /// Stop was requested before the copy finished.
    Cancelled,
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed { .. })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryStatus {
    pub state: SchedulerState,
    /// Completed cycles, skipped ones included.
    pub cycles: u64,
    pub failures: u64,
    pub consecutive_failures: u32,
    pub last_outcome: Option<CycleOutcome>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Shared status of every scheduled entry.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard {
    entries: Arc<RwLock<HashMap<PathBuf, EntryStatus>>>,
}

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    fn update(&self, path: &Path, f: impl FnOnce(&mut EntryStatus)) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        f(entries.entry(path.to_path_buf()).or_default());
    }

    pub fn register(&self, path: &Path) {
        self.update(path, |_| {});
    }

    pub fn set_state(&self, path: &Path, state: SchedulerState) {
        self.update(path, |status| status.state = state);
    }

    pub fn record(&self, path: &Path, outcome: CycleOutcome) {
        self.update(path, |status| {
            status.cycles += 1;
            match &outcome {
                CycleOutcome::Failed { error, .. } => {
                    status.failures += 1;
                    status.consecutive_failures += 1;
                    status.last_error = Some(error.clone());
                }
                CycleOutcome::Copied { .. } | CycleOutcome::Unchanged => {
                    status.consecutive_failures = 0;
                    status.last_success = Some(Utc::now());
                }
                CycleOutcome::Skipped | CycleOutcome::Cancelled => {}
            }
            status.last_outcome = Some(outcome);
        });
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<PathBuf, EntryStatus>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, path: &Path) -> Option<EntryStatus> {
        self.read().get(path).cloned()
    }

    pub fn snapshot(&self) -> Vec<(PathBuf, EntryStatus)> {
        let mut all: Vec<_> = self
            .read()
            .iter()
            .map(|(p, s)| (p.clone(), s.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}
