//! Bootstrap and ownership of every sync task.
//!
//! Constructing a [`Manager`] only spawns the bootstrap task. Once the tokio
//! runtime drives it, bootstrap fetches external data and loads the entries
//! concurrently, then spawns one scheduler per valid entry. Stopping is
//! cooperative: every task observes the shared stop signal at its next
//! suspension point.

use serde_json::Value;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::ConfigStore;
use crate::ext_data::{ExternalData, ExternalDataProvider, Role};
use crate::fs::Transport;
use crate::runtime::{StopSignal, TaskSet};
use crate::sync::scheduler::DEFAULT_NOTIFY_SETTLE;
use crate::sync::{EntryStatus, StatusBoard, SyncExecutor, SyncScheduler};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerOptions {
    /// Re-fetch cadence for the role; `None` fetches it once.
    pub role_refresh: Option<Duration>,
    pub notify_settle: Duration,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            role_refresh: None,
            notify_settle: DEFAULT_NOTIFY_SETTLE,
        }
    }
}

pub struct Manager {
    store: Arc<OnceLock<ConfigStore>>,
    ext_data: ExternalData,
    status: StatusBoard,
    stop: StopSignal,
    tasks: TaskSet,
    bootstrapped: Arc<watch::Sender<bool>>,
}

impl Manager {
    /// Must be called from within a tokio runtime.
    pub fn new(
        provider: Arc<dyn ExternalDataProvider>,
        transport: Arc<dyn Transport>,
        entries_dir: impl Into<PathBuf>,
    ) -> Self {
        Self::with_options(provider, transport, entries_dir, ManagerOptions::default())
    }

    pub fn with_options(
        provider: Arc<dyn ExternalDataProvider>,
        transport: Arc<dyn Transport>,
        entries_dir: impl Into<PathBuf>,
        options: ManagerOptions,
    ) -> Self {
        let manager = Self {
            store: Arc::new(OnceLock::new()),
            ext_data: ExternalData::new(),
            status: StatusBoard::new(),
            stop: StopSignal::new(),
            tasks: TaskSet::new(),
            bootstrapped: Arc::new(watch::Sender::new(false)),
        };

        let bootstrap = Bootstrap {
            provider,
            transport,
            entries_dir: entries_dir.into(),
            options,
            store: manager.store.clone(),
            ext_data: manager.ext_data.clone(),
            status: manager.status.clone(),
            stop: manager.stop.clone(),
            tasks: manager.tasks.clone(),
            bootstrapped: manager.bootstrapped.clone(),
        };
        manager.tasks.spawn(bootstrap.run());
        manager
    }

    /// Whether the entry described by `descriptor` (an entry object as
    /// written in the config document) is tracked. False until bootstrap
    /// has loaded the configuration.
    pub fn contains_data_sync_cfg(&self, descriptor: &Value) -> bool {
        self.store.get().is_some_and(|store| store.contains_descriptor(descriptor))
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.store.get().is_some_and(|store| store.contains(path))
    }

    /// Loaded entries, once bootstrap has read them.
    pub fn config(&self) -> Option<&ConfigStore> {
        self.store.get()
    }

    /// Resolves once configuration is loaded and schedulers are spawned.
    pub async fn bootstrapped(&self) {
        let mut rx = self.bootstrapped.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn role(&self) -> Role {
        self.ext_data.role()
    }

    pub fn ext_data(&self) -> &ExternalData {
        &self.ext_data
    }

    pub fn status(&self, path: &Path) -> Option<EntryStatus> {
        self.status.get(path)
    }

    pub fn statuses(&self) -> Vec<(PathBuf, EntryStatus)> {
        self.status.snapshot()
    }

    pub fn request_stop(&self) {
        self.stop.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Request stop and wait for every task to wind down.
    pub async fn shutdown(&self) {
        self.stop.request_stop();
        self.tasks.join_all().await;
        info!("data sync manager stopped");
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.stop.request_stop();
    }
}

/// Marks bootstrap finished when dropped, so waiters wake even if it panics.
struct BootstrapDone(Arc<watch::Sender<bool>>);

impl Drop for BootstrapDone {
    fn drop(&mut self) {
        self.0.send_replace(true);
    }
}

struct Bootstrap {
    provider: Arc<dyn ExternalDataProvider>,
    transport: Arc<dyn Transport>,
    entries_dir: PathBuf,
    options: ManagerOptions,
    store: Arc<OnceLock<ConfigStore>>,
    ext_data: ExternalData,
    status: StatusBoard,
    stop: StopSignal,
    tasks: TaskSet,
    bootstrapped: Arc<watch::Sender<bool>>,
}

impl Bootstrap {
    async fn run(self) {
        let _done = BootstrapDone(self.bootstrapped.clone());
        self.spawn_external_fetches();

        let store = match ConfigStore::load_dir(&self.entries_dir).await {
            Ok(store) => store,
            Err(err) => {
                error!(dir = %self.entries_dir.display(), error = %err, "cannot load data sync configuration");
                ConfigStore::default()
            }
        };
        let store = self.store.get_or_init(|| store);

        if !self.stop.is_stopped() {
            let executor = Arc::new(SyncExecutor::new(
                self.transport.clone(),
                self.ext_data.clone(),
                self.stop.clone(),
            ));
            for entry in store.entries() {
                self.status.register(&entry.path);
                let scheduler = SyncScheduler::new(
                    entry.clone(),
                    executor.clone(),
                    self.ext_data.clone(),
                    self.stop.clone(),
                    self.status.clone(),
                )
                .with_notify_settle(self.options.notify_settle);
                self.tasks.spawn(scheduler.run());
            }
            info!(entries = store.len(), transport = self.transport.name(), "data sync manager bootstrapped");
        }
    }

    /// Each query runs in its own task: a query that never answers must not
    /// hold up configuration loading or the other queries.
    fn spawn_external_fetches(&self) {
        let (provider, ext_data, stop) = (self.provider.clone(), self.ext_data.clone(), self.stop.clone());
        let role_refresh = self.options.role_refresh;
        self.tasks.spawn(async move {
            if !until_stopped(&stop, ext_data.refresh_role(provider.as_ref())).await {
                return;
            }
            let Some(interval) = role_refresh else {
                return;
            };
            while stop.sleep(interval).await {
                if !until_stopped(&stop, ext_data.refresh_role(provider.as_ref())).await {
                    return;
                }
            }
        });

        let (provider, ext_data, stop) = (self.provider.clone(), self.ext_data.clone(), self.stop.clone());
        self.tasks.spawn(async move {
            until_stopped(&stop, ext_data.refresh_peer_address(provider.as_ref())).await;
        });

        let (provider, ext_data, stop) = (self.provider.clone(), self.ext_data.clone(), self.stop.clone());
        self.tasks.spawn(async move {
            until_stopped(&stop, ext_data.refresh_credentials(provider.as_ref())).await;
        });
    }
}

/// Run `fut` unless stop comes first. Returns whether it completed.
async fn until_stopped(stop: &StopSignal, fut: impl Future<Output = ()>) -> bool {
    tokio::select! {
        biased;
        _ = stop.stopped() => false,
        _ = fut => true,
    }
}
