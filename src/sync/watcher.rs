//! Change notifications for Immediate entries.
//!
//! File entries watch their parent directory and keep only events naming the
//! file itself, so replace-by-rename writes are still seen. Directory entries
//! watch their tree recursively.

use notify::event::{AccessKind, AccessMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;

/// Type of file system event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Deleted,
    /// A writer closed the file.
    Written,
}

/// A relevant file system change.
#[derive(Debug, Clone)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub paths: Vec<PathBuf>,
}

impl WatchEvent {
    fn from_notify(event: Event) -> Option<Self> {
        let kind = match event.kind {
            EventKind::Create(_) => WatchEventKind::Created,
            EventKind::Modify(_) => WatchEventKind::Modified,
            EventKind::Remove(_) => WatchEventKind::Deleted,
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => WatchEventKind::Written,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => return None,
        };
        Some(Self {
            kind,
            paths: event.paths,
        })
    }

    fn touches(&self, target: &Path, recursive: bool) -> bool {
        self.paths
            .iter()
            .any(|p| p == target || (recursive && p.starts_with(target)))
    }
}

/// Async watcher for one entry path.
pub struct ChangeWatcher {
    _watcher: RecommendedWatcher,
    receiver: mpsc::UnboundedReceiver<WatchEvent>,
    target: PathBuf,
}

impl ChangeWatcher {
    pub fn new(target: &Path, is_directory: bool) -> notify::Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let filter_target = target.to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: Result<Event, notify::Error>| {
                if let Some(event) = res.ok().and_then(WatchEvent::from_notify) {
                    if event.touches(&filter_target, is_directory) {
                        let _ = tx.send(event);
                    }
                }
            },
            Config::default(),
        )?;

        if is_directory {
            watcher.watch(target, RecursiveMode::Recursive)?;
        } else {
            let parent = target
                .parent()
                .ok_or_else(|| notify::Error::path_not_found().add_path(target.to_path_buf()))?;
            watcher.watch(parent, RecursiveMode::NonRecursive)?;
        }

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
            target: target.to_path_buf(),
        })
    }

    /// Next relevant change, or `None` if the watcher backend went away.
    pub async fn next_change(&mut self) -> Option<WatchEvent> {
        self.receiver.recv().await
    }

    /// Discard queued changes, returning how many there were.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while self.receiver.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    pub fn target(&self) -> &Path {
        &self.target
    }
}
