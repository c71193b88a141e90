//! Sync orchestration: gating, scheduling, copy execution and reporting.
//!
//! One [`SyncScheduler`] task runs per configured entry and hands permitted
//! cycles to the shared [`SyncExecutor`].

pub mod executor;
pub mod filter;
pub mod gating;
pub mod hash;
pub mod scheduler;
pub mod status;
pub mod watcher;

pub use executor::SyncExecutor;
pub use filter::PathFilter;
pub use gating::{gate, Gate, TransferPlan};
pub use hash::{hash_bytes, hash_file};
pub use scheduler::SyncScheduler;
pub use status::{CycleOutcome, EntryStatus, SchedulerState, StatusBoard};
pub use watcher::{ChangeWatcher, WatchEvent, WatchEventKind};
