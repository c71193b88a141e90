//! Sync entry configuration and daemon settings.

pub mod duration;
pub mod entry;
pub mod settings;
pub mod store;

pub use duration::parse_duration;
pub use entry::{EntryKind, RetryPolicy, SyncConfig, SyncDirection, SyncType};
pub use settings::{Settings, TransportKind, TransportSettings};
pub use store::ConfigStore;
