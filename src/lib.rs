// Library module for data-sync
// Re-exports modules for use in integration tests and the daemon binary

pub mod config;
pub mod error;
pub mod ext_data;
pub mod fs;
pub mod manager;
pub mod runtime;
pub mod sync;

pub use manager::{Manager, ManagerOptions};
