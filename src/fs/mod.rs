//! Copy primitives between this node and its sibling.

pub mod backend;
pub mod local;
pub mod rsync;

pub use backend::{CopyResult, Location, Staged, StagedCopy, Transport};
pub use local::LocalTransport;
pub use rsync::RsyncTransport;
