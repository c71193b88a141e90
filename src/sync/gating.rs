//! Direction gating: whether, and which way, an entry copies for a role.
//!
//! | direction      | Active | Passive | Unknown |
//! |----------------|--------|---------|---------|
//! | Active2Passive | push   | skip    | skip    |
//! | Passive2Active | pull   | skip    | skip    |
//! | Bidirectional  | push   | push    | push    |
//!
//! Only the Active node moves role-gated data: it pushes its own state out
//! and pulls the sibling's state in.

use crate::config::{SyncConfig, SyncDirection};
use crate::ext_data::Role;
use crate::fs::Location;

/// Outcome of evaluating one cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gate {
    /// Copy local `path` to the destination.
    Push,
    /// Copy the peer's counterpart into local `path`.
    Pull,
    Skip,
}

impl Gate {
    pub fn permits(self) -> bool {
        self != Gate::Skip
    }
}

pub fn gate(direction: SyncDirection, role: Role) -> Gate {
    match (direction, role) {
        (SyncDirection::Bidirectional, _) => Gate::Push,
        (SyncDirection::Active2Passive, Role::Active) => Gate::Push,
        (SyncDirection::Passive2Active, Role::Active) => Gate::Pull,
        (SyncDirection::Active2Passive | SyncDirection::Passive2Active, Role::Passive | Role::Unknown) => {
            Gate::Skip
        }
    }
}

/// Source and destination of one permitted copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub from: Location,
    pub to: Location,
}

impl TransferPlan {
    /// Plan for `entry` under `role`, or `None` when gated off.
    pub fn resolve(entry: &SyncConfig, role: Role) -> Option<Self> {
        let local = Location::Local(entry.path.clone());
        let peer = Location::Peer(entry.destination().to_path_buf());
        match gate(entry.direction, role) {
            Gate::Push => Some(Self { from: local, to: peer }),
            Gate::Pull => Some(Self { from: peer, to: local }),
            Gate::Skip => None,
        }
    }
}
