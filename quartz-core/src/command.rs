//! The closed set of commands a client may submit through the log.
//!
//! Modeled as a tagged sum (Design Notes §9 "Polymorphic command variants"):
//! the apply callback dispatches on the variant, there is no open
//! inheritance hierarchy to extend.

use crate::ServerId;
use serde::{Deserialize, Serialize};

/// Identity of a vector within one index instance.
pub type VectorId = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Command {
    /// Insert `vector`, assigning `id` if given or letting the state
    /// machine auto-assign one. `level` is the HNSW level drawn by the
    /// leader and stamped into the command before replication, so every
    /// replica's apply is a deterministic function of the same input
    /// (spec.md §5: level-assignment randomness is part of the committed
    /// command).
    Insert {
        vector: Vec<f32>,
        id: Option<VectorId>,
        level: usize,
    },
    /// Remove the node with the given id.
    Delete { id: VectorId },
    /// Replace the vector stored at `id`, modeled as delete + re-insert of
    /// the same id, atomic with respect to the log. `level` is drawn and
    /// stamped the same way as `Insert`.
    Update {
        id: VectorId,
        vector: Vec<f32>,
        level: usize,
    },
    /// Add a voting member to the cluster configuration.
    AddServer { server: ServerId },
    /// Remove a member from the cluster configuration.
    RemoveServer { server: ServerId },
    /// Replace the cluster configuration wholesale.
    ChangeConfig { servers: Vec<ServerId> },
}

impl Command {
    /// Whether this command mutates cluster membership rather than the
    /// state machine. Membership commands are applied to the replica's
    /// own configuration, not handed to the embedding state machine.
    pub fn is_membership_change(&self) -> bool {
        matches!(
            self,
            Command::AddServer { .. } | Command::RemoveServer { .. } | Command::ChangeConfig { .. }
        )
    }
}
