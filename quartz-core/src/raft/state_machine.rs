//! Core-out: the state-machine driver the embedding application supplies
//! (spec.md §6).

use crate::command::{Command, VectorId};
use async_trait::async_trait;

/// Implemented by the embedding application (`quartz_vector::VectorStateMachine`
/// dispatches `Insert`/`Delete`/`Update` onto an `HnswIndex`).
///
/// `apply` must be total: application-level errors are the state
/// machine's own concern, never propagated back into Raft (spec.md §4.3
/// "Apply loop" and §7). Raft's only job is delivering the same command
/// sequence, in the same order, on every replica.
#[async_trait]
pub trait StateMachine: Send + Sync {
    /// Apply one committed command, in log order. Returns the id the
    /// command actually resolved to storing under (the auto-assigned or
    /// stamped id for a successful `Insert`/`Update`), or `None` for
    /// commands that don't resolve one (`Delete`) or that `apply` rejected
    /// internally. This is the only authoritative source for an
    /// auto-assigned id: every replica runs this same serialized apply
    /// path in the same log order, so an id resolved here can't collide
    /// the way one read from a pre-submission snapshot of the index can
    /// (spec.md §5).
    async fn apply(&mut self, command: &Command) -> Option<VectorId>;

    /// Produce an opaque snapshot of the current state, used during
    /// compaction and to catch up a lagging follower via InstallSnapshot.
    async fn snapshot(&self) -> Vec<u8>;

    /// Replace the current state with one decoded from a snapshot blob
    /// produced by `snapshot`.
    async fn restore(&mut self, bytes: &[u8]);
}
