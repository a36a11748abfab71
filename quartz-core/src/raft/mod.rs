//! Raft: leader-based consensus that totally orders mutating commands.
//!
//! Layout mirrors the protocol's natural seams: [`role`] holds the
//! Follower/Candidate/Leader transition rules, [`rpc`] the three RPC wire
//! types, [`log`] the in-memory log tail plus the persistence trait it is
//! backed by, [`state_machine`] the apply/snapshot/restore contract the
//! embedding application implements, and [`replica`] the event loop that
//! ties all of it together.

pub mod config;
pub mod log;
pub mod replica;
pub mod role;
pub mod rpc;
pub mod state_machine;
pub mod transport;

pub use config::RaftConfig;
pub use log::{LogEntry, PersistentStore, RaftLog, SnapshotMeta};
pub use replica::{CommitOutcome, Replica, ReplicaHandle, ReplicaStatus};
pub use role::Role;
pub use rpc::{
    AppendEntriesRequest, AppendEntriesResponse, InstallSnapshotRequest,
    InstallSnapshotResponse, RpcMessage, VoteRequest, VoteResponse,
};
pub use state_machine::StateMachine;
pub use transport::{Envelope, Transport, TransportError};
