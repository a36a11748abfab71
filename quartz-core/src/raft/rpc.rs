//! The three Raft RPCs (spec.md §4.3), plus the `RpcMessage` envelope the
//! transport carries them in.
//!
//! Grounded in the `dennisss-repo` Raft reference's
//! `RequestVoteRequest`/`AppendEntriesRequest`/`InstallSnapshotRequest`
//! shapes, renamed to match spec.md's literal RPC names.

use crate::raft::log::LogEntry;
use crate::{LogIndex, ServerId, Term};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteRequest {
    pub term: Term,
    pub candidate_id: ServerId,
    pub last_log_index: LogIndex,
    pub last_log_term: Term,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoteResponse {
    pub term: Term,
    pub vote_granted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesRequest {
    pub term: Term,
    pub leader_id: ServerId,
    /// `None` when the leader's own log (or snapshot boundary) has
    /// nothing before `entries[0]` — i.e. this is the very first entry
    /// the cluster has ever seen.
    pub prev_log_index: Option<LogIndex>,
    pub prev_log_term: Term,
    pub entries: Vec<LogEntry>,
    pub leader_commit: LogIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppendEntriesResponse {
    pub term: Term,
    pub success: bool,
    /// Index of the last entry now present on the follower; used by the
    /// leader to advance that peer's `matchIndex`/`nextIndex`.
    pub match_index: LogIndex,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSnapshotRequest {
    pub term: Term,
    pub leader_id: ServerId,
    pub last_included_index: LogIndex,
    pub last_included_term: Term,
    pub cluster_config: Vec<ServerId>,
    pub state: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallSnapshotResponse {
    pub term: Term,
    pub success: bool,
}

/// Wire envelope payload: type tag plus type-specific fields, as spec.md
/// §6 requires (`from`/`to`/term are carried by [`crate::raft::transport::Envelope`]
/// and by each request's own `term` field).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RpcMessage {
    VoteRequest(VoteRequest),
    VoteResponse(VoteResponse),
    AppendEntries(AppendEntriesRequest),
    AppendEntriesResponse(AppendEntriesResponse),
    InstallSnapshot(InstallSnapshotRequest),
    InstallSnapshotResponse(InstallSnapshotResponse),
}
